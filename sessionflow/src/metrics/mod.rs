use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;
use metrics_util::MetricKindMask;

use crate::utils::thread::spawn;

pub mod metric;

pub use metric::register_counter;
pub use metric::register_gauge;
pub use metric::snapshot;
pub use metric::Counter;
pub use metric::Gauge;
pub use metric::MetricValue;
pub use metric::Tag;

const REPORT_INTERVAL: Duration = Duration::from_secs(5);

/// Starts a Prometheus HTTP exporter on `addr` and a thread that publishes the registry to it.
pub fn install(addr: SocketAddr) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .idle_timeout(
            MetricKindMask::COUNTER | MetricKindMask::HISTOGRAM,
            Some(Duration::from_secs(60)),
        )
        .install()
        .map_err(|e| anyhow!("install prometheus exporter on {} failure. {}", addr, e))?;

    spawn("metrics-reporter", || loop {
        metric::compute();
        std::thread::sleep(REPORT_INTERVAL);
    })?;

    info!(
        "metrics prometheus http exporter listen on http://{}",
        addr.to_string(),
    );
    Ok(())
}
