use std::convert::TryFrom;
use std::net::SocketAddr;
use std::time::Duration;

use sessionflow::api::config::{LateDataPolicy, RuntimeConfig, WindowingConfig};
use sessionflow::api::element::Element;
use sessionflow::api::properties::{Properties, WindowProperties};
use sessionflow::functions::combiner::sum;
use sessionflow::functions::filter::filter_fn;
use sessionflow::functions::source::decode_source;
use sessionflow::runtime::logger::{init_log, LogTarget};
use sessionflow::runtime::PartitionedRuntime;
use sessionflow::utils::date_time::current_timestamp_millis;
use sessionflow::utils::{parse_arg, parse_arg_with, VERSION};
use sessionflow_example_utils::rand_ride_input_format::RandRideIterator;
use sessionflow_example_utils::taxi_ride::parse_ride;

use crate::sink::RideStatusLog;

/// Sessions end after two minutes without rides of a status.
const SESSION_GAP: Duration = Duration::from_secs(120);

fn prepare_properties() -> anyhow::Result<Properties> {
    let mut properties = Properties::new();
    properties.set_gap(SESSION_GAP);
    properties.set_allowed_lateness(Duration::from_secs(5));
    properties.set_late_data_policy(LateDataPolicy::EmitCorrection);

    if let Ok(path) = parse_arg("config") {
        properties.extend(Properties::load_yaml(path.as_str())?);
    }
    properties.extend(Properties::from_args(std::env::args()));
    Ok(properties)
}

pub fn run() -> anyhow::Result<()> {
    init_log(&LogTarget::Console, parse_arg_with("log_level", "INFO").as_str())?;

    let properties = prepare_properties()?;
    info!("sessionflow {}, properties: {}", VERSION, properties.to_json()?);

    if let Ok(addr) = parse_arg("metrics_addr") {
        let addr: SocketAddr = addr.parse()?;
        sessionflow::metrics::install(addr)?;
    }

    let windowing = WindowingConfig::try_from(&properties)?;
    let runtime_config = RuntimeConfig::try_from(&properties)?;

    let rides: usize = parse_arg_with("rides", "10000").parse()?;
    let seed: u64 = parse_arg_with("seed", "0").parse()?;
    let start = current_timestamp_millis() as i64;

    let mut source = decode_source(RandRideIterator::new(seed, rides, start), |payload: Vec<u8>| {
        parse_ride(payload.as_slice())
    });

    let runtime = PartitionedRuntime::new(windowing, runtime_config, sum::<i64>())?.with_filter(
        filter_fn("DropEnroute", |element: &Element<String, i64>| {
            !element.key.eq_ignore_ascii_case("enroute")
        }),
    );

    let report = runtime.run(&mut source, RideStatusLog::new())?;
    info!(
        "finished. emitted={}, dropped_late={}, decode_errors={}",
        report.emitted(),
        report.dropped_late(),
        report.decode_errors
    );
    Ok(())
}
