use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::api::config::{LateDataPolicy, WindowingConfig};
use crate::api::element::{Element, Emission};
use crate::api::error::DecodeError;
use crate::api::function::{Combiner, Context, FilterFunction, InputFormat, OutputFormat};
use crate::api::watermark::{Watermark, WatermarkTracker};
use crate::api::window::TimeWindow;
use crate::functions::watermark::BoundedOutOfOrdernessWatermarks;
use crate::functions::window::{EventTimeSessionWindows, SessionWindowAssigner};
use crate::metrics::{register_counter, register_gauge, Counter, Gauge, Tag};
use crate::runtime::trigger::{Firing, WindowTrigger};
use crate::storage::keyed_state::{TWindowState, WindowStateWrap};
use crate::utils::date_time::timestamp_str;

/// `n & LOG_SAMPLE_MASK == 0` picks which occurrences of a high-frequency warning are logged.
const LOG_SAMPLE_MASK: u64 = 1023;

/// Cooperative stop signal for a running [`Driver`] or partitioned runtime.
///
/// A stopped pipeline stops pulling from its source and force-closes every open window before
/// it returns, so nothing accumulated is lost.
#[derive(Clone, Debug, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        StopHandle::default()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// The counters of one partition, exported under the `partition` tag.
#[derive(Clone, Debug)]
pub struct DriverMetrics {
    records: Counter,
    filtered: Counter,
    dropped_late: Counter,
    late_accepted: Counter,
    emitted: Counter,
    corrections: Counter,
    decode_errors: Counter,
    open_windows: Gauge,
    watermark: Gauge,
}

impl DriverMetrics {
    pub fn register(partition: u16) -> Self {
        let tags = vec![Tag::new("partition", partition)];
        DriverMetrics {
            records: register_counter("Session_Records", tags.clone()),
            filtered: register_counter("Session_Filtered", tags.clone()),
            dropped_late: register_counter("Session_Dropped_Late", tags.clone()),
            late_accepted: register_counter("Session_Late_Accepted", tags.clone()),
            emitted: register_counter("Session_Emitted", tags.clone()),
            corrections: register_counter("Session_Corrections", tags.clone()),
            decode_errors: register_counter("Session_Decode_Errors", tags.clone()),
            open_windows: register_gauge("Session_Open_Windows", tags.clone()),
            watermark: register_gauge("Session_Watermark", tags),
        }
    }
}

/// Point-in-time counters of a driver.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverReport {
    pub partition: u16,
    pub records: u64,
    pub filtered: u64,
    pub dropped_late: u64,
    pub late_accepted: u64,
    pub emitted: u64,
    pub corrections: u64,
    pub decode_errors: u64,
    pub open_windows: u64,
    pub watermark: u64,
}

/// Copy of one live `(key, window)` for diagnostics.
#[derive(Clone, Debug, PartialEq)]
pub struct WindowSnapshot<K, A> {
    pub key: K,
    pub window: TimeWindow,
    pub aggregate: A,
    pub late: bool,
}

/// Runs the windowing core of one key-partition: assigner, keyed state, watermark and trigger.
///
/// Everything is driven synchronously by [`Driver::ingest`]; nothing blocks on I/O.
pub struct Driver<K, V, C>
where
    C: Combiner<Input = V>,
{
    context: Context,
    config: WindowingConfig,

    combiner: Arc<C>,
    filter: Option<Arc<dyn FilterFunction<K, V>>>,
    tracker: Box<dyn WatermarkTracker>,

    assigner: SessionWindowAssigner<K>,
    state: WindowStateWrap<K, C::Accumulator>,
    trigger: WindowTrigger<K, C::Accumulator>,

    metrics: DriverMetrics,
    stop: StopHandle,
}

impl<K, V, C> Driver<K, V, C>
where
    K: Clone + Eq + Hash + Ord + Debug,
    C: Combiner<Input = V>,
{
    /// A single-partition driver with a per-partition watermark.
    pub fn new(config: WindowingConfig, combiner: C) -> crate::api::Result<Self> {
        let config = config.validate()?;
        let tracker = BoundedOutOfOrdernessWatermarks::new(config.allowed_lateness());
        Ok(Self::for_partition(
            Context::default(),
            config,
            Arc::new(combiner),
            Box::new(tracker),
            DriverMetrics::register(0),
        ))
    }

    pub(crate) fn for_partition(
        context: Context,
        config: WindowingConfig,
        combiner: Arc<C>,
        tracker: Box<dyn WatermarkTracker>,
        metrics: DriverMetrics,
    ) -> Self {
        let assigner = EventTimeSessionWindows::with_gap(config.gap());
        Driver {
            context,
            config,
            combiner,
            filter: None,
            tracker,
            assigner: SessionWindowAssigner::new(assigner),
            state: WindowStateWrap::new(config.keyed_state_backend()),
            trigger: WindowTrigger::new(
                config.late_data_policy(),
                config.correction_retention_millis(),
            ),
            metrics,
            stop: StopHandle::new(),
        }
    }

    /// Elements rejected by `filter` never reach the window assigner.
    pub fn with_filter<F>(self, filter: F) -> Self
    where
        F: FilterFunction<K, V> + 'static,
    {
        self.with_shared_filter(Some(Arc::new(filter)))
    }

    pub(crate) fn with_shared_filter(mut self, filter: Option<Arc<dyn FilterFunction<K, V>>>) -> Self {
        self.filter = filter;
        self
    }

    pub fn config(&self) -> &WindowingConfig {
        &self.config
    }

    pub fn watermark(&self) -> Watermark {
        self.tracker.current()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Processes one element and returns the emissions of every window it made due.
    ///
    /// Fails only when the combiner rejects the value; the driver must then be discarded, its
    /// state is no longer consistent.
    pub fn ingest(
        &mut self,
        element: Element<K, V>,
    ) -> crate::api::Result<Vec<Emission<K, C::Accumulator>>> {
        self.metrics.records.fetch_add(1);

        if let Some(filter) = &self.filter {
            if !filter.filter(&element) {
                self.metrics.filtered.fetch_add(1);
                return Ok(Vec::new());
            }
        }

        let Element {
            key,
            value,
            event_time,
        } = element;

        let policy = self.config.late_data_policy();
        if policy == LateDataPolicy::EmitCorrection {
            self.restore_closed(&key, event_time);
        }

        let watermark = self.tracker.current();
        let window = self.assigner.preview(&key, event_time);
        let late = watermark.timestamp() >= window.end();
        if late {
            match policy {
                LateDataPolicy::Discard => {
                    let n = self.metrics.dropped_late.fetch_add(1);
                    if n & LOG_SAMPLE_MASK == 0 {
                        warn!(
                            "drop late element. key={:?}, event_time={}, window={}, watermark={}, dropped={}",
                            key,
                            timestamp_str(event_time),
                            window,
                            timestamp_str(watermark.timestamp()),
                            n + 1
                        );
                    }
                    return Ok(Vec::new());
                }
                LateDataPolicy::EmitCorrection => {
                    self.metrics.late_accepted.fetch_add(1);
                }
            }
        }

        let result = self.assigner.assign(&key, event_time);
        if !result.absorbed.is_empty() {
            self.state
                .merge(&key, &result.absorbed, result.window, self.combiner.as_ref());
        }
        self.state
            .apply(&key, result.window, value, late, self.combiner.as_ref())?;
        if result.is_new_window() {
            self.trigger.register(&key, result.window);
        }

        let watermark = self.tracker.observe(event_time);
        let mut firings =
            self.trigger
                .on_key(&key, watermark, &mut self.assigner, &mut self.state);
        firings.extend(
            self.trigger
                .on_watermark(watermark, &mut self.assigner, &mut self.state),
        );
        Ok(self.emit(firings))
    }

    /// Closes the windows made due by a watermark that moved without this driver seeing an
    /// element, as happens with a watermark shared between partitions.
    pub fn advance(&mut self) -> Vec<Emission<K, C::Accumulator>> {
        let watermark = self.tracker.current();
        let firings = self
            .trigger
            .on_watermark(watermark, &mut self.assigner, &mut self.state);
        self.emit(firings)
    }

    /// Force-closes every open window regardless of the watermark.
    pub fn flush(&mut self) -> Vec<Emission<K, C::Accumulator>> {
        let firings = self.trigger.flush_all(&mut self.assigner, &mut self.state);
        if !firings.is_empty() {
            info!(
                "flush partition {}, force closed {} windows",
                self.context.partition,
                firings.len()
            );
        }
        self.emit(firings)
    }

    /// Counts a source element that could not be decoded. The stream goes on.
    pub fn on_decode_error(&mut self, error: &DecodeError) {
        let n = self.metrics.decode_errors.fetch_add(1);
        if n & LOG_SAMPLE_MASK == 0 {
            warn!("skip undecodable element, errors={}. {}", n + 1, error);
        }
    }

    /// Pulls `source` until it ends or the driver is stopped, then flushes every open window.
    pub fn run<I, O>(&mut self, source: &mut I, sink: &mut O) -> crate::api::Result<DriverReport>
    where
        I: InputFormat<K, V>,
        O: OutputFormat<K, C::Accumulator>,
    {
        source.open(&self.context)?;
        sink.open(&self.context)?;
        info!(
            "driver started. partition={}, source={}, sink={}, combiner={}, gap={}ms, allowed_lateness={}ms, late_data_policy={}",
            self.context.partition,
            source.name(),
            sink.name(),
            self.combiner.name(),
            self.config.gap_millis(),
            self.config.allowed_lateness_millis(),
            self.config.late_data_policy()
        );

        while !self.stop.is_stopped() {
            match source.next_element() {
                Some(Ok(element)) => {
                    let emissions = match self.ingest(element) {
                        Ok(emissions) => emissions,
                        Err(e) => {
                            error!("partition {} failed. {}", self.context.partition, e);
                            if let Err(close_error) = source.close() {
                                warn!("close source failure. {}", close_error);
                            }
                            if let Err(close_error) = sink.close() {
                                warn!("close sink failure. {}", close_error);
                            }
                            return Err(e);
                        }
                    };
                    for emission in emissions {
                        sink.write_emission(emission);
                    }
                }
                Some(Err(e)) => self.on_decode_error(&e),
                None => break,
            }
        }

        if self.stop.is_stopped() {
            info!("driver stopped. partition={}", self.context.partition);
        }
        for emission in self.flush() {
            sink.write_emission(emission);
        }

        source.close()?;
        sink.close()?;

        let report = self.report();
        info!("driver finished. {:?}", report);
        Ok(report)
    }

    /// A copy of every open window, ordered by key and window.
    pub fn snapshot(&self) -> Vec<WindowSnapshot<K, C::Accumulator>> {
        let mut windows: Vec<WindowSnapshot<K, C::Accumulator>> = self
            .state
            .snapshot()
            .into_iter()
            .map(|(key, value)| WindowSnapshot {
                key,
                window: value.window,
                aggregate: value.accumulator,
                late: value.late || value.emitted,
            })
            .collect();
        windows.sort_by(|a, b| a.key.cmp(&b.key).then(a.window.cmp(&b.window)));
        windows
    }

    pub fn report(&self) -> DriverReport {
        DriverReport {
            partition: self.context.partition,
            records: self.metrics.records.load(),
            filtered: self.metrics.filtered.load(),
            dropped_late: self.metrics.dropped_late.load(),
            late_accepted: self.metrics.late_accepted.load(),
            emitted: self.metrics.emitted.load(),
            corrections: self.metrics.corrections.load(),
            decode_errors: self.metrics.decode_errors.load(),
            open_windows: self.assigner.len() as u64,
            watermark: self.tracker.current().timestamp(),
        }
    }

    /// Brings back the closed windows the element at `event_time` would merge with, so the
    /// element lands in the same window it would have had it arrived on time.
    fn restore_closed(&mut self, key: &K, event_time: u64) {
        loop {
            let window = self.assigner.preview(key, event_time);
            let closed = self.trigger.take_closed(key, &window);
            if closed.is_empty() {
                break;
            }

            for value in closed {
                let restored = value.window;
                debug!("reopen closed window {} of key {:?}", restored, key);

                self.state.restore(key.clone(), value);
                let result = self.assigner.merge_into(key, restored);

                let mut from = result.absorbed.clone();
                from.push(restored);
                self.state
                    .merge(key, &from, result.window, self.combiner.as_ref());
                if result.is_new_window() {
                    self.trigger.register(key, result.window);
                }
            }
        }
    }

    fn emit(&mut self, firings: Vec<Firing<K, C::Accumulator>>) -> Vec<Emission<K, C::Accumulator>> {
        let mut emissions = Vec::with_capacity(firings.len());
        for firing in firings {
            self.metrics.emitted.fetch_add(1);
            if firing.correction {
                self.metrics.corrections.fetch_add(1);
            }
            emissions.push(firing.emission);
        }

        self.metrics.open_windows.store(self.assigner.len() as i64);
        self.metrics
            .watermark
            .store(self.tracker.current().timestamp() as i64);
        emissions
    }
}
