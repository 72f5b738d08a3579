use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::api::config::{RuntimeConfig, WatermarkScope, WindowingConfig};
use crate::api::element::{Element, Emission};
use crate::api::function::{Combiner, Context, FilterFunction, InputFormat, OutputFormat};
use crate::api::watermark::WatermarkTracker;
use crate::api::Error;
use crate::channel::receiver::ChannelReceiver;
use crate::channel::sender::ChannelSender;
use crate::channel::{named_channel, RecvTimeoutError};
use crate::functions::watermark::{
    BoundedOutOfOrdernessWatermarks, SharedWatermark, SharedWatermarks,
};
use crate::metrics::{register_counter, Counter, Tag};
use crate::runtime::driver::{Driver, DriverMetrics, DriverReport, StopHandle};
use crate::utils::hash::partition_of;
use crate::utils::thread::spawn;

/// How long an idle partition waits before re-checking the watermark for due windows.
const IDLE_TICK: Duration = Duration::from_millis(200);

/// Outcome of one partition worker.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionReport {
    pub partition: u16,
    /// Times the partition was rebuilt with fresh state after a combiner failure.
    pub restarts: u32,
    /// Gave up after too many restarts; every later element of the partition was dropped.
    pub isolated: bool,
    /// Elements dropped because the partition was isolated.
    pub isolated_dropped: u64,
    pub driver: DriverReport,
}

/// Outcome of a whole partitioned run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeReport {
    pub partitions: Vec<PartitionReport>,
    pub decode_errors: u64,
    /// Minimum watermark over all partitions when the run ended.
    pub global_watermark: u64,
}

impl RuntimeReport {
    pub fn emitted(&self) -> u64 {
        self.partitions.iter().map(|p| p.driver.emitted).sum()
    }

    pub fn dropped_late(&self) -> u64 {
        self.partitions.iter().map(|p| p.driver.dropped_late).sum()
    }
}

#[derive(Debug, Default)]
struct WatermarkSlot {
    watermark: AtomicU64,
    isolated: AtomicBool,
}

/// Per-partition watermarks; the effective global watermark is their minimum.
///
/// A slot never moves backward. Isolated partitions no longer advance, so they are left out of
/// the minimum while any live partition remains.
#[derive(Clone, Debug)]
pub struct PartitionWatermarks {
    slots: Arc<Vec<WatermarkSlot>>,
}

impl PartitionWatermarks {
    fn new(partitions: u16) -> Self {
        let slots = (0..partitions).map(|_| WatermarkSlot::default()).collect();
        PartitionWatermarks {
            slots: Arc::new(slots),
        }
    }

    fn update(&self, partition: u16, watermark: u64) {
        if let Some(slot) = self.slots.get(partition as usize) {
            slot.watermark.fetch_max(watermark, Ordering::AcqRel);
        }
    }

    fn isolate(&self, partition: u16) {
        if let Some(slot) = self.slots.get(partition as usize) {
            slot.isolated.store(true, Ordering::Release);
        }
    }

    pub fn global(&self) -> u64 {
        let live = self
            .slots
            .iter()
            .filter(|slot| !slot.isolated.load(Ordering::Acquire))
            .map(|slot| slot.watermark.load(Ordering::Acquire))
            .min();
        match live {
            Some(watermark) => watermark,
            None => self
                .slots
                .iter()
                .map(|slot| slot.watermark.load(Ordering::Acquire))
                .min()
                .unwrap_or(0),
        }
    }
}

/// Runs one [`Driver`] per partition, each on its own thread.
///
/// The source is read on the calling thread and every element is routed by the murmur3 hash of
/// its key, so a key is always handled by the same partition. Emissions of all partitions are
/// written to the sink from one dedicated thread.
///
/// A partition whose combiner rejects a value is rebuilt with fresh state, losing the windows
/// it had open. After `max_partition_restarts` rebuilds it is isolated: it drops and counts
/// its elements while the other partitions carry on.
pub struct PartitionedRuntime<K, V, C> {
    config: WindowingConfig,
    runtime: RuntimeConfig,
    combiner: Arc<C>,
    filter: Option<Arc<dyn FilterFunction<K, V>>>,
    watermarks: PartitionWatermarks,
    stop: StopHandle,
}

impl<K, V, C> PartitionedRuntime<K, V, C>
where
    K: Clone + Eq + Hash + Ord + Debug + Send + 'static,
    V: Send + 'static,
    C: Combiner<Input = V> + 'static,
    C::Accumulator: Send + 'static,
{
    pub fn new(
        config: WindowingConfig,
        runtime: RuntimeConfig,
        combiner: C,
    ) -> crate::api::Result<Self> {
        let config = config.validate()?;
        let runtime = runtime.validate()?;
        Ok(PartitionedRuntime {
            config,
            runtime,
            combiner: Arc::new(combiner),
            filter: None,
            watermarks: PartitionWatermarks::new(runtime.partitions),
            stop: StopHandle::new(),
        })
    }

    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: FilterFunction<K, V> + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn global_watermark(&self) -> u64 {
        self.watermarks.global()
    }

    /// Pulls `source` until it ends or the runtime is stopped, then flushes every partition.
    pub fn run<I, O>(&self, source: &mut I, sink: O) -> crate::api::Result<RuntimeReport>
    where
        I: InputFormat<K, V>,
        O: OutputFormat<K, C::Accumulator> + Send + 'static,
    {
        let partitions = self.runtime.partitions;
        info!(
            "partitioned runtime started. partitions={}, channel_capacity={}, watermark_scope={}, late_data_policy={}",
            partitions,
            self.runtime.channel_capacity,
            self.config.watermark_scope(),
            self.config.late_data_policy()
        );

        let (emission_sender, emission_receiver) = named_channel(
            "Emission",
            vec![Tag::new("partition", "all")],
            self.runtime.channel_capacity,
        );
        let sink_handle = spawn_sink(sink, emission_receiver)?;

        let shared = SharedWatermark::new();
        let mut senders = Vec::with_capacity(partitions as usize);
        let mut handles = Vec::with_capacity(partitions as usize);
        for partition in 0..partitions {
            let (sender, receiver) = named_channel(
                "Partition",
                vec![Tag::new("partition", partition)],
                self.runtime.channel_capacity,
            );
            let worker = PartitionWorker {
                context: Context::new(partition, partitions),
                config: self.config,
                max_restarts: self.runtime.max_partition_restarts,
                combiner: self.combiner.clone(),
                filter: self.filter.clone(),
                shared: shared.clone(),
                watermarks: self.watermarks.clone(),
                metrics: DriverMetrics::register(partition),
                isolated_counter: register_counter(
                    "Session_Isolated_Dropped",
                    vec![Tag::new("partition", partition)],
                ),
                emissions: emission_sender.clone(),
            };
            let handle = spawn(format!("partition-{}", partition).as_str(), move || {
                worker.run(receiver)
            })?;
            senders.push(sender);
            handles.push(handle);
        }
        drop(emission_sender);

        let decode_errors = register_counter(
            "Session_Decode_Errors",
            vec![Tag::new("partition", "source")],
        );
        let mut decode_error_count = 0;

        source.open(&Context::new(0, 1))?;
        while !self.stop.is_stopped() {
            match source.next_element() {
                Some(Ok(element)) => {
                    let partition = partition_of(&element.key, partitions);
                    if senders[partition as usize].send(element).is_err() {
                        error!("partition {} is gone, element dropped", partition);
                    }
                }
                Some(Err(e)) => {
                    let n = decode_errors.fetch_add(1);
                    decode_error_count += 1;
                    if n & 1023 == 0 {
                        warn!("skip undecodable element, errors={}. {}", n + 1, e);
                    }
                }
                None => break,
            }
        }
        if self.stop.is_stopped() {
            info!("partitioned runtime stopped, flushing partitions");
        }
        source.close()?;

        // closing the channels lets every worker flush and exit
        drop(senders);

        let mut reports = Vec::with_capacity(handles.len());
        for (partition, handle) in handles.into_iter().enumerate() {
            let report = join(handle, partition as u16)?;
            reports.push(report);
        }
        join(sink_handle, partitions)??;

        let report = RuntimeReport {
            partitions: reports,
            decode_errors: decode_error_count,
            global_watermark: self.watermarks.global(),
        };
        info!(
            "partitioned runtime finished. emitted={}, dropped_late={}, decode_errors={}",
            report.emitted(),
            report.dropped_late(),
            report.decode_errors
        );
        Ok(report)
    }
}

fn join<T>(handle: JoinHandle<T>, partition: u16) -> crate::api::Result<T> {
    handle.join().map_err(|_| Error::PartitionFailed {
        partition,
        reason: "worker thread panicked".to_string(),
    })
}

fn spawn_sink<K, A, O>(
    mut sink: O,
    receiver: ChannelReceiver<Emission<K, A>>,
) -> crate::api::Result<JoinHandle<crate::api::Result<()>>>
where
    K: Send + 'static,
    A: Send + 'static,
    O: OutputFormat<K, A> + Send + 'static,
{
    sink.open(&Context::new(0, 1))?;
    let handle = spawn("sink", move || {
        loop {
            match receiver.recv_timeout(IDLE_TICK) {
                Ok(emission) => sink.write_emission(emission),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        sink.close()
    })?;
    Ok(handle)
}

struct PartitionWorker<K, V, C>
where
    C: Combiner<Input = V>,
{
    context: Context,
    config: WindowingConfig,
    max_restarts: u32,

    combiner: Arc<C>,
    filter: Option<Arc<dyn FilterFunction<K, V>>>,
    shared: SharedWatermark,
    watermarks: PartitionWatermarks,

    metrics: DriverMetrics,
    isolated_counter: Counter,
    emissions: ChannelSender<Emission<K, C::Accumulator>>,
}

impl<K, V, C> PartitionWorker<K, V, C>
where
    K: Clone + Eq + Hash + Ord + Debug,
    C: Combiner<Input = V>,
{
    fn new_driver(&self) -> Driver<K, V, C> {
        let lateness = self.config.allowed_lateness();
        let tracker: Box<dyn WatermarkTracker> = match self.config.watermark_scope() {
            WatermarkScope::Partition => Box::new(BoundedOutOfOrdernessWatermarks::new(lateness)),
            WatermarkScope::Global => Box::new(SharedWatermarks::new(self.shared.clone(), lateness)),
        };
        Driver::for_partition(
            self.context,
            self.config,
            self.combiner.clone(),
            tracker,
            self.metrics.clone(),
        )
        .with_shared_filter(self.filter.clone())
    }

    fn run(self, receiver: ChannelReceiver<Element<K, V>>) -> PartitionReport {
        let partition = self.context.partition;
        let mut driver = self.new_driver();
        let mut report = PartitionReport {
            partition,
            ..Default::default()
        };

        loop {
            match receiver.recv_timeout(IDLE_TICK) {
                Ok(element) => {
                    if report.isolated {
                        report.isolated_dropped += 1;
                        self.isolated_counter.fetch_add(1);
                        continue;
                    }

                    match driver.ingest(element) {
                        Ok(emissions) => self.forward(emissions),
                        Err(e) => {
                            if report.restarts < self.max_restarts {
                                report.restarts += 1;
                                warn!(
                                    "partition {} failed, restart {}/{} with fresh state. {}",
                                    partition, report.restarts, self.max_restarts, e
                                );
                                driver = self.new_driver();
                            } else {
                                error!(
                                    "partition {} failed after {} restarts, isolate it. {}",
                                    partition, report.restarts, e
                                );
                                report.isolated = true;
                                self.watermarks.isolate(partition);
                            }
                        }
                    }
                    self.watermarks
                        .update(partition, driver.watermark().timestamp());
                }
                Err(RecvTimeoutError::Timeout) => {
                    if !report.isolated {
                        let emissions = driver.advance();
                        self.forward(emissions);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        if !report.isolated {
            let emissions = driver.flush();
            self.forward(emissions);
        }

        report.driver = driver.report();
        info!("partition {} finished. {:?}", partition, report);
        report
    }

    fn forward(&self, emissions: Vec<Emission<K, C::Accumulator>>) {
        for emission in emissions {
            if self.emissions.send(emission).is_err() {
                error!(
                    "sink is gone, partition {} drops its emissions",
                    self.context.partition
                );
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use crate::api::config::{LateDataPolicy, RuntimeConfig, WatermarkScope, WindowingConfig};
    use crate::api::element::Element;
    use crate::api::window::TimeWindow;
    use crate::functions::combiner::sum;
    use crate::functions::filter::filter_fn;
    use crate::functions::sink::memory_sink;
    use crate::functions::source::{decode_source, vec_source};
    use crate::runtime::driver::Driver;
    use crate::runtime::partition::{PartitionWatermarks, PartitionedRuntime};
    use crate::utils::hash::partition_of;

    fn runtime_config(partitions: u16, max_partition_restarts: u32) -> RuntimeConfig {
        RuntimeConfig {
            partitions,
            channel_capacity: 16,
            max_partition_restarts,
        }
    }

    #[test]
    pub fn partitioned_matches_single_test() {
        let mut rng = StdRng::seed_from_u64(42);
        let elements: Vec<Element<String, u64>> = (0..500)
            .map(|_| {
                let key = format!("key-{}", rng.gen_range(0..20));
                Element::new(key, rng.gen_range(1..5), rng.gen_range(0..5_000))
            })
            .collect();

        let config = WindowingConfig::new(Duration::from_millis(120))
            .with_allowed_lateness(Duration::from_secs(60))
            .with_late_data_policy(LateDataPolicy::Discard);

        let mut driver = Driver::new(config, sum::<u64>()).unwrap();
        let mut expected = Vec::new();
        for element in elements.clone() {
            expected.extend(driver.ingest(element).unwrap());
        }
        expected.extend(driver.flush());
        let mut expected: Vec<(String, TimeWindow, u64)> = expected
            .into_iter()
            .map(|e| (e.key, e.window, e.aggregate))
            .collect();
        expected.sort();

        let runtime = PartitionedRuntime::new(config, runtime_config(4, 0), sum::<u64>()).unwrap();
        let sink = memory_sink();
        let report = runtime.run(&mut vec_source(elements), sink.clone()).unwrap();

        let mut actual: Vec<(String, TimeWindow, u64)> = sink
            .drain()
            .into_iter()
            .map(|e| (e.key, e.window, e.aggregate))
            .collect();
        actual.sort();

        assert_eq!(actual, expected);
        assert_eq!(report.partitions.len(), 4);
        assert_eq!(report.emitted() as usize, expected.len());
        let records: u64 = report.partitions.iter().map(|p| p.driver.records).sum();
        assert_eq!(records, 500);
    }

    #[test]
    pub fn partition_isolation_test() {
        let bad = "bad".to_string();
        let bad_partition = partition_of(&bad, 2);
        let good = (0..100)
            .map(|i| format!("good-{}", i))
            .find(|key| partition_of(key, 2) != bad_partition)
            .unwrap();

        let elements = vec![
            Element::new(good.clone(), 1.0, 0),
            Element::new(bad.clone(), f64::NAN, 0),
            Element::new(bad.clone(), 2.0, 5),
            Element::new(bad.clone(), f64::INFINITY, 10),
            Element::new(bad.clone(), 3.0, 20),
            Element::new(good.clone(), 2.0, 50),
        ];

        let config = WindowingConfig::new(Duration::from_millis(120));
        let runtime = PartitionedRuntime::new(config, runtime_config(2, 1), sum::<f64>()).unwrap();
        let sink = memory_sink();
        let report = runtime.run(&mut vec_source(elements), sink.clone()).unwrap();

        let emissions = sink.drain();
        assert_eq!(emissions.len(), 1);
        assert_eq!(emissions[0].key, good);
        assert_eq!(emissions[0].aggregate, 3.0);

        let failed = &report.partitions[bad_partition as usize];
        assert_eq!(failed.restarts, 1);
        assert!(failed.isolated);
        assert_eq!(failed.isolated_dropped, 1);

        let healthy = &report.partitions[1 - bad_partition as usize];
        assert_eq!(healthy.restarts, 0);
        assert!(!healthy.isolated);

        // the isolated partition stalled at 5 and no longer holds the minimum back
        assert_eq!(report.global_watermark, 50);
    }

    #[test]
    pub fn filter_and_decode_errors_test() {
        let lines = vec!["pickup 2 0", "enroute 5 0", "???", "dropoff 1 30"];
        let mut source = decode_source(lines.into_iter(), |line: &str| {
            let fields: Vec<&str> = line.split(' ').collect();
            if fields.len() != 3 {
                return Err(crate::api::error::DecodeError::new("expected three fields"));
            }
            let value: u64 = fields[1]
                .parse()
                .map_err(|_| crate::api::error::DecodeError::new("bad value"))?;
            let ts: u64 = fields[2]
                .parse()
                .map_err(|_| crate::api::error::DecodeError::new("bad time"))?;
            Ok(Element::new(fields[0].to_string(), value, ts))
        });

        let config = WindowingConfig::new(Duration::from_millis(120));
        let runtime = PartitionedRuntime::new(config, runtime_config(3, 0), sum::<u64>())
            .unwrap()
            .with_filter(filter_fn("DropEnroute", |e: &Element<String, u64>| {
                e.key != "enroute"
            }));
        let sink = memory_sink();
        let report = runtime.run(&mut source, sink.clone()).unwrap();

        assert_eq!(report.decode_errors, 1);
        let filtered: u64 = report.partitions.iter().map(|p| p.driver.filtered).sum();
        assert_eq!(filtered, 1);

        let mut keys: Vec<String> = sink.drain().into_iter().map(|e| e.key).collect();
        keys.sort();
        assert_eq!(keys, vec!["dropoff".to_string(), "pickup".to_string()]);
    }

    #[test]
    pub fn global_watermark_scope_test() {
        let elements: Vec<Element<String, u64>> = (0..50)
            .map(|i| Element::new(format!("k{}", i % 5), 1, i * 100))
            .collect();

        let config = WindowingConfig::new(Duration::from_millis(120))
            .with_watermark_scope(WatermarkScope::Global)
            .with_late_data_policy(LateDataPolicy::EmitCorrection);
        let runtime = PartitionedRuntime::new(config, runtime_config(2, 0), sum::<u64>()).unwrap();
        let sink = memory_sink();
        let report = runtime.run(&mut vec_source(elements), sink.clone()).unwrap();

        // every element opens a window of its own, nothing is lost to lateness
        let total: u64 = sink.drain().iter().map(|e| e.aggregate).sum();
        assert_eq!(total, 50);
        assert_eq!(report.dropped_late(), 0);
        assert!(report.global_watermark <= 4_900);
    }

    #[test]
    pub fn stop_test() {
        let config = WindowingConfig::new(Duration::from_millis(120));
        let runtime = PartitionedRuntime::new(config, runtime_config(2, 0), sum::<u64>()).unwrap();
        let stop = runtime.stop_handle();

        let payloads = (0..1_000u64).map(move |i| {
            if i == 9 {
                stop.stop();
            }
            i
        });
        let mut source = decode_source(payloads, |i: u64| Ok(Element::new("k".to_string(), 1u64, i)));
        let sink = memory_sink();
        let report = runtime.run(&mut source, sink.clone()).unwrap();

        // the ten elements read before the stop are flushed in one window
        let emissions = sink.drain();
        assert_eq!(emissions.len(), 1);
        assert_eq!(emissions[0].aggregate, 10);
        assert_eq!(emissions[0].window, TimeWindow::new(0, 129));
        let records: u64 = report.partitions.iter().map(|p| p.driver.records).sum();
        assert_eq!(records, 10);
    }

    #[test]
    pub fn partition_watermarks_test() {
        let watermarks = PartitionWatermarks::new(3);
        watermarks.update(0, 100);
        watermarks.update(1, 50);
        assert_eq!(watermarks.global(), 0);
        watermarks.update(2, 70);
        assert_eq!(watermarks.global(), 50);

        // a partition's slot never moves backward
        watermarks.update(1, 20);
        assert_eq!(watermarks.global(), 50);
    }

    #[test]
    pub fn isolated_partition_watermark_test() {
        let watermarks = PartitionWatermarks::new(3);
        watermarks.update(0, 100);
        watermarks.update(1, 10);
        watermarks.update(2, 70);
        assert_eq!(watermarks.global(), 10);

        watermarks.isolate(1);
        assert_eq!(watermarks.global(), 70);
        watermarks.update(2, 90);
        assert_eq!(watermarks.global(), 90);

        watermarks.isolate(0);
        watermarks.isolate(2);
        assert_eq!(watermarks.global(), 10);
    }
}
