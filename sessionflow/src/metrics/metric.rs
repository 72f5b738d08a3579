use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use metrics::{counter, gauge};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tag(pub(crate) String, pub(crate) String);

impl Tag {
    pub fn new<F, C>(field: F, context: C) -> Self
    where
        F: ToString,
        C: ToString,
    {
        Tag(field.to_string(), context.to_string())
    }
}

struct CounterMeta {
    name: String,
    tags: Vec<Tag>,
    old_value: AtomicU64,
    value: Arc<AtomicU64>,
}

struct GaugeMeta {
    name: String,
    tags: Vec<Tag>,
    value: Arc<AtomicI64>,
}

lazy_static! {
    static ref COUNTER: RwLock<Vec<CounterMeta>> = RwLock::new(Vec::new());
    static ref GAUGE: RwLock<Vec<GaugeMeta>> = RwLock::new(Vec::new());
}

/// Handle of a registered counter.
///
/// The exported value is shared by every handle registered under the same name and tags.
/// `fetch_add` and `load` see only what this handle and its clones added.
#[derive(Clone, Default, Debug)]
pub struct Counter {
    value: Arc<AtomicU64>,
    local: Arc<AtomicU64>,
}

impl Counter {
    fn new(value: Arc<AtomicU64>) -> Self {
        Counter {
            value,
            local: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn fetch_add(&self, v: u64) -> u64 {
        self.value.fetch_add(v, Ordering::Relaxed);
        self.local.fetch_add(v, Ordering::Relaxed)
    }

    pub fn load(&self) -> u64 {
        self.local.load(Ordering::Relaxed)
    }
}

#[derive(Clone, Default, Debug)]
pub struct Gauge {
    value: Arc<AtomicI64>,
}

impl Gauge {
    fn new(value: Arc<AtomicI64>) -> Self {
        Gauge { value }
    }

    pub fn store(&self, v: i64) {
        self.value.store(v, Ordering::Relaxed);
    }

    pub fn fetch_add(&self, v: i64) {
        self.value.fetch_add(v, Ordering::Relaxed);
    }

    pub fn fetch_sub(&self, v: i64) {
        self.value.fetch_sub(v, Ordering::Relaxed);
    }

    pub fn load(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Point-in-time copy of one registered metric.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricValue {
    pub name: String,
    pub tags: Vec<Tag>,
    pub value: i64,
}

pub fn register_counter<K>(name: K, tags: Vec<Tag>) -> Counter
where
    K: ToString,
{
    let name = name.to_string();
    let mut metrics = match COUNTER.write() {
        Ok(metrics) => metrics,
        Err(e) => {
            error!("counter registry poisoned, `{}` is not exported. {}", name, e);
            return Counter::new(Arc::new(AtomicU64::new(0)));
        }
    };

    if let Some(meta) = metrics
        .iter()
        .find(|meta| meta.name == name && meta.tags == tags)
    {
        return Counter::new(meta.value.clone());
    }

    let value = Arc::new(AtomicU64::new(0));
    metrics.push(CounterMeta {
        name,
        tags,
        old_value: AtomicU64::new(0),
        value: value.clone(),
    });
    Counter::new(value)
}

pub fn register_gauge<K>(name: K, tags: Vec<Tag>) -> Gauge
where
    K: ToString,
{
    let name = name.to_string();
    let mut metrics = match GAUGE.write() {
        Ok(metrics) => metrics,
        Err(e) => {
            error!("gauge registry poisoned, `{}` is not exported. {}", name, e);
            return Gauge::new(Arc::new(AtomicI64::new(0)));
        }
    };

    if let Some(meta) = metrics
        .iter()
        .find(|meta| meta.name == name && meta.tags == tags)
    {
        return Gauge::new(meta.value.clone());
    }

    let value = Arc::new(AtomicI64::new(0));
    metrics.push(GaugeMeta {
        name,
        tags,
        value: value.clone(),
    });
    Gauge::new(value)
}

/// Copies every registered counter and gauge.
pub fn snapshot() -> Vec<MetricValue> {
    let mut values = Vec::new();
    if let Ok(metrics) = COUNTER.read() {
        for meta in metrics.iter() {
            values.push(MetricValue {
                name: meta.name.clone(),
                tags: meta.tags.clone(),
                value: meta.value.load(Ordering::Relaxed) as i64,
            });
        }
    }
    if let Ok(metrics) = GAUGE.read() {
        for meta in metrics.iter() {
            values.push(MetricValue {
                name: meta.name.clone(),
                tags: meta.tags.clone(),
                value: meta.value.load(Ordering::Relaxed),
            });
        }
    }
    values
}

/// Publishes the registry through the `metrics` facade.
pub(crate) fn compute() {
    compute_counter();
    compute_gauge();
}

pub(crate) fn compute_counter() {
    let metrics = match COUNTER.read() {
        Ok(metrics) => metrics,
        Err(_) => return,
    };
    for meta in metrics.iter() {
        let name = meta.name.clone();

        let value: u64 = meta.value.load(Ordering::Relaxed);
        let old_value: u64 = meta.old_value.load(Ordering::Relaxed);
        let incr = value.saturating_sub(old_value);
        meta.old_value.store(value, Ordering::Relaxed);

        let labels = to_labels(&meta.tags);
        counter!(name, incr, &labels);
    }
}

pub(crate) fn compute_gauge() {
    let metrics = match GAUGE.read() {
        Ok(metrics) => metrics,
        Err(_) => return,
    };
    for meta in metrics.iter() {
        let name = meta.name.clone();
        let labels = to_labels(&meta.tags);

        let val = meta.value.load(Ordering::Relaxed) as f64;
        gauge!(name, val, &labels);
    }
}

fn to_labels(tags: &[Tag]) -> Vec<(String, String)> {
    tags.iter()
        .map(|tag| (tag.0.clone(), tag.1.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::metrics::metric::{register_counter, register_gauge, snapshot, Tag};

    #[test]
    pub fn register_test() {
        let counter = register_counter("Test_Register_Counter", vec![Tag::new("partition", 7)]);
        counter.fetch_add(3);
        let gauge = register_gauge("Test_Register_Gauge", vec![Tag::new("partition", 7)]);
        gauge.store(-2);
        gauge.fetch_add(5);

        let values = snapshot();
        let c = values
            .iter()
            .find(|v| v.name == "Test_Register_Counter")
            .unwrap();
        assert_eq!(c.value, 3);
        assert_eq!(c.tags, vec![Tag::new("partition", "7")]);

        let g = values
            .iter()
            .find(|v| v.name == "Test_Register_Gauge")
            .unwrap();
        assert_eq!(g.value, 3);
    }

    #[test]
    pub fn register_twice_test() {
        let tags = vec![Tag::new("partition", 3)];
        let first = register_counter("Test_Shared_Counter", tags.clone());
        let second = register_counter("Test_Shared_Counter", tags.clone());
        let other = register_counter("Test_Shared_Counter", vec![Tag::new("partition", 4)]);
        first.fetch_add(2);
        second.fetch_add(5);
        other.fetch_add(1);

        assert_eq!(first.load(), 2);
        assert_eq!(second.load(), 5);

        let values = snapshot();
        let exported: Vec<_> = values
            .iter()
            .filter(|v| v.name == "Test_Shared_Counter" && v.tags == tags)
            .collect();
        assert_eq!(exported.len(), 1);
        assert_eq!(exported[0].value, 7);

        let g1 = register_gauge("Test_Shared_Gauge", tags.clone());
        let g2 = register_gauge("Test_Shared_Gauge", tags.clone());
        g1.store(9);
        assert_eq!(g2.load(), 9);
        let gauges = snapshot()
            .into_iter()
            .filter(|v| v.name == "Test_Shared_Gauge")
            .count();
        assert_eq!(gauges, 1);
    }
}
