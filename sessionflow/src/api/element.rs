use std::fmt::{Debug, Display, Formatter};

use crate::api::window::TimeWindow;
use crate::utils::date_time::timestamp_str;

/// One timestamped `(key, value)` pair produced by a source adapter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Element<K, V> {
    pub key: K,
    pub value: V,
    pub event_time: u64,
}

impl<K, V> Element<K, V> {
    pub fn new(key: K, value: V, event_time: u64) -> Self {
        Element {
            key,
            value,
            event_time,
        }
    }
}

impl<K, V> Display for Element<K, V>
where
    K: Debug,
    V: Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Element{{key={:?}, value={:?}, event_time={}}}",
            self.key,
            self.value,
            timestamp_str(self.event_time)
        )
    }
}

/// The final aggregate of one closed `(key, window)`, handed to the sink adapter.
///
/// `is_late` marks emissions whose window took in late data, every correction of an
/// already-emitted window included.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Emission<K, A> {
    pub key: K,
    pub aggregate: A,
    pub window: TimeWindow,
    pub is_late: bool,
}

impl<K, A> Emission<K, A> {
    pub fn new(key: K, aggregate: A, window: TimeWindow, is_late: bool) -> Self {
        Emission {
            key,
            aggregate,
            window,
            is_late,
        }
    }
}
