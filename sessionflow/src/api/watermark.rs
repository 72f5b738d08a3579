use std::fmt::Debug;

use crate::api::function::NamedFunction;

pub const MIN_WATERMARK: Watermark = Watermark { timestamp: 0x0 };

/// No element with an event time at or below `timestamp` is expected any more.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Watermark {
    pub(crate) timestamp: u64,
}

impl Watermark {
    pub fn new(timestamp: u64) -> Self {
        Watermark { timestamp }
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }
}

impl Default for Watermark {
    fn default() -> Self {
        MIN_WATERMARK
    }
}

/// Tracks event-time progress over out-of-order arrivals.
///
/// Implementations must never move the watermark backward.
pub trait WatermarkTracker
where
    Self: NamedFunction + Debug + Send,
{
    /// Called for every accepted element. Returns the watermark after the observation.
    fn observe(&mut self, event_time: u64) -> Watermark;

    fn current(&self) -> Watermark;
}
