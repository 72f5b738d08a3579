use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::api::watermark::{Watermark, WatermarkTracker};

/// A process-wide watermark that every partition advances with an atomic monotone max.
#[derive(Clone, Debug, Default)]
pub struct SharedWatermark {
    timestamp: Arc<AtomicU64>,
}

impl SharedWatermark {
    pub fn new() -> Self {
        SharedWatermark::default()
    }

    /// Returns the watermark after the update, which may be ahead of `timestamp`.
    pub fn advance(&self, timestamp: u64) -> Watermark {
        let previous = self.timestamp.fetch_max(timestamp, Ordering::AcqRel);
        Watermark::new(previous.max(timestamp))
    }

    pub fn load(&self) -> Watermark {
        Watermark::new(self.timestamp.load(Ordering::Acquire))
    }
}

/// Tracker for `WatermarkScope::Global`: observations feed the shared watermark.
#[derive(Debug, Function)]
pub struct SharedWatermarks {
    shared: SharedWatermark,
    allowed_lateness: u64,
}

impl SharedWatermarks {
    pub fn new(shared: SharedWatermark, allowed_lateness: Duration) -> Self {
        SharedWatermarks {
            shared,
            allowed_lateness: allowed_lateness.as_millis() as u64,
        }
    }
}

impl WatermarkTracker for SharedWatermarks {
    fn observe(&mut self, event_time: u64) -> Watermark {
        self.shared
            .advance(event_time.saturating_sub(self.allowed_lateness))
    }

    fn current(&self) -> Watermark {
        self.shared.load()
    }
}
