use std::time::Duration;

use crate::api::window::{TimeWindow, WindowAssigner};

pub mod session_assigner;

pub use session_assigner::{MergeResult, SessionWindowAssigner};

/// Assigns each timestamp the provisional session window `[timestamp, timestamp + gap)`.
#[derive(Clone, Copy, Debug, Function)]
pub struct EventTimeSessionWindows {
    gap: u64,
}

impl EventTimeSessionWindows {
    pub fn with_gap(gap: Duration) -> Self {
        let gap = gap.as_millis() as u64;
        EventTimeSessionWindows { gap }
    }

    pub fn gap(&self) -> u64 {
        self.gap
    }
}

impl WindowAssigner for EventTimeSessionWindows {
    fn assign_window(&self, timestamp: u64) -> TimeWindow {
        TimeWindow::new(timestamp, timestamp.saturating_add(self.gap))
    }
}
