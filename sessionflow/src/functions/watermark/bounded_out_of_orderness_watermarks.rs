use std::time::Duration;

use crate::api::watermark::{Watermark, WatermarkTracker, MIN_WATERMARK};
use crate::utils::date_time::timestamp_str;

/// Per-partition watermark: the largest event time seen, minus the allowed lateness.
///
/// With zero lateness the watermark is exactly the maximum event time observed.
#[derive(Debug, Function)]
pub struct BoundedOutOfOrdernessWatermarks {
    max_timestamp: u64,
    allowed_lateness: u64,
    watermark: Watermark,
}

impl BoundedOutOfOrdernessWatermarks {
    pub fn new(allowed_lateness: Duration) -> Self {
        BoundedOutOfOrdernessWatermarks {
            max_timestamp: 0,
            allowed_lateness: allowed_lateness.as_millis() as u64,
            watermark: MIN_WATERMARK,
        }
    }
}

impl WatermarkTracker for BoundedOutOfOrdernessWatermarks {
    fn observe(&mut self, event_time: u64) -> Watermark {
        if event_time > self.max_timestamp {
            self.max_timestamp = event_time;
        }

        let potential_wm = self.max_timestamp.saturating_sub(self.allowed_lateness);
        if potential_wm > self.watermark.timestamp {
            self.watermark = Watermark::new(potential_wm);
            debug!("advance watermark to {}", timestamp_str(potential_wm));
        }
        self.watermark
    }

    fn current(&self) -> Watermark {
        self.watermark
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::api::watermark::WatermarkTracker;
    use crate::functions::watermark::BoundedOutOfOrdernessWatermarks;

    #[test]
    pub fn zero_lateness_test() {
        let mut tracker = BoundedOutOfOrdernessWatermarks::new(Duration::ZERO);
        assert_eq!(tracker.current().timestamp(), 0);
        assert_eq!(tracker.observe(100).timestamp(), 100);
        assert_eq!(tracker.observe(40).timestamp(), 100);
        assert_eq!(tracker.observe(130).timestamp(), 130);
    }

    #[test]
    pub fn allowed_lateness_test() {
        let mut tracker = BoundedOutOfOrdernessWatermarks::new(Duration::from_millis(30));
        assert_eq!(tracker.observe(10).timestamp(), 0);
        assert_eq!(tracker.observe(100).timestamp(), 70);
        // out-of-order arrival never moves the watermark backward
        assert_eq!(tracker.observe(50).timestamp(), 70);
        assert_eq!(tracker.current().timestamp(), 70);
    }
}
