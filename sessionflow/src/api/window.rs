use std::cmp::{max, min};
use std::fmt::{Debug, Display, Formatter};

use crate::api::function::NamedFunction;
use crate::utils::date_time::timestamp_str;

pub trait TWindow: Debug + Clone {
    fn max_timestamp(&self) -> u64;
    fn min_timestamp(&self) -> u64;
}

/// A half-open event-time interval `[start, end)` in epoch millis.
///
/// Ordered by `start` and then `end`, which is the order live session windows of a key are kept in.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeWindow {
    start: u64,
    end: u64,
}

impl TimeWindow {
    pub fn new(start: u64, end: u64) -> Self {
        TimeWindow { start, end }
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    /// Returns `true` if this window overlaps or touches the given window.
    pub fn intersects(&self, other: &TimeWindow) -> bool {
        self.start <= other.end && self.end >= other.start
    }

    /// Returns the minimal window covers both this window and the given window.
    pub fn cover(&self, other: &TimeWindow) -> TimeWindow {
        TimeWindow::new(min(self.start, other.start), max(self.end, other.end))
    }

    pub fn contains(&self, timestamp: u64) -> bool {
        self.start <= timestamp && timestamp < self.end
    }
}

impl TWindow for TimeWindow {
    fn max_timestamp(&self) -> u64 {
        self.end
    }

    fn min_timestamp(&self) -> u64 {
        self.start
    }
}

impl Display for TimeWindow {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}, {})",
            timestamp_str(self.start),
            timestamp_str(self.end)
        )
    }
}

/// Assigns an element timestamp to its provisional window.
pub trait WindowAssigner
where
    Self: NamedFunction + Debug,
{
    fn assign_window(&self, timestamp: u64) -> TimeWindow;
}

#[cfg(test)]
mod tests {
    use crate::api::window::TimeWindow;

    #[test]
    pub fn intersects_test() {
        let w = TimeWindow::new(0, 120);
        assert!(w.intersects(&TimeWindow::new(100, 220)));
        assert!(w.intersects(&TimeWindow::new(120, 240)));
        assert!(!w.intersects(&TimeWindow::new(130, 250)));
        assert!(TimeWindow::new(130, 250).intersects(&TimeWindow::new(0, 200)));
    }

    #[test]
    pub fn cover_test() {
        let w = TimeWindow::new(5, 125).cover(&TimeWindow::new(0, 120));
        assert_eq!(w, TimeWindow::new(0, 125));
        assert!(w.contains(0));
        assert!(!w.contains(125));
    }

    #[test]
    pub fn order_test() {
        let mut windows = vec![
            TimeWindow::new(130, 250),
            TimeWindow::new(0, 120),
            TimeWindow::new(0, 100),
        ];
        windows.sort();
        assert_eq!(
            windows,
            vec![
                TimeWindow::new(0, 100),
                TimeWindow::new(0, 120),
                TimeWindow::new(130, 250)
            ]
        );
    }
}
