use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fmt::Debug;
use std::hash::Hash;

use crate::api::config::LateDataPolicy;
use crate::api::element::Emission;
use crate::api::watermark::Watermark;
use crate::api::window::TimeWindow;
use crate::functions::window::SessionWindowAssigner;
use crate::storage::keyed_state::{TWindowState, WindowValue};

/// One closed `(key, window)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Firing<K, A> {
    pub emission: Emission<K, A>,
    /// The window had been emitted before and this emission replaces it.
    pub correction: bool,
}

type Timer<K> = Reverse<(u64, K, TimeWindow)>;

/// Decides when live `(key, window)` pairs close and hands their final aggregates out.
///
/// A window closes once `watermark >= window.end`. Every live window has a timer keyed on its
/// end, so windows of keys that stopped receiving elements close as soon as the watermark passes
/// them. Timers of windows that were merged away are skipped when they come up.
///
/// Under [`LateDataPolicy::EmitCorrection`] the final aggregate of each closed window is kept in
/// a ledger until `watermark >= window.end + retention`, so late elements can reopen it.
#[derive(Debug)]
pub struct WindowTrigger<K, A> {
    policy: LateDataPolicy,
    retention: u64,

    timers: BinaryHeap<Timer<K>>,

    ledger: HashMap<K, Vec<WindowValue<A>>>,
    ledger_len: usize,
    ledger_expiry: BinaryHeap<Timer<K>>,
}

impl<K, A> WindowTrigger<K, A>
where
    K: Clone + Eq + Hash + Ord + Debug,
    A: Clone + Debug,
{
    pub fn new(policy: LateDataPolicy, retention: u64) -> Self {
        WindowTrigger {
            policy,
            retention,
            timers: BinaryHeap::new(),
            ledger: HashMap::new(),
            ledger_len: 0,
            ledger_expiry: BinaryHeap::new(),
        }
    }

    /// Schedules the closing check of a window that just became live.
    pub fn register(&mut self, key: &K, window: TimeWindow) {
        self.timers.push(Reverse((window.end(), key.clone(), window)));
    }

    /// Closes the due windows of one key.
    pub fn on_key<S>(
        &mut self,
        key: &K,
        watermark: Watermark,
        assigner: &mut SessionWindowAssigner<K>,
        state: &mut S,
    ) -> Vec<Firing<K, A>>
    where
        S: TWindowState<K, A>,
    {
        let due: Vec<TimeWindow> = assigner
            .windows(key)
            .iter()
            .filter(|window| watermark.timestamp() >= window.end())
            .cloned()
            .collect();

        due.into_iter()
            .filter_map(|window| self.close(key, window, assigner, state))
            .collect()
    }

    /// Closes every due window over all keys, in order of window end.
    pub fn on_watermark<S>(
        &mut self,
        watermark: Watermark,
        assigner: &mut SessionWindowAssigner<K>,
        state: &mut S,
    ) -> Vec<Firing<K, A>>
    where
        S: TWindowState<K, A>,
    {
        let mut firings = Vec::new();
        loop {
            let due = match self.timers.peek() {
                Some(Reverse((end, _, _))) => *end <= watermark.timestamp(),
                None => false,
            };
            if !due {
                break;
            }

            if let Some(Reverse((_, key, window))) = self.timers.pop() {
                if let Some(firing) = self.close(&key, window, assigner, state) {
                    firings.push(firing);
                }
            }
        }

        self.prune_ledger(watermark);
        firings
    }

    /// Force-closes every live window regardless of the watermark.
    pub fn flush_all<S>(
        &mut self,
        assigner: &mut SessionWindowAssigner<K>,
        state: &mut S,
    ) -> Vec<Firing<K, A>>
    where
        S: TWindowState<K, A>,
    {
        let mut keys: Vec<K> = assigner.keys().cloned().collect();
        keys.sort();

        let mut firings = Vec::new();
        for key in keys {
            let windows = assigner.windows(&key).to_vec();
            for window in windows {
                if let Some(firing) = self.close(&key, window, assigner, state) {
                    firings.push(firing);
                }
            }
        }

        self.timers.clear();
        firings
    }

    /// Takes every ledger entry of `key` whose window intersects `window`.
    pub fn take_closed(&mut self, key: &K, window: &TimeWindow) -> Vec<WindowValue<A>> {
        let (taken, now_empty) = match self.ledger.get_mut(key) {
            Some(closed) => {
                let (taken, kept): (Vec<_>, Vec<_>) = closed
                    .drain(..)
                    .partition(|value| value.window.intersects(window));
                *closed = kept;
                (taken, closed.is_empty())
            }
            None => (Vec::new(), false),
        };

        if now_empty {
            self.ledger.remove(key);
        }
        self.ledger_len -= taken.len();
        taken
    }

    /// Live-window timers not yet fired, stale ones included.
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn ledger_len(&self) -> usize {
        self.ledger_len
    }

    fn close<S>(
        &mut self,
        key: &K,
        window: TimeWindow,
        assigner: &mut SessionWindowAssigner<K>,
        state: &mut S,
    ) -> Option<Firing<K, A>>
    where
        S: TWindowState<K, A>,
    {
        // merged away or already closed
        if !assigner.remove(key, &window) {
            return None;
        }

        let value = match state.remove(key, &window) {
            Some(value) => value,
            None => {
                warn!("live window {} of key {:?} has no state", window, key);
                return None;
            }
        };

        let correction = value.emitted;
        let is_late = value.late || value.emitted;
        debug!(
            "close window {} of key {:?}, late: {}, correction: {}",
            window, key, is_late, correction
        );

        let emission = match self.policy {
            LateDataPolicy::EmitCorrection => {
                let emission = Emission::new(key.clone(), value.accumulator.clone(), window, is_late);
                self.record_closed(key, value);
                emission
            }
            LateDataPolicy::Discard => {
                Emission::new(key.clone(), value.accumulator, window, is_late)
            }
        };

        Some(Firing {
            emission,
            correction,
        })
    }

    fn record_closed(&mut self, key: &K, mut value: WindowValue<A>) {
        value.emitted = true;
        let expiry = value.window.end().saturating_add(self.retention);
        self.ledger_expiry
            .push(Reverse((expiry, key.clone(), value.window)));
        self.ledger.entry(key.clone()).or_default().push(value);
        self.ledger_len += 1;
    }

    fn prune_ledger(&mut self, watermark: Watermark) {
        loop {
            let expired = match self.ledger_expiry.peek() {
                Some(Reverse((expiry, _, _))) => *expiry <= watermark.timestamp(),
                None => false,
            };
            if !expired {
                break;
            }

            if let Some(Reverse((_, key, window))) = self.ledger_expiry.pop() {
                self.forget_closed(&key, &window);
            }
        }
    }

    fn forget_closed(&mut self, key: &K, window: &TimeWindow) {
        let (removed, now_empty) = match self.ledger.get_mut(key) {
            Some(closed) => {
                let before = closed.len();
                closed.retain(|value| value.window != *window);
                (before - closed.len(), closed.is_empty())
            }
            None => (0, false),
        };

        if now_empty {
            self.ledger.remove(key);
        }
        self.ledger_len -= removed;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::api::config::LateDataPolicy;
    use crate::api::watermark::Watermark;
    use crate::api::window::TimeWindow;
    use crate::functions::combiner::{sum, SumCombiner};
    use crate::functions::window::{EventTimeSessionWindows, SessionWindowAssigner};
    use crate::runtime::trigger::WindowTrigger;
    use crate::storage::keyed_state::mem_window_state::MemoryWindowState;
    use crate::storage::keyed_state::TWindowState;

    struct Harness {
        combiner: SumCombiner<u64>,
        assigner: SessionWindowAssigner<&'static str>,
        state: MemoryWindowState<&'static str, u64>,
        trigger: WindowTrigger<&'static str, u64>,
    }

    impl Harness {
        fn new(policy: LateDataPolicy) -> Self {
            Harness {
                combiner: sum(),
                assigner: SessionWindowAssigner::new(EventTimeSessionWindows::with_gap(
                    Duration::from_millis(120),
                )),
                state: MemoryWindowState::new(),
                trigger: WindowTrigger::new(policy, 120),
            }
        }

        fn add(&mut self, key: &'static str, t: u64, v: u64) {
            let result = self.assigner.assign(&key, t);
            self.state
                .merge(&key, &result.absorbed, result.window, &self.combiner);
            self.state
                .apply(&key, result.window, v, false, &self.combiner)
                .unwrap();
            if result.is_new_window() {
                self.trigger.register(&key, result.window);
            }
        }
    }

    #[test]
    pub fn closure_correctness_test() {
        let mut h = Harness::new(LateDataPolicy::Discard);
        h.add("k", 0, 1);

        let firings = h.trigger.on_key(&"k", Watermark::new(119), &mut h.assigner, &mut h.state);
        assert!(firings.is_empty());
        let firings = h.trigger.on_watermark(Watermark::new(119), &mut h.assigner, &mut h.state);
        assert!(firings.is_empty());

        let firings = h.trigger.on_key(&"k", Watermark::new(120), &mut h.assigner, &mut h.state);
        assert_eq!(firings.len(), 1);
        assert_eq!(firings[0].emission.window, TimeWindow::new(0, 120));
        assert_eq!(firings[0].emission.aggregate, 1);
        assert!(!firings[0].correction);
        assert!(h.assigner.is_empty());
        assert!(h.state.is_empty());

        // the timer of the closed window is stale now
        let firings = h.trigger.on_watermark(Watermark::new(500), &mut h.assigner, &mut h.state);
        assert!(firings.is_empty());
        assert_eq!(h.trigger.pending_timers(), 0);
        assert_eq!(h.trigger.ledger_len(), 0);
    }

    #[test]
    pub fn idle_key_test() {
        let mut h = Harness::new(LateDataPolicy::Discard);
        h.add("idle", 0, 2);
        h.add("busy", 0, 1);
        h.add("busy", 100, 1);

        let firings = h.trigger.on_key(&"busy", Watermark::new(130), &mut h.assigner, &mut h.state);
        assert!(firings.is_empty());

        let firings = h.trigger.on_watermark(Watermark::new(130), &mut h.assigner, &mut h.state);
        assert_eq!(firings.len(), 1);
        assert_eq!(firings[0].emission.key, "idle");

        // [0, 120) of "busy" was merged into [0, 220), its timer is skipped
        let firings = h.trigger.on_watermark(Watermark::new(220), &mut h.assigner, &mut h.state);
        assert_eq!(firings.len(), 1);
        assert_eq!(firings[0].emission.window, TimeWindow::new(0, 220));
        assert_eq!(firings[0].emission.aggregate, 2);
    }

    #[test]
    pub fn ledger_retention_test() {
        let mut h = Harness::new(LateDataPolicy::EmitCorrection);
        h.add("k", 0, 3);

        let firings = h.trigger.on_watermark(Watermark::new(120), &mut h.assigner, &mut h.state);
        assert_eq!(firings.len(), 1);
        assert_eq!(h.trigger.ledger_len(), 1);

        assert!(h.trigger.take_closed(&"k", &TimeWindow::new(500, 620)).is_empty());

        let taken = h.trigger.take_closed(&"k", &TimeWindow::new(50, 170));
        assert_eq!(taken.len(), 1);
        assert!(taken[0].emitted);
        assert_eq!(taken[0].accumulator, 3);
        assert_eq!(h.trigger.ledger_len(), 0);
    }

    #[test]
    pub fn ledger_expiry_test() {
        let mut h = Harness::new(LateDataPolicy::EmitCorrection);
        h.add("k", 0, 3);

        h.trigger.on_watermark(Watermark::new(120), &mut h.assigner, &mut h.state);
        h.trigger.on_watermark(Watermark::new(239), &mut h.assigner, &mut h.state);
        assert_eq!(h.trigger.ledger_len(), 1);
        h.trigger.on_watermark(Watermark::new(240), &mut h.assigner, &mut h.state);
        assert_eq!(h.trigger.ledger_len(), 0);
        assert!(h.trigger.take_closed(&"k", &TimeWindow::new(0, 120)).is_empty());
    }

    #[test]
    pub fn flush_all_test() {
        let mut h = Harness::new(LateDataPolicy::Discard);
        h.add("b", 0, 1);
        h.add("a", 0, 1);
        h.add("a", 1000, 5);

        let firings = h.trigger.flush_all(&mut h.assigner, &mut h.state);
        let keys: Vec<&str> = firings.iter().map(|f| f.emission.key).collect();
        assert_eq!(keys, vec!["a", "a", "b"]);
        assert!(h.assigner.is_empty());
        assert!(h.state.is_empty());
        assert_eq!(h.trigger.pending_timers(), 0);
    }
}
