use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use crate::api::window::{TimeWindow, WindowAssigner};
use crate::functions::window::EventTimeSessionWindows;

/// Outcome of merging a candidate window into a key's live windows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeResult {
    /// The live window that now covers the candidate.
    pub window: TimeWindow,
    /// Live windows replaced by `window`, in start order. It may contain `window` itself when
    /// the candidate fell inside an existing window.
    pub absorbed: Vec<TimeWindow>,
}

impl MergeResult {
    /// `true` when `window` was not a live window before the merge.
    pub fn is_new_window(&self) -> bool {
        !self.absorbed.contains(&self.window)
    }
}

/// Tracks the live session windows of every key and merges new activity into them.
///
/// Per key the live windows are kept sorted by start and never overlap or touch: any two that
/// would are merged into their cover. Merging is order independent, the same elements always
/// produce the same window set.
///
/// A key whose elements keep arriving just inside the gap keeps its window open for as long as
/// that lasts. There is no cap on live windows other than memory.
#[derive(Debug)]
pub struct SessionWindowAssigner<K> {
    assigner: EventTimeSessionWindows,
    sessions: HashMap<K, Vec<TimeWindow>>,
    live_windows: usize,
}

impl<K> SessionWindowAssigner<K>
where
    K: Clone + Eq + Hash + Debug,
{
    pub fn new(assigner: EventTimeSessionWindows) -> Self {
        SessionWindowAssigner {
            assigner,
            sessions: HashMap::new(),
            live_windows: 0,
        }
    }

    pub fn gap(&self) -> u64 {
        self.assigner.gap()
    }

    /// The window an element at `event_time` would end up in, without changing anything.
    pub fn preview(&self, key: &K, event_time: u64) -> TimeWindow {
        let candidate = self.assigner.assign_window(event_time);
        match self.sessions.get(key) {
            Some(windows) => cover_intersecting(windows, candidate).0,
            None => candidate,
        }
    }

    /// Assigns an element to its session window, merging every live window it reaches.
    pub fn assign(&mut self, key: &K, event_time: u64) -> MergeResult {
        let candidate = self.assigner.assign_window(event_time);
        self.merge_into(key, candidate)
    }

    /// Merges an arbitrary window (a new session or a restored closed one) into the live set.
    pub fn merge_into(&mut self, key: &K, candidate: TimeWindow) -> MergeResult {
        let windows = self.sessions.entry(key.clone()).or_default();

        let (window, absorbed_flags) = cover_intersecting(windows, candidate);

        let mut absorbed = Vec::new();
        let mut kept = Vec::with_capacity(windows.len() + 1);
        for (w, is_absorbed) in windows.drain(..).zip(absorbed_flags) {
            if is_absorbed {
                absorbed.push(w);
            } else {
                kept.push(w);
            }
        }

        let position = kept.partition_point(|w| w < &window);
        kept.insert(position, window);

        self.live_windows = self.live_windows + 1 - absorbed.len();
        *windows = kept;

        MergeResult { window, absorbed }
    }

    /// Forgets a live window. Returns `false` if it was not live.
    pub fn remove(&mut self, key: &K, window: &TimeWindow) -> bool {
        let (removed, now_empty) = match self.sessions.get_mut(key) {
            Some(windows) => match windows.binary_search(window) {
                Ok(index) => {
                    windows.remove(index);
                    (true, windows.is_empty())
                }
                Err(_) => (false, false),
            },
            None => (false, false),
        };

        if removed {
            self.live_windows -= 1;
        }
        if now_empty {
            self.sessions.remove(key);
        }
        removed
    }

    /// Live windows of `key`, sorted by start.
    pub fn windows(&self, key: &K) -> &[TimeWindow] {
        self.sessions
            .get(key)
            .map(|windows| windows.as_slice())
            .unwrap_or(&[])
    }

    pub fn contains(&self, key: &K, window: &TimeWindow) -> bool {
        self.windows(key).binary_search(window).is_ok()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.sessions.keys()
    }

    /// Total live windows over all keys.
    pub fn len(&self) -> usize {
        self.live_windows
    }

    pub fn is_empty(&self) -> bool {
        self.live_windows == 0
    }
}

/// Grows `candidate` until no window in `windows` intersects it any more.
///
/// Returns the cover and, per window, whether it was absorbed.
fn cover_intersecting(windows: &[TimeWindow], candidate: TimeWindow) -> (TimeWindow, Vec<bool>) {
    let mut merged = candidate;
    let mut absorbed = vec![false; windows.len()];
    loop {
        let mut changed = false;
        for (index, window) in windows.iter().enumerate() {
            if !absorbed[index] && window.intersects(&merged) {
                merged = merged.cover(window);
                absorbed[index] = true;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    (merged, absorbed)
}
