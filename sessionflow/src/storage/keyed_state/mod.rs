use std::fmt::Debug;
use std::hash::Hash;

use crate::api::backend::KeyedStateBackend;
use crate::api::error::CombinerError;
use crate::api::function::Combiner;
use crate::api::window::TimeWindow;
use crate::storage::keyed_state::mem_window_state::MemoryWindowState;

pub mod mem_window_state;

/// The partial aggregate of one live `(key, window)`.
#[derive(Clone, Debug, PartialEq)]
pub struct WindowValue<A> {
    pub window: TimeWindow,
    pub accumulator: A,
    /// Took in at least one late element.
    pub late: bool,
    /// Already emitted once and brought back from the closed-window ledger.
    pub emitted: bool,
}

impl<A> WindowValue<A> {
    pub fn new(window: TimeWindow, accumulator: A) -> Self {
        WindowValue {
            window,
            accumulator,
            late: false,
            emitted: false,
        }
    }
}

/// Keyed window state, see flink `WindowState`.
pub trait TWindowState<K, A>: Debug {
    fn get(&self, key: &K, window: &TimeWindow) -> Option<&WindowValue<A>>;

    /// Folds one raw value into `(key, window)`, seeding the entry with the combiner's identity
    /// when it does not exist yet. Nothing is mutated when the value is rejected.
    fn apply<C>(
        &mut self,
        key: &K,
        window: TimeWindow,
        value: C::Input,
        late: bool,
        combiner: &C,
    ) -> Result<(), CombinerError>
    where
        C: Combiner<Accumulator = A>;

    /// Replaces the entries of `from` with a single entry for `into`, combining their
    /// aggregates and flags. Windows in `from` without state are skipped; an entry already
    /// stored under `into` takes part in the merge.
    fn merge<C>(&mut self, key: &K, from: &[TimeWindow], into: TimeWindow, combiner: &C)
    where
        C: Combiner<Accumulator = A>;

    /// Puts back an entry that was evicted earlier, replacing any entry for the same window.
    fn restore(&mut self, key: K, value: WindowValue<A>) -> Option<WindowValue<A>>;

    fn remove(&mut self, key: &K, window: &TimeWindow) -> Option<WindowValue<A>>;

    fn windows(&self, key: &K) -> Vec<TimeWindow>;

    /// Number of `(key, window)` entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A copy of every entry, detached from the live state.
    fn snapshot(&self) -> Vec<(K, WindowValue<A>)>;
}

#[derive(Debug)]
pub enum WindowStateWrap<K, A> {
    MemoryWindowState(MemoryWindowState<K, A>),
}

impl<K, A> WindowStateWrap<K, A>
where
    K: Clone + Eq + Hash + Debug,
    A: Clone + Debug,
{
    pub fn new(backend: KeyedStateBackend) -> Self {
        match backend {
            KeyedStateBackend::Memory => WindowStateWrap::MemoryWindowState(MemoryWindowState::new()),
        }
    }
}

impl<K, A> TWindowState<K, A> for WindowStateWrap<K, A>
where
    K: Clone + Eq + Hash + Debug,
    A: Clone + Debug,
{
    fn get(&self, key: &K, window: &TimeWindow) -> Option<&WindowValue<A>> {
        match self {
            WindowStateWrap::MemoryWindowState(state) => state.get(key, window),
        }
    }

    fn apply<C>(
        &mut self,
        key: &K,
        window: TimeWindow,
        value: C::Input,
        late: bool,
        combiner: &C,
    ) -> Result<(), CombinerError>
    where
        C: Combiner<Accumulator = A>,
    {
        match self {
            WindowStateWrap::MemoryWindowState(state) => {
                state.apply(key, window, value, late, combiner)
            }
        }
    }

    fn merge<C>(&mut self, key: &K, from: &[TimeWindow], into: TimeWindow, combiner: &C)
    where
        C: Combiner<Accumulator = A>,
    {
        match self {
            WindowStateWrap::MemoryWindowState(state) => state.merge(key, from, into, combiner),
        }
    }

    fn restore(&mut self, key: K, value: WindowValue<A>) -> Option<WindowValue<A>> {
        match self {
            WindowStateWrap::MemoryWindowState(state) => state.restore(key, value),
        }
    }

    fn remove(&mut self, key: &K, window: &TimeWindow) -> Option<WindowValue<A>> {
        match self {
            WindowStateWrap::MemoryWindowState(state) => state.remove(key, window),
        }
    }

    fn windows(&self, key: &K) -> Vec<TimeWindow> {
        match self {
            WindowStateWrap::MemoryWindowState(state) => state.windows(key),
        }
    }

    fn len(&self) -> usize {
        match self {
            WindowStateWrap::MemoryWindowState(state) => state.len(),
        }
    }

    fn snapshot(&self) -> Vec<(K, WindowValue<A>)> {
        match self {
            WindowStateWrap::MemoryWindowState(state) => state.snapshot(),
        }
    }
}
