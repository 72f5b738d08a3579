use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use crate::api::error::CombinerError;
use crate::api::function::Combiner;
use crate::api::window::TimeWindow;
use crate::storage::keyed_state::{TWindowState, WindowValue};

#[derive(Clone, Debug)]
pub struct MemoryWindowState<K, A> {
    states: HashMap<K, HashMap<TimeWindow, WindowValue<A>>>,
    entries: usize,
}

impl<K, A> MemoryWindowState<K, A>
where
    K: Clone + Eq + Hash + Debug,
    A: Clone + Debug,
{
    pub fn new() -> Self {
        MemoryWindowState {
            states: HashMap::new(),
            entries: 0,
        }
    }

    fn insert(&mut self, key: K, value: WindowValue<A>) -> Option<WindowValue<A>> {
        let previous = self
            .states
            .entry(key)
            .or_default()
            .insert(value.window, value);
        if previous.is_none() {
            self.entries += 1;
        }
        previous
    }
}

impl<K, A> Default for MemoryWindowState<K, A>
where
    K: Clone + Eq + Hash + Debug,
    A: Clone + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, A> TWindowState<K, A> for MemoryWindowState<K, A>
where
    K: Clone + Eq + Hash + Debug,
    A: Clone + Debug,
{
    fn get(&self, key: &K, window: &TimeWindow) -> Option<&WindowValue<A>> {
        self.states.get(key).and_then(|windows| windows.get(window))
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
        let lifted = combiner.lift(value)?;

        let windows = self.states.entry(key.clone()).or_default();
        let entries = &mut self.entries;
        let state = windows.entry(window).or_insert_with(|| {
            *entries += 1;
            WindowValue::new(window, combiner.identity())
        });

        let accumulator = std::mem::replace(&mut state.accumulator, combiner.identity());
        state.accumulator = combiner.merge(accumulator, lifted);
        state.late |= late;
        Ok(())
    }

    fn merge<C>(&mut self, key: &K, from: &[TimeWindow], into: TimeWindow, combiner: &C)
    where
        C: Combiner<Accumulator = A>,
    {
        let windows = match self.states.get_mut(key) {
            Some(windows) => windows,
            None => return,
        };

        let mut merged: Option<WindowValue<A>> = windows.remove(&into);
        let mut taken = merged.is_some() as usize;
        for window in from {
            if *window == into {
                continue;
            }
            let value = match windows.remove(window) {
                Some(value) => value,
                None => continue,
            };
            taken += 1;

            merged = Some(match merged {
                Some(acc) => WindowValue {
                    window: into,
                    accumulator: combiner.merge(acc.accumulator, value.accumulator),
                    late: acc.late || value.late,
                    emitted: acc.emitted || value.emitted,
                },
                None => WindowValue {
                    window: into,
                    ..value
                },
            });
        }

        if let Some(value) = merged {
            windows.insert(into, value);
            self.entries = self.entries + 1 - taken;
        }
    }

    fn restore(&mut self, key: K, value: WindowValue<A>) -> Option<WindowValue<A>> {
        self.insert(key, value)
    }

    fn remove(&mut self, key: &K, window: &TimeWindow) -> Option<WindowValue<A>> {
        let windows = self.states.get_mut(key)?;
        let value = windows.remove(window);
        if windows.is_empty() {
            self.states.remove(key);
        }
        if value.is_some() {
            self.entries -= 1;
        }
        value
    }

    fn windows(&self, key: &K) -> Vec<TimeWindow> {
        let mut windows: Vec<TimeWindow> = self
            .states
            .get(key)
            .map(|windows| windows.keys().cloned().collect())
            .unwrap_or_default();
        windows.sort();
        windows
    }

    fn len(&self) -> usize {
        self.entries
    }

    fn snapshot(&self) -> Vec<(K, WindowValue<A>)> {
        let mut entries = Vec::with_capacity(self.entries);
        for (key, windows) in &self.states {
            for value in windows.values() {
                entries.push((key.clone(), value.clone()));
            }
        }
        entries
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use crate::api::window::TimeWindow;
    use crate::functions::combiner::{collect, sum};
    use crate::storage::keyed_state::mem_window_state::MemoryWindowState;
    use crate::storage::keyed_state::{TWindowState, WindowValue};

    #[test]
    pub fn apply_seeds_identity_test() {
        let combiner = sum::<i64>();
        let mut state = MemoryWindowState::new();
        let window = TimeWindow::new(0, 120);

        state.apply(&"k", window, 3, false, &combiner).unwrap();
        state.apply(&"k", window, 4, false, &combiner).unwrap();

        let value = state.get(&"k", &window).unwrap();
        assert_eq!(value.accumulator, 7);
        assert!(!value.late);
        assert_eq!(state.len(), 1);
    }

    #[test]
    pub fn apply_rejected_value_test() {
        let combiner = sum::<f64>();
        let mut state = MemoryWindowState::new();
        let window = TimeWindow::new(0, 120);

        state.apply(&"k", window, 1.5, false, &combiner).unwrap();
        assert!(state.apply(&"k", window, f64::NAN, true, &combiner).is_err());

        let value = state.get(&"k", &window).unwrap();
        assert_eq!(value.accumulator, 1.5);
        assert!(!value.late);
    }

    #[test]
    pub fn merge_test() {
        let combiner = sum::<u64>();
        let mut state = MemoryWindowState::new();
        let a = TimeWindow::new(0, 120);
        let b = TimeWindow::new(100, 220);
        let c = TimeWindow::new(200, 320);
        state.apply(&"k", a, 1, false, &combiner).unwrap();
        state.apply(&"k", b, 2, true, &combiner).unwrap();
        state.apply(&"k", c, 4, false, &combiner).unwrap();
        state.apply(&"other", a, 100, false, &combiner).unwrap();
        assert_eq!(state.len(), 4);

        let into = TimeWindow::new(0, 320);
        state.merge(&"k", &[a, b, c, TimeWindow::new(900, 1000)], into, &combiner);

        assert_eq!(state.windows(&"k"), vec![into]);
        let value = state.get(&"k", &into).unwrap();
        assert_eq!(value.accumulator, 7);
        assert!(value.late);
        assert_eq!(state.len(), 2);
        assert_eq!(state.get(&"other", &a).unwrap().accumulator, 100);
    }

    #[test]
    pub fn merge_pairing_order_test() {
        let values = [i64::MAX, 1, -1, 42, i64::MIN, -7];
        let expected = values.iter().fold(0i64, |acc, v| acc.wrapping_add(*v));
        let names = ["Dog", "Cat", "Owl", "Bat", "Elk", "Ant"];
        let mut expected_names = names.to_vec();
        expected_names.sort();

        let sum = sum::<i64>();
        let collect = collect::<&str>();
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..20 {
            let mut sums = MemoryWindowState::new();
            let mut groups = MemoryWindowState::new();
            let mut live: Vec<TimeWindow> = Vec::new();
            for (i, (value, name)) in values.iter().zip(names.iter()).enumerate() {
                let window = TimeWindow::new(i as u64 * 1000, i as u64 * 1000 + 100);
                sums.apply(&"k", window, *value, false, &sum).unwrap();
                groups.apply(&"k", window, *name, false, &collect).unwrap();
                live.push(window);
            }

            // merge random pairs until one window is left
            while live.len() > 1 {
                let x = live.swap_remove(rng.gen_range(0..live.len()));
                let y = live.swap_remove(rng.gen_range(0..live.len()));
                let into = x.cover(&y);
                sums.merge(&"k", &[x, y], into, &sum);
                groups.merge(&"k", &[x, y], into, &collect);
                live.push(into);
            }

            let window = live[0];
            assert_eq!(window, TimeWindow::new(0, 5100));
            assert_eq!(sums.len(), 1);
            assert_eq!(sums.get(&"k", &window).unwrap().accumulator, expected);
            assert_eq!(groups.get(&"k", &window).unwrap().accumulator, expected_names);
        }
    }

    #[test]
    pub fn merge_into_existing_test() {
        let combiner = collect::<&str>();
        let mut state = MemoryWindowState::new();
        let a = TimeWindow::new(0, 120);
        let into = TimeWindow::new(0, 125);
        state.apply(&"Mammal", a, "Dog", false, &combiner).unwrap();
        state.apply(&"Mammal", into, "Cat", false, &combiner).unwrap();

        state.merge(&"Mammal", &[a, into], into, &combiner);

        assert_eq!(state.len(), 1);
        assert_eq!(state.get(&"Mammal", &into).unwrap().accumulator, vec!["Cat", "Dog"]);
    }

    #[test]
    pub fn restore_and_remove_test() {
        let combiner = sum::<i64>();
        let mut state = MemoryWindowState::new();
        let window = TimeWindow::new(0, 120);
        state.apply(&"k", window, 5, false, &combiner).unwrap();

        let evicted = state.remove(&"k", &window).unwrap();
        assert!(state.is_empty());
        assert!(state.remove(&"k", &window).is_none());

        let mut restored = WindowValue::new(evicted.window, evicted.accumulator);
        restored.emitted = true;
        assert!(state.restore("k", restored).is_none());
        assert_eq!(state.len(), 1);

        let snapshot = state.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot[0].1.emitted);
        assert_eq!(snapshot[0].1.accumulator, 5);
    }
}
