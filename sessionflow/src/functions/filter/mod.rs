use std::fmt::{Debug, Formatter};

use crate::api::element::Element;
use crate::api::function::{FilterFunction, NamedFunction};

/// Wraps a predicate closure as a `FilterFunction`.
pub fn filter_fn<K, V, F>(name: &str, predicate: F) -> FnFilter<F>
where
    F: Fn(&Element<K, V>) -> bool + Send + Sync,
{
    FnFilter {
        name: name.to_string(),
        predicate,
    }
}

pub struct FnFilter<F> {
    name: String,
    predicate: F,
}

impl<K, V, F> FilterFunction<K, V> for FnFilter<F>
where
    F: Fn(&Element<K, V>) -> bool + Send + Sync,
{
    fn filter(&self, element: &Element<K, V>) -> bool {
        (self.predicate)(element)
    }
}

impl<F> NamedFunction for FnFilter<F> {
    fn name(&self) -> &str {
        self.name.as_str()
    }
}

impl<F> Debug for FnFilter<F> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnFilter").field("name", &self.name).finish()
    }
}
