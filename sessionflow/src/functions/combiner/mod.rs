//! Stock combiners. Each one is associative and commutative, so the order elements reach a
//! session window, and the order windows merge in, never changes the final aggregate.

use std::fmt::Debug;
use std::marker::PhantomData;

use crate::api::function::{Combiner, NamedFunction};
use crate::api::CombinerError;

pub fn sum<T: SumValue>() -> SumCombiner<T> {
    SumCombiner {
        _marker: PhantomData,
    }
}

pub fn count<T>() -> CountCombiner<T> {
    CountCombiner {
        _marker: PhantomData,
    }
}

pub fn min<T>() -> MinCombiner<T> {
    MinCombiner {
        _marker: PhantomData,
    }
}

pub fn max<T>() -> MaxCombiner<T> {
    MaxCombiner {
        _marker: PhantomData,
    }
}

/// Group-by-key: the aggregate is every value of the window, kept sorted.
pub fn collect<T>() -> CollectCombiner<T> {
    CollectCombiner {
        _marker: PhantomData,
    }
}

/// Numeric types `sum()` is defined over.
pub trait SumValue: Copy + Debug + Send + Sync + 'static {
    fn zero() -> Self;
    fn add(self, other: Self) -> Self;
    /// Rejects values outside the domain the sum is total over.
    fn check(self, combiner: &str) -> Result<Self, CombinerError>;
}

/// Wraps on overflow. Saturating a signed sum would make the result depend on merge order.
impl SumValue for i64 {
    fn zero() -> Self {
        0
    }

    fn add(self, other: Self) -> Self {
        self.wrapping_add(other)
    }

    fn check(self, _combiner: &str) -> Result<Self, CombinerError> {
        Ok(self)
    }
}

/// Saturates at `u64::MAX`, which equals `min(true_sum, MAX)` for any merge order.
impl SumValue for u64 {
    fn zero() -> Self {
        0
    }

    fn add(self, other: Self) -> Self {
        self.saturating_add(other)
    }

    fn check(self, _combiner: &str) -> Result<Self, CombinerError> {
        Ok(self)
    }
}

/// Inputs must be finite, but the sum itself is not checked: two finite values can still add
/// up to an infinity, and float rounding makes the last bits depend on merge order.
impl SumValue for f64 {
    fn zero() -> Self {
        0.0
    }

    fn add(self, other: Self) -> Self {
        self + other
    }

    fn check(self, combiner: &str) -> Result<Self, CombinerError> {
        if self.is_finite() {
            Ok(self)
        } else {
            Err(CombinerError::NonFinite {
                combiner: combiner.to_string(),
                value: self,
            })
        }
    }
}

#[derive(Debug, Function)]
pub struct SumCombiner<T> {
    _marker: PhantomData<T>,
}

impl<T> Combiner for SumCombiner<T>
where
    T: SumValue,
{
    type Input = T;
    type Accumulator = T;

    fn identity(&self) -> T {
        T::zero()
    }

    fn lift(&self, input: T) -> Result<T, CombinerError> {
        input.check(self.name())
    }

    fn merge(&self, left: T, right: T) -> T {
        left.add(right)
    }
}

#[derive(Debug, Function)]
pub struct CountCombiner<T> {
    _marker: PhantomData<T>,
}

impl<T> Combiner for CountCombiner<T>
where
    T: Debug + Send + Sync,
{
    type Input = T;
    type Accumulator = u64;

    fn identity(&self) -> u64 {
        0
    }

    fn lift(&self, _input: T) -> Result<u64, CombinerError> {
        Ok(1)
    }

    fn merge(&self, left: u64, right: u64) -> u64 {
        left.saturating_add(right)
    }
}

fn check_ordered<T: PartialOrd>(input: &T, combiner: &str) -> Result<(), CombinerError> {
    // NaN and friends are not comparable to themselves
    match input.partial_cmp(input) {
        Some(_) => Ok(()),
        None => Err(CombinerError::Unordered {
            combiner: combiner.to_string(),
        }),
    }
}

#[derive(Debug, Function)]
pub struct MinCombiner<T> {
    _marker: PhantomData<T>,
}

impl<T> Combiner for MinCombiner<T>
where
    T: PartialOrd + Clone + Debug + Send + Sync,
{
    type Input = T;
    type Accumulator = Option<T>;

    fn identity(&self) -> Option<T> {
        None
    }

    fn lift(&self, input: T) -> Result<Option<T>, CombinerError> {
        check_ordered(&input, self.name())?;
        Ok(Some(input))
    }

    fn merge(&self, left: Option<T>, right: Option<T>) -> Option<T> {
        match (left, right) {
            (Some(l), Some(r)) => Some(if r < l { r } else { l }),
            (l, None) => l,
            (None, r) => r,
        }
    }
}

#[derive(Debug, Function)]
pub struct MaxCombiner<T> {
    _marker: PhantomData<T>,
}

impl<T> Combiner for MaxCombiner<T>
where
    T: PartialOrd + Clone + Debug + Send + Sync,
{
    type Input = T;
    type Accumulator = Option<T>;

    fn identity(&self) -> Option<T> {
        None
    }

    fn lift(&self, input: T) -> Result<Option<T>, CombinerError> {
        check_ordered(&input, self.name())?;
        Ok(Some(input))
    }

    fn merge(&self, left: Option<T>, right: Option<T>) -> Option<T> {
        match (left, right) {
            (Some(l), Some(r)) => Some(if r > l { r } else { l }),
            (l, None) => l,
            (None, r) => r,
        }
    }
}

#[derive(Debug, Function)]
pub struct CollectCombiner<T> {
    _marker: PhantomData<T>,
}

impl<T> Combiner for CollectCombiner<T>
where
    T: Ord + Clone + Debug + Send + Sync,
{
    type Input = T;
    type Accumulator = Vec<T>;

    fn identity(&self) -> Vec<T> {
        Vec::new()
    }

    fn lift(&self, input: T) -> Result<Vec<T>, CombinerError> {
        Ok(vec![input])
    }

    fn merge(&self, left: Vec<T>, right: Vec<T>) -> Vec<T> {
        if left.is_empty() {
            return right;
        }
        if right.is_empty() {
            return left;
        }

        let mut merged = Vec::with_capacity(left.len() + right.len());
        let mut left = left.into_iter().peekable();
        let mut right = right.into_iter().peekable();
        loop {
            let take_left = match (left.peek(), right.peek()) {
                (Some(l), Some(r)) => l <= r,
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (None, None) => break,
            };
            let next = if take_left { left.next() } else { right.next() };
            merged.extend(next);
        }
        merged
    }
}
