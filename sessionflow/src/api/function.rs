use std::fmt::Debug;

use crate::api::element::{Element, Emission};
use crate::api::{CombinerError, DecodeError};

/// Base trait of all user functions. The name shows up in logs and metric names.
pub trait NamedFunction {
    fn name(&self) -> &str;
}

/// Identifies the partition a function instance runs in.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Context {
    pub partition: u16,
    pub num_partitions: u16,
}

impl Context {
    pub fn new(partition: u16, num_partitions: u16) -> Self {
        Context {
            partition,
            num_partitions,
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Context::new(0, 1)
    }
}

/// An associative, commutative reduction folded incrementally into a running aggregate.
///
/// `merge` must be total; domain checks belong in `lift`, which is the only fallible step.
/// Merging with `identity()` must return the other operand unchanged.
pub trait Combiner
where
    Self: NamedFunction + Debug + Send + Sync,
{
    type Input;
    type Accumulator: Clone + Debug + Send;

    fn identity(&self) -> Self::Accumulator;

    /// Turns one raw value into a single-element aggregate.
    fn lift(&self, input: Self::Input) -> Result<Self::Accumulator, CombinerError>;

    fn merge(&self, left: Self::Accumulator, right: Self::Accumulator) -> Self::Accumulator;

    fn fold(
        &self,
        accumulator: Self::Accumulator,
        input: Self::Input,
    ) -> Result<Self::Accumulator, CombinerError> {
        let value = self.lift(input)?;
        Ok(self.merge(accumulator, value))
    }
}

pub trait FilterFunction<K, V>
where
    Self: NamedFunction + Debug + Send + Sync,
{
    /// Returns `false` for elements that must not reach the window assigner.
    fn filter(&self, element: &Element<K, V>) -> bool;
}

/// The source adapter: a lazy, possibly infinite sequence of elements.
pub trait InputFormat<K, V>
where
    Self: NamedFunction,
{
    fn open(&mut self, context: &Context) -> crate::api::Result<()>;

    /// `None` signals end of stream. A decode failure drops that element only.
    fn next_element(&mut self) -> Option<Result<Element<K, V>, DecodeError>>;

    fn close(&mut self) -> crate::api::Result<()>;
}

/// The sink adapter: receives one emission per closed window, at least once.
pub trait OutputFormat<K, A>
where
    Self: NamedFunction,
{
    fn open(&mut self, context: &Context) -> crate::api::Result<()>;

    fn write_emission(&mut self, emission: Emission<K, A>);

    fn close(&mut self) -> crate::api::Result<()>;
}
