pub mod driver;
pub mod logger;
pub mod partition;
pub mod trigger;

pub use driver::{Driver, DriverReport, StopHandle, WindowSnapshot};
pub use partition::{PartitionReport, PartitionedRuntime, RuntimeReport};
