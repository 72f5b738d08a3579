pub mod bounded_out_of_orderness_watermarks;
pub mod shared_watermarks;

pub use bounded_out_of_orderness_watermarks::BoundedOutOfOrdernessWatermarks;
pub use shared_watermarks::{SharedWatermark, SharedWatermarks};
