pub mod memory;
pub mod print;

pub use memory::{memory_sink, MemoryOutputFormat};
pub use print::{print_sink, PrintOutputFormat};
