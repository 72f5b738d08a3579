pub mod combiner;
pub mod filter;
pub mod sink;
pub mod source;
pub mod watermark;
pub mod window;
