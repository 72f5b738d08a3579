pub mod decode_input_format;
pub mod vec_input_format;

pub use decode_input_format::{decode_source, DecodeInputFormat};
pub use vec_input_format::{vec_source, VecInputFormat};
