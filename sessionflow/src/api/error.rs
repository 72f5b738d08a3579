use crate::api::properties::PropertiesError;

/// A source element that could not be decoded. The element is dropped and the stream continues.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("decode error: {reason}")]
pub struct DecodeError {
    pub reason: String,
}

impl DecodeError {
    pub fn new<T: ToString>(reason: T) -> Self {
        DecodeError {
            reason: reason.to_string(),
        }
    }
}

/// A value outside the combiner's declared domain. Fatal to the key-partition that met it.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum CombinerError {
    #[error("combiner `{combiner}` rejects non-finite value {value}")]
    NonFinite { combiner: String, value: f64 },
    #[error("combiner `{combiner}` rejects a value with no total order")]
    Unordered { combiner: String },
    #[error("combiner `{combiner}`: {reason}")]
    Custom { combiner: String, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Combiner(#[from] CombinerError),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Properties(#[from] PropertiesError),
    #[error("partition {partition} failed: {reason}")]
    PartitionFailed { partition: u16, reason: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn config<T: ToString>(msg: T) -> Self {
        Error::Config(msg.to_string())
    }

    /// Errors that take a whole partition down rather than a single element.
    pub fn is_partition_fatal(&self) -> bool {
        matches!(self, Error::Combiner(_) | Error::PartitionFailed { .. })
    }
}
