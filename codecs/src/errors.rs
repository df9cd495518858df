use thiserror::Error;

/// Errors raised by the variable length integer codecs
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VarintError {
    /// The length prefix (or the continuation bits) point past the end of the supplied bytes, or
    /// the prefix itself is not a legal value.
    #[error("Malformed variable length integer")]
    MalformedVarint,

    /// The value cannot be represented with the encoding's maximum length
    #[error("The value {value} is too large to be encoded")]
    ValueTooLarge { value: u64 },
}
