use crate::errors::VarintError;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Av1Error {
    /// The MTU leaves no room for the aggregation header, a length and one byte of payload
    #[error("An MTU of {mtu} bytes is too small to carry AV1 payloads")]
    MtuTooSmall { mtu: usize },

    #[error("OBU header has the forbidden bit set")]
    ForbiddenBitSet,

    #[error("OBU declares {declared} bytes but only {available} remain")]
    ObuSizeExceedsData { declared: usize, available: usize },

    #[error("RTP payload of {size} bytes is too short")]
    PayloadTooShort { size: usize },

    /// The aggregation header's W field does not match the number of elements found
    #[error("Aggregation header declared {declared} OBU elements but {found} were present")]
    InvalidElementCount { declared: u8, found: usize },

    /// A packet flagged as continuing a fragment arrived when no fragment was pending
    #[error("Received a continuation OBU fragment without a preceding fragment")]
    UnexpectedContinuation,

    #[error("Invalid OBU length: {0}")]
    InvalidLength(#[from] VarintError),
}
