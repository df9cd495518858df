use rml_codecs::VarintError;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpsError {
    #[error("The SPS ended before all of its fields could be read")]
    Truncated,

    #[error("NAL unit type {nal_type} is not a sequence parameter set")]
    NotAnSps { nal_type: u8 },

    #[error("Exp-Golomb code for {field} is out of range")]
    InvalidValue { field: &'static str },
}

#[derive(Debug, Error)]
pub enum AacError {
    #[error("The AudioSpecificConfig ended before all of its fields could be read")]
    Truncated,

    #[error("Sampling frequency index {index} is reserved")]
    InvalidSampleRateIndex { index: u8 },

    #[error("The AudioSpecificConfig signals a sampling frequency of zero")]
    ZeroSampleRate,
}

#[derive(Debug, Error)]
pub enum Fmp4Error {
    #[error("Packet was {actual} bytes but at least {expected} were required")]
    TruncatedPacket { expected: usize, actual: usize },

    #[error("Codec '{codec}' is not supported")]
    UnsupportedCodec { codec: String },

    #[error("Packet type {packet_type} is not supported")]
    UnsupportedPacketType { packet_type: u8 },

    /// The AVC decoder configuration record did not contain an SPS
    #[error("Invalid AVC decoder configuration record")]
    InvalidDecoderConfig,

    #[error("Failed to parse the SPS: {0}")]
    Sps(#[from] SpsError),

    #[error("Failed to parse the AudioSpecificConfig: {0}")]
    Aac(#[from] AacError),

    #[error("Descriptor could not be encoded: {0}")]
    Descriptor(#[from] VarintError),

    #[error("An IO error occurred: {0}")]
    Io(#[from] io::Error),
}

/// Returned by subscriptions whose stream was closed
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FanoutError {
    #[error("The subscription was closed")]
    Closed,
}
