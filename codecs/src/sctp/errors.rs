use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SctpError {
    #[error("Packet of {size} bytes is smaller than the 12 byte common header")]
    PacketTooShort { size: usize },

    #[error("Checksum mismatch: packet carried {carried:#010x} but computed {computed:#010x}")]
    ChecksumMismatch { carried: u32, computed: u32 },

    /// A chunk or parameter length field is smaller than its header or runs past the packet
    #[error("Invalid length {length} for chunk or parameter type {type_id}")]
    InvalidLength { type_id: u16, length: usize },

    /// INIT and INIT ACK chunks must not carry a zero initiate tag or zero stream counts
    #[error("Invalid INIT chunk: {reason}")]
    InvalidInit { reason: &'static str },

    #[error("{0}")]
    Io(#[from] io::Error),
}
