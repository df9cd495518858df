use crate::messages::MessageSerializationError;
use std::io;
use thiserror::Error;

/// An enumeration defining all the possible errors that could occur while serializing
/// RTMP messages into RTMP chunks.
#[derive(Debug, Error)]
pub enum ChunkSerializationError {
    /// RTMP specification states that a message cannot be more than 16777215, even when split
    /// across multiple RTMP chunks
    #[error("The current message has a length of {size} bytes, which is over the allowed size of 16777215 bytes")]
    MessageTooLong { size: usize },

    /// Encountered when the chunk size is set to an invalid value
    #[error("An invalid chunk size of {attempted_chunk_size} was specified.  Chunk size must be between 1 and 2147483647")]
    InvalidMaxChunkSize { attempted_chunk_size: u32 },

    /// Only chunk stream ids 2 through 65599 can be represented in a basic header
    #[error("Chunk stream id {csid} cannot be encoded, only ids 2 through 65599 are allowed")]
    InvalidChunkStreamId { csid: u32 },

    /// Occurs when an error is returned when trying to create a set chunk size message
    #[error("Failed to create SetChunkSize message: {0}")]
    SetChunkSizeMessageCreation(#[from] MessageSerializationError),

    /// An I/O error occurred while writing the output buffer
    #[error("{0}")]
    Io(#[from] io::Error),
}
