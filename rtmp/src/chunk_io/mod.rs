//! Conversion between RTMP message payloads and the chunk stream that carries them.
//!
//! Each direction of a connection needs its own instance: a `ChunkSerializer` for outbound
//! messages and a `ChunkDeserializer` for inbound bytes, since both sides track header
//! compression state per chunk stream.

mod chunk_header;
mod deserialization_errors;
mod deserializer;
mod serialization_errors;
mod serializer;

pub use self::chunk_header::{
    basic_header_length, header_length, ChunkHeaderFormat, MAX_CHUNK_STREAM_ID,
    MIN_CHUNK_STREAM_ID,
};
pub use self::deserialization_errors::ChunkDeserializationError;
pub use self::deserializer::ChunkDeserializer;
pub use self::serialization_errors::ChunkSerializationError;
pub use self::serializer::{ChunkSerializer, Packet};

/// Largest payload a single RTMP message can carry (24 bit length field)
pub const MAX_MESSAGE_LENGTH: usize = 16_777_215;

/// Largest chunk size that can be announced in a SetChunkSize message (31 bits)
pub const MAX_CHUNK_SIZE: u32 = 2_147_483_647;

pub const DEFAULT_CHUNK_SIZE: u32 = 128;
