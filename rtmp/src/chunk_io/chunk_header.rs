use crate::time::RtmpTimestamp;

/// Largest value that fits in the 24 bit timestamp field.  A field holding this value means the
/// real timestamp (or delta) follows the message header as a 32 bit extended timestamp.
pub const MAX_TIMESTAMP_FIELD: u32 = 0x00ff_ffff;

pub const MIN_CHUNK_STREAM_ID: u32 = 2;
pub const MAX_CHUNK_STREAM_ID: u32 = 65599;

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum ChunkHeaderFormat {
    Full,                            // Format 0
    TimeDeltaWithoutMessageStreamId, // Format 1
    TimeDeltaOnly,                   // Format 2
    Empty,                           // Format 3
}

impl ChunkHeaderFormat {
    pub fn from_basic_header(byte: u8) -> ChunkHeaderFormat {
        match byte >> 6 {
            0 => ChunkHeaderFormat::Full,
            1 => ChunkHeaderFormat::TimeDeltaWithoutMessageStreamId,
            2 => ChunkHeaderFormat::TimeDeltaOnly,
            _ => ChunkHeaderFormat::Empty,
        }
    }

    pub fn basic_header_mask(self) -> u8 {
        match self {
            ChunkHeaderFormat::Full => 0b0000_0000,
            ChunkHeaderFormat::TimeDeltaWithoutMessageStreamId => 0b0100_0000,
            ChunkHeaderFormat::TimeDeltaOnly => 0b1000_0000,
            ChunkHeaderFormat::Empty => 0b1100_0000,
        }
    }

    /// Number of message header bytes that follow the basic header
    pub fn message_header_length(self) -> usize {
        match self {
            ChunkHeaderFormat::Full => 11,
            ChunkHeaderFormat::TimeDeltaWithoutMessageStreamId => 7,
            ChunkHeaderFormat::TimeDeltaOnly => 3,
            ChunkHeaderFormat::Empty => 0,
        }
    }
}

/// The header values in effect for a chunk stream.
///
/// `timestamp_delta` holds the value carried by the timestamp field of the last header seen on
/// the stream, after extended timestamp resolution.  For format 0 headers that is the absolute
/// timestamp, otherwise it's a delta.  Format 3 headers re-apply it.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkHeader {
    pub chunk_stream_id: u32,
    pub timestamp: RtmpTimestamp,
    pub timestamp_delta: u32,
    pub message_length: u32,
    pub message_type_id: u8,
    pub message_stream_id: u32,
    pub can_be_dropped: bool,
}

impl ChunkHeader {
    pub fn new(chunk_stream_id: u32) -> ChunkHeader {
        ChunkHeader {
            chunk_stream_id,
            timestamp: RtmpTimestamp::new(0),
            timestamp_delta: 0,
            message_length: 0,
            message_type_id: 0,
            message_stream_id: 0,
            can_be_dropped: false,
        }
    }
}

/// Size of the basic header needed for the chunk stream id
pub fn basic_header_length(chunk_stream_id: u32) -> usize {
    match chunk_stream_id {
        0..=63 => 1,
        64..=319 => 2,
        _ => 3,
    }
}

/// Total size of a chunk header.  Every format decides its own length: 12, 8, 4 and 1 bytes for
/// formats 0 through 3 with a one byte basic header.  Larger chunk stream ids add one or two
/// basic header bytes, and a timestamp field that overflows 24 bits adds the 4 byte extended
/// timestamp.
pub fn header_length(format: ChunkHeaderFormat, chunk_stream_id: u32, timestamp_field: u32) -> usize {
    let mut length = basic_header_length(chunk_stream_id) + format.message_header_length();
    if timestamp_field >= MAX_TIMESTAMP_FIELD {
        length += 4;
    }

    length
}
