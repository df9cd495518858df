use super::chunk_header::{
    header_length, ChunkHeader, ChunkHeaderFormat, MAX_CHUNK_STREAM_ID, MAX_TIMESTAMP_FIELD,
    MIN_CHUNK_STREAM_ID,
};
use super::{ChunkSerializationError, DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE, MAX_MESSAGE_LENGTH};
use crate::messages::{MessagePayload, RtmpMessage};
use crate::time::RtmpTimestamp;
use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use std::cmp::min;
use std::collections::HashMap;
use tracing::trace;

/// An outbound data packet containing the at least one RTMP chunk with a single RTMP message.
/// The packet can be flagged as droppable because video and audio packets may be allowed to be
/// dropped if there is not enough bandwidth for the current bitrate.
#[derive(Debug, PartialEq)]
pub struct Packet {
    pub bytes: Vec<u8>,
    pub can_be_dropped: bool,
}

/// Allows serializing RTMP messages into RTMP chunks.
///
/// Due to the nature of the RTMP chunking protocol, the same serializer should be used
/// for all messages that need to be sent to the same peer.
pub struct ChunkSerializer {
    previous_headers: HashMap<u32, ChunkHeader>,
    max_chunk_size: u32,
}

impl ChunkSerializer {
    /// Creates a new `ChunkSerializer` that splits messages into chunks of at most 128 bytes
    pub fn new() -> ChunkSerializer {
        ChunkSerializer {
            max_chunk_size: DEFAULT_CHUNK_SIZE,
            previous_headers: HashMap::new(),
        }
    }

    pub fn get_max_chunk_size(&self) -> u32 {
        self.max_chunk_size
    }

    /// Changes the maximum amount of bytes from RTMP messages that can be in a single RTMP chunk.
    ///
    /// The peer has to be told about the change before any chunk of the new size arrives, so
    /// the returned packet carries the `SetChunkSize` message (serialized with the old size).
    /// It *must* be sent.
    pub fn set_max_chunk_size(
        &mut self,
        new_size: u32,
        time: RtmpTimestamp,
    ) -> Result<Packet, ChunkSerializationError> {
        if new_size == 0 || new_size > MAX_CHUNK_SIZE {
            return Err(ChunkSerializationError::InvalidMaxChunkSize {
                attempted_chunk_size: new_size,
            });
        }

        let message = RtmpMessage::SetChunkSize { size: new_size };
        let payload = MessagePayload::from_rtmp_message(message, time, 0)?;
        let packet = self.serialize(&payload, true, false)?;

        self.max_chunk_size = new_size;
        Ok(packet)
    }

    /// Turns an RTMP message payload into the chunks that carry it, on the chunk stream
    /// conventionally used for its message type.
    ///
    /// Headers are compressed against the previous header sent on the same chunk stream.  Setting
    /// `force_uncompressed` always emits a type 0 header, which some peers require for the first
    /// messages after the handshake.
    ///
    /// Video and audio messages that are not sequence headers may be flagged with
    /// `can_be_dropped`.  The next message on the same chunk stream then gets a type 0 header,
    /// so the peer can still decode it when the transport decided to drop this packet.
    pub fn serialize(
        &mut self,
        message: &MessagePayload,
        force_uncompressed: bool,
        can_be_dropped: bool,
    ) -> Result<Packet, ChunkSerializationError> {
        let csid = get_csid_for_message_type(message.type_id);
        self.serialize_on_chunk_stream(message, csid, force_uncompressed, can_be_dropped)
    }

    /// Same as `serialize()` but on an explicitly chosen chunk stream (2 to 65599)
    pub fn serialize_on_chunk_stream(
        &mut self,
        message: &MessagePayload,
        chunk_stream_id: u32,
        force_uncompressed: bool,
        can_be_dropped: bool,
    ) -> Result<Packet, ChunkSerializationError> {
        if chunk_stream_id < MIN_CHUNK_STREAM_ID || chunk_stream_id > MAX_CHUNK_STREAM_ID {
            return Err(ChunkSerializationError::InvalidChunkStreamId {
                csid: chunk_stream_id,
            });
        }

        if message.data.len() > MAX_MESSAGE_LENGTH {
            return Err(ChunkSerializationError::MessageTooLong {
                size: message.data.len(),
            });
        }

        let mut header = ChunkHeader {
            chunk_stream_id,
            timestamp: message.timestamp,
            timestamp_delta: message.timestamp.value,
            message_length: message.data.len() as u32,
            message_type_id: message.type_id,
            message_stream_id: message.message_stream_id,
            can_be_dropped,
        };

        let format = match self.previous_headers.get(&chunk_stream_id) {
            _ if force_uncompressed => ChunkHeaderFormat::Full,
            None => ChunkHeaderFormat::Full,
            Some(previous) if previous.can_be_dropped => ChunkHeaderFormat::Full,
            Some(previous) if header.timestamp < previous.timestamp => ChunkHeaderFormat::Full,
            Some(previous) => {
                header.timestamp_delta = (header.timestamp - previous.timestamp).value;
                get_header_format(&header, previous)
            }
        };

        if format == ChunkHeaderFormat::Full {
            header.timestamp_delta = header.timestamp.value;
        }

        let chunk_size = self.max_chunk_size as usize;
        let chunk_count = if message.data.is_empty() {
            1
        } else {
            (message.data.len() + chunk_size - 1) / chunk_size
        };

        let mut bytes = Vec::with_capacity(
            message.data.len()
                + header_length(format, chunk_stream_id, header.timestamp_delta)
                + (chunk_count - 1)
                    * header_length(ChunkHeaderFormat::Empty, chunk_stream_id, header.timestamp_delta),
        );

        for index in 0..chunk_count {
            let start = index * chunk_size;
            let end = min(start + chunk_size, message.data.len());

            // Continuation chunks always use type 3 headers
            let chunk_format = if index == 0 {
                format
            } else {
                ChunkHeaderFormat::Empty
            };

            write_header(&mut bytes, chunk_format, &header)?;
            bytes.extend_from_slice(&message.data[start..end]);
        }

        trace!(
            csid = chunk_stream_id,
            format = ?format,
            type_id = message.type_id,
            length = message.data.len(),
            chunks = chunk_count,
            "Serialized message"
        );

        self.previous_headers.insert(chunk_stream_id, header);
        Ok(Packet {
            bytes,
            can_be_dropped,
        })
    }
}

impl Default for ChunkSerializer {
    fn default() -> Self {
        ChunkSerializer::new()
    }
}

fn write_header(
    bytes: &mut Vec<u8>,
    format: ChunkHeaderFormat,
    header: &ChunkHeader,
) -> Result<(), ChunkSerializationError> {
    write_basic_header(bytes, format, header.chunk_stream_id)?;

    if format != ChunkHeaderFormat::Empty {
        bytes.write_u24::<BigEndian>(min(header.timestamp_delta, MAX_TIMESTAMP_FIELD))?;
    }

    if format == ChunkHeaderFormat::Full
        || format == ChunkHeaderFormat::TimeDeltaWithoutMessageStreamId
    {
        bytes.write_u24::<BigEndian>(header.message_length)?;
        bytes.write_u8(header.message_type_id)?;
    }

    if format == ChunkHeaderFormat::Full {
        bytes.write_u32::<LittleEndian>(header.message_stream_id)?;
    }

    if header.timestamp_delta >= MAX_TIMESTAMP_FIELD {
        bytes.write_u32::<BigEndian>(header.timestamp_delta)?;
    }

    Ok(())
}

fn write_basic_header(
    bytes: &mut Vec<u8>,
    format: ChunkHeaderFormat,
    csid: u32,
) -> Result<(), ChunkSerializationError> {
    let mask = format.basic_header_mask();
    match csid {
        2..=63 => bytes.write_u8(mask | csid as u8)?,
        64..=319 => {
            bytes.write_u8(mask)?;
            bytes.write_u8((csid - 64) as u8)?;
        }

        320..=MAX_CHUNK_STREAM_ID => {
            bytes.write_u8(mask | 1)?;
            bytes.write_u16::<LittleEndian>((csid - 64) as u16)?;
        }

        _ => return Err(ChunkSerializationError::InvalidChunkStreamId { csid }),
    }

    Ok(())
}

fn get_csid_for_message_type(message_type_id: u8) -> u32 {
    // Spreading message types across chunk streams lets repeated messages of the same kind
    // compress against each other
    match message_type_id {
        1 | 2 | 3 | 4 | 5 | 6 => 2,
        15 | 17 | 18 | 19 | 20 => 3,
        9 => 4,
        8 => 5,
        _ => 6,
    }
}

fn get_header_format(current: &ChunkHeader, previous: &ChunkHeader) -> ChunkHeaderFormat {
    if current.message_stream_id != previous.message_stream_id {
        return ChunkHeaderFormat::Full;
    }

    if current.message_type_id != previous.message_type_id
        || current.message_length != previous.message_length
    {
        return ChunkHeaderFormat::TimeDeltaWithoutMessageStreamId;
    }

    if current.timestamp_delta != previous.timestamp_delta {
        return ChunkHeaderFormat::TimeDeltaOnly;
    }

    ChunkHeaderFormat::Empty
}
