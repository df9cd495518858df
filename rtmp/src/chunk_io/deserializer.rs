use super::chunk_header::{header_length, ChunkHeader, ChunkHeaderFormat, MAX_TIMESTAMP_FIELD};
use super::{ChunkDeserializationError, DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE};
use crate::messages::MessagePayload;
use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use bytes::BytesMut;
use std::cmp::min;
use std::collections::HashMap;
use std::io::Cursor;
use tracing::{trace, warn};

/// Allows deserializing bytes representing RTMP chunks into RTMP message payloads.
///
/// Due to the nature of the RTMP chunk protocol it is required that every byte going through the
/// wire is sent to the same `ChunkDeserializer` instance, as future chunks can rely on previous
/// chunks, so any chunks missing from the stream may cause deserialization errors.
///
/// Partially received messages are tracked per chunk stream, so a peer is free to interleave
/// chunks of messages on different chunk streams.
pub struct ChunkDeserializer {
    max_chunk_size: usize,
    buffer: BytesMut,
    current_header: Option<ChunkHeader>,
    previous_headers: HashMap<u32, ChunkHeader>,
    partial_payloads: HashMap<u32, BytesMut>,
}

enum ChunkReadResult {
    NotEnoughBytes,
    ChunkComplete,
    MessageComplete(MessagePayload),
}

impl ChunkDeserializer {
    /// Create a new `ChunkDeserializer` with its initial properties.
    ///
    /// Per the RTMP specification an initial `ChunkDeserializer` is expecting RTMP chunks with
    /// a max size of 128 bytes.
    pub fn new() -> ChunkDeserializer {
        ChunkDeserializer {
            max_chunk_size: DEFAULT_CHUNK_SIZE as usize,
            buffer: BytesMut::with_capacity(4096),
            current_header: None,
            previous_headers: HashMap::new(),
            partial_payloads: HashMap::new(),
        }
    }

    /// Attempts to read a complete RTMP message from the passed in bytes.
    ///
    /// Bytes that do not (yet) form a complete message are stored internally, so the same bytes
    /// must never be passed in twice.  Only the first complete message is returned.  Consumers
    /// are expected to call `get_next_message()` with an empty slice in a loop until `None` is
    /// returned, reacting to `SetChunkSize` messages (by calling `set_max_chunk_size()`) between
    /// calls, since the peer's next chunk may already use the new size.
    ///
    /// ## Examples
    ///
    /// ```
    /// use bytes::Bytes;
    /// use rml_rtmp::time::RtmpTimestamp;
    /// use rml_rtmp::chunk_io::{ChunkSerializer, ChunkDeserializer};
    /// use rml_rtmp::messages::MessagePayload;
    ///
    /// let first = MessagePayload {
    ///     timestamp: RtmpTimestamp::new(55),
    ///     message_stream_id: 1,
    ///     type_id: 15,
    ///     data: Bytes::from(vec![1, 2, 3, 4, 5, 6]),
    /// };
    ///
    /// let second = MessagePayload {
    ///     timestamp: RtmpTimestamp::new(65),
    ///     message_stream_id: 1,
    ///     type_id: 15,
    ///     data: Bytes::from(vec![8, 9, 10]),
    /// };
    ///
    /// let mut serializer = ChunkSerializer::new();
    /// let mut all_bytes = serializer.serialize(&first, false, false).unwrap().bytes;
    /// all_bytes.extend(serializer.serialize(&second, false, false).unwrap().bytes);
    ///
    /// let mut deserializer = ChunkDeserializer::new();
    /// assert_eq!(deserializer.get_next_message(&all_bytes).unwrap(), Some(first));
    /// assert_eq!(deserializer.get_next_message(&[]).unwrap(), Some(second));
    /// assert_eq!(deserializer.get_next_message(&[]).unwrap(), None);
    /// ```
    pub fn get_next_message(
        &mut self,
        bytes: &[u8],
    ) -> Result<Option<MessagePayload>, ChunkDeserializationError> {
        self.buffer.extend_from_slice(bytes);

        loop {
            if self.current_header.is_none() {
                match self.read_header()? {
                    Some(header) => self.current_header = Some(header),
                    None => return Ok(None),
                }
            }

            match self.read_chunk_data() {
                ChunkReadResult::NotEnoughBytes => return Ok(None),
                ChunkReadResult::ChunkComplete => continue,
                ChunkReadResult::MessageComplete(payload) => return Ok(Some(payload)),
            }
        }
    }

    /// Tells the deserializer that the peer will start sending RTMP chunks with a different
    /// max chunk size.
    ///
    /// This should almost always be called only in reaction to receiving a `SetChunkSize`
    /// message from the other end.
    pub fn set_max_chunk_size(&mut self, new_size: usize) -> Result<(), ChunkDeserializationError> {
        if new_size == 0 || new_size > MAX_CHUNK_SIZE as usize {
            return Err(ChunkDeserializationError::InvalidMaxChunkSize {
                chunk_size: new_size,
            });
        }

        self.max_chunk_size = new_size;
        Ok(())
    }

    /// Returns the maximum size of any RTMP chunks that should be received
    pub fn get_max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    /// Discards the partially received message on the specified chunk stream, as requested by
    /// an `Abort` message.  Returns `true` if there was a partial message to discard.
    pub fn abort_message(&mut self, chunk_stream_id: u32) -> bool {
        let discarded = self.partial_payloads.remove(&chunk_stream_id);
        if let Some(ref partial) = discarded {
            trace!(
                csid = chunk_stream_id,
                bytes = partial.len(),
                "Discarding partial message"
            );
        }

        discarded.is_some()
    }

    fn read_header(&mut self) -> Result<Option<ChunkHeader>, ChunkDeserializationError> {
        let (format, csid, basic_length) = match read_basic_header(&self.buffer[..]) {
            Some(values) => values,
            None => return Ok(None),
        };

        let mut header = match format {
            ChunkHeaderFormat::Full => ChunkHeader::new(csid),
            _ => match self.previous_headers.get(&csid) {
                Some(previous) => previous.clone(),
                None => return Err(ChunkDeserializationError::NoPreviousChunkOnStream { csid }),
            },
        };

        let fixed_length = basic_length + format.message_header_length();
        if self.buffer.len() < fixed_length {
            return Ok(None);
        }

        let mut cursor = Cursor::new(&self.buffer[basic_length..]);
        let timestamp_field = match format {
            ChunkHeaderFormat::Empty => header.timestamp_delta,
            _ => cursor.read_u24::<BigEndian>()?,
        };

        let total_length = header_length(format, csid, timestamp_field);
        if self.buffer.len() < total_length {
            return Ok(None);
        }

        if format == ChunkHeaderFormat::Full
            || format == ChunkHeaderFormat::TimeDeltaWithoutMessageStreamId
        {
            header.message_length = cursor.read_u24::<BigEndian>()?;
            header.message_type_id = cursor.read_u8()?;
        }

        if format == ChunkHeaderFormat::Full {
            header.message_stream_id = cursor.read_u32::<LittleEndian>()?;
        }

        let timestamp_field = if timestamp_field >= MAX_TIMESTAMP_FIELD {
            cursor.read_u32::<BigEndian>()?
        } else {
            timestamp_field
        };

        let continues_message = self.partial_payloads.contains_key(&csid);
        match format {
            ChunkHeaderFormat::Full => header.timestamp.set(timestamp_field),

            // Type 3 chunks inside a split message keep the timestamp of the message's first
            // chunk.  Some encoders (OBS) follow a type 1 chunk with type 3 continuations, and
            // applying the delta again would push timestamps forward.
            ChunkHeaderFormat::Empty if continues_message => (),
            _ => header.timestamp = header.timestamp + timestamp_field,
        }

        if continues_message && format != ChunkHeaderFormat::Empty {
            warn!(
                csid,
                "New message header received while a message was in progress, discarding partial"
            );

            self.partial_payloads.remove(&csid);
        }

        header.timestamp_delta = timestamp_field;
        let _ = self.buffer.split_to(total_length);

        trace!(
            csid,
            format = ?format,
            timestamp = header.timestamp.value,
            length = header.message_length,
            type_id = header.message_type_id,
            "Read chunk header"
        );

        Ok(Some(header))
    }

    fn read_chunk_data(&mut self) -> ChunkReadResult {
        let (csid, message_length) = match self.current_header {
            Some(ref header) => (header.chunk_stream_id, header.message_length as usize),
            None => return ChunkReadResult::NotEnoughBytes,
        };

        let received = self.partial_payloads.get(&csid).map_or(0, |partial| partial.len());
        let chunk_length = min(message_length.saturating_sub(received), self.max_chunk_size);
        if self.buffer.len() < chunk_length {
            return ChunkReadResult::NotEnoughBytes;
        }

        let header = match self.current_header.take() {
            Some(header) => header,
            None => return ChunkReadResult::NotEnoughBytes,
        };

        let chunk = self.buffer.split_to(chunk_length);
        let mut partial = self
            .partial_payloads
            .remove(&csid)
            .unwrap_or_else(|| BytesMut::with_capacity(message_length));

        partial.extend_from_slice(&chunk[..]);

        let result = if partial.len() >= message_length {
            ChunkReadResult::MessageComplete(MessagePayload {
                timestamp: header.timestamp,
                type_id: header.message_type_id,
                message_stream_id: header.message_stream_id,
                data: partial.freeze(),
            })
        } else {
            self.partial_payloads.insert(csid, partial);
            ChunkReadResult::ChunkComplete
        };

        self.previous_headers.insert(csid, header);
        result
    }
}

impl Default for ChunkDeserializer {
    fn default() -> Self {
        ChunkDeserializer::new()
    }
}

/// Reads the format, chunk stream id and basic header length
fn read_basic_header(buffer: &[u8]) -> Option<(ChunkHeaderFormat, u32, usize)> {
    const CSID_MASK: u8 = 0b0011_1111;

    let first = *buffer.first()?;
    let format = ChunkHeaderFormat::from_basic_header(first);
    match first & CSID_MASK {
        0 => {
            let second = *buffer.get(1)?;
            Some((format, second as u32 + 64, 2))
        }

        1 => {
            let second = *buffer.get(1)?;
            let third = *buffer.get(2)?;
            Some((format, (third as u32 * 256) + second as u32 + 64, 3))
        }

        csid => Some((format, csid as u32, 1)),
    }
}
