use super::{MessageDeserializationError, MessageSerializationError};
use super::{RtmpMessage, UserControlEventType};
use crate::time::RtmpTimestamp;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;
use std::io::Cursor;

/// The extra values each event type carries after its 16 bit event id
enum EventLayout {
    StreamId,
    StreamIdAndLength,
    Timestamp,
}

fn event_id(event_type: UserControlEventType) -> (u16, EventLayout) {
    match event_type {
        UserControlEventType::StreamBegin => (0, EventLayout::StreamId),
        UserControlEventType::StreamEof => (1, EventLayout::StreamId),
        UserControlEventType::StreamDry => (2, EventLayout::StreamId),
        UserControlEventType::SetBufferLength => (3, EventLayout::StreamIdAndLength),
        UserControlEventType::StreamIsRecorded => (4, EventLayout::StreamId),
        UserControlEventType::PingRequest => (6, EventLayout::Timestamp),
        UserControlEventType::PingResponse => (7, EventLayout::Timestamp),
        UserControlEventType::BufferEmpty => (31, EventLayout::StreamId),
        UserControlEventType::BufferReady => (32, EventLayout::StreamId),
    }
}

fn event_type(id: u16) -> Option<UserControlEventType> {
    match id {
        0 => Some(UserControlEventType::StreamBegin),
        1 => Some(UserControlEventType::StreamEof),
        2 => Some(UserControlEventType::StreamDry),
        3 => Some(UserControlEventType::SetBufferLength),
        4 => Some(UserControlEventType::StreamIsRecorded),
        6 => Some(UserControlEventType::PingRequest),
        7 => Some(UserControlEventType::PingResponse),
        31 => Some(UserControlEventType::BufferEmpty),
        32 => Some(UserControlEventType::BufferReady),
        _ => None,
    }
}

/// Missing optional values are written as zero
pub fn serialize(
    event_type: UserControlEventType,
    stream_id: Option<u32>,
    buffer_length: Option<u32>,
    timestamp: Option<RtmpTimestamp>,
) -> Result<Bytes, MessageSerializationError> {
    let (id, layout) = event_id(event_type);
    let mut bytes = Vec::with_capacity(10);
    bytes.write_u16::<BigEndian>(id)?;

    match layout {
        EventLayout::StreamId => bytes.write_u32::<BigEndian>(stream_id.unwrap_or(0))?,
        EventLayout::StreamIdAndLength => {
            bytes.write_u32::<BigEndian>(stream_id.unwrap_or(0))?;
            bytes.write_u32::<BigEndian>(buffer_length.unwrap_or(0))?;
        }

        EventLayout::Timestamp => {
            bytes.write_u32::<BigEndian>(timestamp.map_or(0, |time| time.value))?
        }
    }

    Ok(Bytes::from(bytes))
}

pub fn deserialize(data: &[u8]) -> Result<RtmpMessage, MessageDeserializationError> {
    let mut cursor = Cursor::new(data);
    let event_type = match event_type(cursor.read_u16::<BigEndian>()?) {
        Some(event_type) => event_type,
        None => return Err(MessageDeserializationError::InvalidMessageFormat),
    };

    let mut stream_id = None;
    let mut buffer_length = None;
    let mut timestamp = None;

    match event_id(event_type).1 {
        EventLayout::StreamId => stream_id = Some(cursor.read_u32::<BigEndian>()?),
        EventLayout::StreamIdAndLength => {
            stream_id = Some(cursor.read_u32::<BigEndian>()?);
            buffer_length = Some(cursor.read_u32::<BigEndian>()?);
        }

        EventLayout::Timestamp => {
            timestamp = Some(RtmpTimestamp::new(cursor.read_u32::<BigEndian>()?))
        }
    }

    Ok(RtmpMessage::UserControl {
        event_type,
        stream_id,
        buffer_length,
        timestamp,
    })
}
