use super::{MessageDeserializationError, MessagePayload};
use crate::time::RtmpTimestamp;
use byteorder::{BigEndian, ReadBytesExt};
use bytes::Bytes;
use std::io::Cursor;

/// Type, size, timestamp (24 + 8 bits) and stream id
const TAG_HEADER_SIZE: usize = 11;
const BACK_POINTER_SIZE: usize = 4;

/// Breaks the body of an aggregate message into its sub-messages.
///
/// Each sub-message is laid out as an FLV tag followed by a 4 byte back pointer.  Sub-message
/// timestamps are re-based so the first one equals the aggregate's own `timestamp`, keeping the
/// offsets between them.  The returned payloads carry the stream id written in the tag, which
/// is almost always zero, so callers normally replace it with the aggregate's stream id.
pub fn split_aggregate(
    data: &Bytes,
    timestamp: RtmpTimestamp,
) -> Result<Vec<MessagePayload>, MessageDeserializationError> {
    let mut payloads = Vec::new();
    let mut first_timestamp = None;
    let mut offset = 0;

    while data.len() - offset >= TAG_HEADER_SIZE {
        let mut cursor = Cursor::new(&data[offset..offset + TAG_HEADER_SIZE]);
        let type_id = cursor.read_u8()?;
        let size = cursor.read_u24::<BigEndian>()? as usize;
        let lower_time = cursor.read_u24::<BigEndian>()?;
        let upper_time = cursor.read_u8()? as u32;
        let stream_id = cursor.read_u24::<BigEndian>()?;

        let body_start = offset + TAG_HEADER_SIZE;
        if data.len() - body_start < size {
            return Err(MessageDeserializationError::TruncatedAggregate { offset });
        }

        let tag_time = RtmpTimestamp::new((upper_time << 24) | lower_time);
        let base = *first_timestamp.get_or_insert(tag_time);

        payloads.push(MessagePayload {
            timestamp: timestamp + (tag_time - base),
            type_id,
            message_stream_id: stream_id,
            data: data.slice(body_start..body_start + size),
        });

        // The trailing back pointer may be missing on the last sub-message
        offset = std::cmp::min(body_start + size + BACK_POINTER_SIZE, data.len());
    }

    Ok(payloads)
}

impl MessagePayload {
    /// Splits an aggregate payload, giving every sub-message this payload's stream id
    pub fn split_aggregate(&self) -> Result<Vec<MessagePayload>, MessageDeserializationError> {
        let mut payloads = split_aggregate(&self.data, self.timestamp)?;
        for payload in payloads.iter_mut() {
            payload.message_stream_id = self.message_stream_id;
        }

        Ok(payloads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;

    fn add_tag(bytes: &mut Vec<u8>, type_id: u8, time: u32, body: &[u8]) {
        bytes.write_u8(type_id).unwrap();
        bytes.write_u24::<BigEndian>(body.len() as u32).unwrap();
        bytes.write_u24::<BigEndian>(time & 0x00ff_ffff).unwrap();
        bytes.write_u8((time >> 24) as u8).unwrap();
        bytes.write_u24::<BigEndian>(0).unwrap();
        bytes.extend_from_slice(body);
        bytes.write_u32::<BigEndian>((TAG_HEADER_SIZE + body.len()) as u32).unwrap();
    }

    #[test]
    fn sub_messages_are_rebased_on_aggregate_timestamp() {
        let mut bytes = Vec::new();
        add_tag(&mut bytes, 9, 5000, &[0x17, 1]);
        add_tag(&mut bytes, 8, 5023, &[0xaf, 1, 2]);
        add_tag(&mut bytes, 9, 5040, &[0x27, 1]);

        let aggregate = MessagePayload {
            timestamp: RtmpTimestamp::new(100),
            type_id: 22,
            message_stream_id: 1,
            data: Bytes::from(bytes),
        };

        let payloads = aggregate.split_aggregate().unwrap();
        assert_eq!(payloads.len(), 3);

        assert_eq!(payloads[0].type_id, 9);
        assert_eq!(payloads[0].timestamp, RtmpTimestamp::new(100));
        assert_eq!(&payloads[0].data[..], &[0x17, 1]);

        assert_eq!(payloads[1].type_id, 8);
        assert_eq!(payloads[1].timestamp, RtmpTimestamp::new(123));
        assert_eq!(&payloads[1].data[..], &[0xaf, 1, 2]);

        assert_eq!(payloads[2].timestamp, RtmpTimestamp::new(140));
        assert!(payloads.iter().all(|p| p.message_stream_id == 1));
    }

    #[test]
    fn extended_tag_timestamp_byte_is_used() {
        let mut bytes = Vec::new();
        add_tag(&mut bytes, 9, 0x0100_0000, &[1]);
        add_tag(&mut bytes, 9, 0x0100_0010, &[2]);

        let payloads = split_aggregate(&Bytes::from(bytes), RtmpTimestamp::new(0)).unwrap();
        assert_eq!(payloads[1].timestamp, RtmpTimestamp::new(0x10));
    }

    #[test]
    fn truncated_sub_message_is_an_error() {
        let mut bytes = Vec::new();
        add_tag(&mut bytes, 9, 0, &[1, 2, 3]);
        add_tag(&mut bytes, 9, 10, &[1, 2, 3, 4]);
        let cut = bytes.len() - 6;
        bytes.truncate(cut);

        match split_aggregate(&Bytes::from(bytes), RtmpTimestamp::new(0)) {
            Err(MessageDeserializationError::TruncatedAggregate { offset }) => {
                assert_eq!(offset, TAG_HEADER_SIZE + 3 + BACK_POINTER_SIZE)
            }
            x => panic!("Unexpected result: {:?}", x),
        }
    }

    #[test]
    fn empty_aggregate_has_no_messages() {
        let payloads = split_aggregate(&Bytes::new(), RtmpTimestamp::new(0)).unwrap();
        assert!(payloads.is_empty());
    }
}
