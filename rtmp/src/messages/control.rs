//! Protocol control messages: the fixed size payloads of message types 1, 2, 3, 5 and 6

use super::{MessageDeserializationError, MessageSerializationError};
use super::{PeerBandwidthLimitType, RtmpMessage};
use crate::chunk_io::MAX_CHUNK_SIZE;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;
use std::io::Cursor;

pub fn serialize_u32(value: u32) -> Result<Bytes, MessageSerializationError> {
    let mut bytes = Vec::with_capacity(4);
    bytes.write_u32::<BigEndian>(value)?;
    Ok(Bytes::from(bytes))
}

pub fn read_u32(data: &[u8]) -> Result<u32, MessageDeserializationError> {
    let mut cursor = Cursor::new(data);
    Ok(cursor.read_u32::<BigEndian>()?)
}

pub fn serialize_set_chunk_size(size: u32) -> Result<Bytes, MessageSerializationError> {
    if size == 0 || size > MAX_CHUNK_SIZE {
        return Err(MessageSerializationError::InvalidChunkSize { size });
    }

    serialize_u32(size)
}

pub fn deserialize_set_chunk_size(data: &[u8]) -> Result<RtmpMessage, MessageDeserializationError> {
    // The first bit is reserved and must be zero
    let size = read_u32(data)? & 0x7fff_ffff;
    Ok(RtmpMessage::SetChunkSize { size })
}

pub fn serialize_set_peer_bandwidth(
    size: u32,
    limit_type: PeerBandwidthLimitType,
) -> Result<Bytes, MessageSerializationError> {
    let mut bytes = Vec::with_capacity(5);
    bytes.write_u32::<BigEndian>(size)?;
    bytes.write_u8(match limit_type {
        PeerBandwidthLimitType::Hard => 0,
        PeerBandwidthLimitType::Soft => 1,
        PeerBandwidthLimitType::Dynamic => 2,
    })?;

    Ok(Bytes::from(bytes))
}

pub fn deserialize_set_peer_bandwidth(
    data: &[u8],
) -> Result<RtmpMessage, MessageDeserializationError> {
    let mut cursor = Cursor::new(data);
    let size = cursor.read_u32::<BigEndian>()?;
    let limit_type = match cursor.read_u8()? {
        0 => PeerBandwidthLimitType::Hard,
        1 => PeerBandwidthLimitType::Soft,
        2 => PeerBandwidthLimitType::Dynamic,
        _ => return Err(MessageDeserializationError::InvalidMessageFormat),
    };

    Ok(RtmpMessage::SetPeerBandwidth { size, limit_type })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_size_is_big_endian() {
        let bytes = serialize_set_chunk_size(4096).unwrap();
        assert_eq!(&bytes[..], &[0, 0, 0x10, 0]);

        let message = deserialize_set_chunk_size(&bytes).unwrap();
        assert_eq!(message, RtmpMessage::SetChunkSize { size: 4096 });
    }

    #[test]
    fn chunk_size_reserved_bit_is_ignored() {
        let message = deserialize_set_chunk_size(&[0x80, 0, 0, 0x80]).unwrap();
        assert_eq!(message, RtmpMessage::SetChunkSize { size: 128 });
    }

    #[test]
    fn out_of_range_chunk_sizes_cannot_be_serialized() {
        for size in [0_u32, 0x8000_0000].iter() {
            match serialize_set_chunk_size(*size) {
                Err(MessageSerializationError::InvalidChunkSize { size: x }) => assert_eq!(x, *size),
                x => panic!("Unexpected result: {:?}", x),
            }
        }
    }

    #[test]
    fn peer_bandwidth_carries_limit_type() {
        let bytes = serialize_set_peer_bandwidth(2_500_000, PeerBandwidthLimitType::Dynamic).unwrap();
        assert_eq!(&bytes[..], &[0x00, 0x26, 0x25, 0xa0, 2]);

        let message = deserialize_set_peer_bandwidth(&bytes).unwrap();
        assert_eq!(
            message,
            RtmpMessage::SetPeerBandwidth {
                size: 2_500_000,
                limit_type: PeerBandwidthLimitType::Dynamic,
            }
        );
    }

    #[test]
    fn unknown_limit_type_is_invalid() {
        match deserialize_set_peer_bandwidth(&[0, 0, 0, 1, 7]) {
            Err(MessageDeserializationError::InvalidMessageFormat) => (),
            x => panic!("Unexpected result: {:?}", x),
        }
    }

    #[test]
    fn truncated_value_is_an_io_error() {
        match read_u32(&[0, 1]) {
            Err(MessageDeserializationError::Io(_)) => (),
            x => panic!("Unexpected result: {:?}", x),
        }
    }
}
