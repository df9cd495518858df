//! Unsigned LEB128 integers as used for AV1 OBU sizes.
//!
//! AV1 limits the encoding to 8 bytes, which is enforced when decoding.

use crate::errors::VarintError;

const MAX_LENGTH: usize = 8;

pub fn decode(bytes: &[u8]) -> Result<(u64, usize), VarintError> {
    let mut value = 0_u64;
    for index in 0..MAX_LENGTH {
        let byte = match bytes.get(index) {
            Some(byte) => *byte,
            None => return Err(VarintError::MalformedVarint),
        };

        value |= ((byte & 0x7f) as u64) << (7 * index);
        if byte & 0x80 == 0 {
            return Ok((value, index + 1));
        }
    }

    Err(VarintError::MalformedVarint)
}

pub fn encode(value: u64) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(encoded_length(value));
    write(&mut bytes, value);
    bytes
}

/// Appends the encoded value to an existing buffer
pub fn write(bytes: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }

        bytes.push(byte);
        if value == 0 {
            break;
        }
    }
}

pub fn encoded_length(value: u64) -> usize {
    let mut length = 1;
    let mut remaining = value >> 7;
    while remaining != 0 {
        length += 1;
        remaining >>= 7;
    }

    length
}
