//! Matroska/EBML variable length integers.
//!
//! The number of leading zero bits in the first byte plus one gives the total byte length of the
//! integer (1 to 8 bytes).  The first set bit is a marker and is not part of the value.

use crate::errors::VarintError;

const MAX_LENGTH: usize = 8;

/// Largest value that can be encoded.  The all ones pattern of each width is reserved to mean
/// "unknown size" and is never produced by `encode()`.
pub const MAX_VALUE: u64 = (1 << 56) - 2;

/// Reads a variable length integer from the start of `bytes`, returning the value and the number
/// of bytes it occupied.
pub fn decode(bytes: &[u8]) -> Result<(u64, usize), VarintError> {
    let first = match bytes.first() {
        Some(byte) => *byte,
        None => return Err(VarintError::MalformedVarint),
    };

    if first == 0 {
        return Err(VarintError::MalformedVarint);
    }

    let length = first.leading_zeros() as usize + 1;
    if bytes.len() < length {
        return Err(VarintError::MalformedVarint);
    }

    let mask = if length == MAX_LENGTH { 0 } else { 0xff_u8 >> length };
    let mut value = (first & mask) as u64;
    for byte in &bytes[1..length] {
        value = (value << 8) | *byte as u64;
    }

    Ok((value, length))
}

/// Encodes the value with the shortest length able to hold it
pub fn encode(value: u64) -> Result<Vec<u8>, VarintError> {
    if value > MAX_VALUE {
        return Err(VarintError::ValueTooLarge { value });
    }

    let length = (1..=MAX_LENGTH)
        .find(|length| value < (1_u64 << (7 * length)) - 1)
        .unwrap_or(MAX_LENGTH);

    let marked = value | (1_u64 << (7 * length));
    let bytes = marked.to_be_bytes();
    Ok(bytes[bytes.len() - length..].to_vec())
}

/// Returns how many bytes `encode()` will produce for the value
pub fn encoded_length(value: u64) -> Result<usize, VarintError> {
    encode(value).map(|bytes| bytes.len())
}
