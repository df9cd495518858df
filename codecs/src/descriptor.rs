//! Size fields of MPEG-4 elementary stream descriptors (ISO/IEC 14496-1 "expandable" classes).
//!
//! Sizes are written most significant group first, 7 bits per byte, with the high bit set on
//! every byte except the last.  At most 4 bytes are allowed.

use crate::errors::VarintError;

const MAX_LENGTH: usize = 4;

/// Largest size a descriptor can declare (28 bits)
pub const MAX_DESCRIPTOR_SIZE: u32 = (1 << 28) - 1;

pub fn encode_descriptor_size(size: u32) -> Result<Vec<u8>, VarintError> {
    if size > MAX_DESCRIPTOR_SIZE {
        return Err(VarintError::ValueTooLarge { value: size as u64 });
    }

    let mut length = 1;
    while length < MAX_LENGTH && size >> (7 * length) != 0 {
        length += 1;
    }

    encode_descriptor_size_padded(size, length)
}

/// Encodes the size using exactly `width` bytes.  Many muxers always use 4 bytes so that the size
/// can be patched in after the descriptor body is written.
pub fn encode_descriptor_size_padded(size: u32, width: usize) -> Result<Vec<u8>, VarintError> {
    if width == 0 || width > MAX_LENGTH || (size as u64) >> (7 * width) != 0 {
        return Err(VarintError::ValueTooLarge { value: size as u64 });
    }

    let mut bytes = Vec::with_capacity(width);
    for index in (0..width).rev() {
        let mut byte = ((size >> (7 * index)) & 0x7f) as u8;
        if index != 0 {
            byte |= 0x80;
        }

        bytes.push(byte);
    }

    Ok(bytes)
}

pub fn decode_descriptor_size(bytes: &[u8]) -> Result<(u32, usize), VarintError> {
    let mut size = 0_u32;
    for index in 0..MAX_LENGTH {
        let byte = match bytes.get(index) {
            Some(byte) => *byte,
            None => return Err(VarintError::MalformedVarint),
        };

        size = (size << 7) | (byte & 0x7f) as u32;
        if byte & 0x80 == 0 {
            return Ok((size, index + 1));
        }
    }

    Err(VarintError::MalformedVarint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_sizes_use_one_byte() {
        assert_eq!(encode_descriptor_size(0).unwrap(), vec![0x00]);
        assert_eq!(encode_descriptor_size(127).unwrap(), vec![0x7f]);
    }

    #[test]
    fn larger_sizes_use_continuation_bits() {
        assert_eq!(encode_descriptor_size(128).unwrap(), vec![0x81, 0x00]);
        assert_eq!(decode_descriptor_size(&[0x81, 0x00]).unwrap(), (128, 2));
    }

    #[test]
    fn padded_sizes_decode_to_same_value() {
        let bytes = encode_descriptor_size_padded(34, 4).unwrap();
        assert_eq!(bytes, vec![0x80, 0x80, 0x80, 0x22]);
        assert_eq!(decode_descriptor_size(&bytes).unwrap(), (34, 4));
    }

    #[test]
    fn too_large_sizes_are_rejected() {
        assert!(encode_descriptor_size(MAX_DESCRIPTOR_SIZE + 1).is_err());
        assert!(encode_descriptor_size_padded(200, 1).is_err());
    }

    #[test]
    fn five_byte_sizes_are_malformed() {
        let bytes = [0x80, 0x80, 0x80, 0x80, 0x01];
        assert_eq!(decode_descriptor_size(&bytes), Err(VarintError::MalformedVarint));
    }
}
