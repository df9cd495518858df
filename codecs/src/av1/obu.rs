use super::errors::Av1Error;
use crate::leb128;
use bytes::Bytes;

const FORBIDDEN_BIT: u8 = 0b1000_0000;
const EXTENSION_FLAG: u8 = 0b0000_0100;
const HAS_SIZE_FIELD: u8 = 0b0000_0010;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ObuType {
    SequenceHeader,
    TemporalDelimiter,
    FrameHeader,
    TileGroup,
    Metadata,
    Frame,
    RedundantFrameHeader,
    TileList,
    Padding,
    Reserved(u8),
}

impl ObuType {
    pub fn from_header(header: u8) -> ObuType {
        match (header >> 3) & 0x0f {
            1 => ObuType::SequenceHeader,
            2 => ObuType::TemporalDelimiter,
            3 => ObuType::FrameHeader,
            4 => ObuType::TileGroup,
            5 => ObuType::Metadata,
            6 => ObuType::Frame,
            7 => ObuType::RedundantFrameHeader,
            8 => ObuType::TileList,
            15 => ObuType::Padding,
            x => ObuType::Reserved(x),
        }
    }
}

/// A single OBU with its size field removed.  `data` holds the OBU header (1 or 2 bytes) followed
/// by the payload, with the header's `obu_has_size_field` bit cleared.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Obu {
    pub obu_type: ObuType,
    pub data: Bytes,
}

impl Obu {
    fn header_length(&self) -> usize {
        if self.data[0] & EXTENSION_FLAG != 0 {
            2
        } else {
            1
        }
    }

    /// Writes the OBU in low overhead bitstream format (header, LEB128 size, payload)
    pub fn write_with_size_field(&self, output: &mut Vec<u8>) {
        let header_length = self.header_length().min(self.data.len());
        output.push(self.data[0] | HAS_SIZE_FIELD);
        output.extend_from_slice(&self.data[1..header_length]);
        leb128::write(output, (self.data.len() - header_length) as u64);
        output.extend_from_slice(&self.data[header_length..]);
    }
}

/// Parses a temporal unit in low overhead bitstream format.  An OBU without a size field extends
/// to the end of the buffer.
pub fn parse_obus(data: &[u8]) -> Result<Vec<Obu>, Av1Error> {
    let mut obus = Vec::new();
    let mut remaining = data;

    while !remaining.is_empty() {
        let header = remaining[0];
        if header & FORBIDDEN_BIT != 0 {
            return Err(Av1Error::ForbiddenBitSet);
        }

        let header_length = if header & EXTENSION_FLAG != 0 { 2 } else { 1 };
        if remaining.len() < header_length {
            return Err(Av1Error::ObuSizeExceedsData {
                declared: header_length,
                available: remaining.len(),
            });
        }

        let (payload_start, payload_length) = if header & HAS_SIZE_FIELD != 0 {
            let (size, size_length) = leb128::decode(&remaining[header_length..])?;
            (header_length + size_length, size as usize)
        } else {
            (header_length, remaining.len() - header_length)
        };

        let available = remaining.len() - payload_start;
        if payload_length > available {
            return Err(Av1Error::ObuSizeExceedsData {
                declared: payload_length,
                available,
            });
        }

        let mut obu_bytes = Vec::with_capacity(header_length + payload_length);
        obu_bytes.push(header & !HAS_SIZE_FIELD);
        obu_bytes.extend_from_slice(&remaining[1..header_length]);
        obu_bytes.extend_from_slice(&remaining[payload_start..payload_start + payload_length]);

        obus.push(Obu {
            obu_type: ObuType::from_header(header),
            data: Bytes::from(obu_bytes),
        });

        remaining = &remaining[payload_start + payload_length..];
    }

    Ok(obus)
}
