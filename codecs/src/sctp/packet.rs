use super::chunk::Chunk;
use super::errors::SctpError;
use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use crc::{Crc, CRC_32_ISCSI};
use std::io::Cursor;

const COMMON_HEADER_LENGTH: usize = 12;
const CHECKSUM_OFFSET: usize = 8;
const CASTAGNOLI: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct CommonHeader {
    pub source_port: u16,
    pub destination_port: u16,
    pub verification_tag: u32,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Packet {
    pub header: CommonHeader,
    pub chunks: Vec<Chunk>,
}

impl Packet {
    pub fn marshal(&self) -> Result<Vec<u8>, SctpError> {
        let mut bytes = Vec::with_capacity(COMMON_HEADER_LENGTH);
        bytes.write_u16::<BigEndian>(self.header.source_port)?;
        bytes.write_u16::<BigEndian>(self.header.destination_port)?;
        bytes.write_u32::<BigEndian>(self.header.verification_tag)?;
        bytes.write_u32::<LittleEndian>(0)?;

        for chunk in &self.chunks {
            chunk.write(&mut bytes)?;
        }

        // The checksum is stored in the byte order the CRC register produces it
        let checksum = CASTAGNOLI.checksum(&bytes);
        bytes[CHECKSUM_OFFSET..COMMON_HEADER_LENGTH].copy_from_slice(&checksum.to_le_bytes());

        Ok(bytes)
    }

    pub fn unmarshal(data: &[u8]) -> Result<Packet, SctpError> {
        if data.len() < COMMON_HEADER_LENGTH {
            return Err(SctpError::PacketTooShort { size: data.len() });
        }

        let mut cursor = Cursor::new(data);
        let header = CommonHeader {
            source_port: cursor.read_u16::<BigEndian>()?,
            destination_port: cursor.read_u16::<BigEndian>()?,
            verification_tag: cursor.read_u32::<BigEndian>()?,
        };

        let carried = cursor.read_u32::<LittleEndian>()?;
        let computed = compute_checksum(data);
        if carried != computed {
            return Err(SctpError::ChecksumMismatch { carried, computed });
        }

        let mut chunks = Vec::new();
        let mut offset = COMMON_HEADER_LENGTH;
        while offset < data.len() {
            let (chunk, consumed) = Chunk::read(&data[offset..])?;
            chunks.push(chunk);
            offset += consumed;
        }

        Ok(Packet { header, chunks })
    }
}

fn compute_checksum(data: &[u8]) -> u32 {
    let mut digest = CASTAGNOLI.digest();
    digest.update(&data[..CHECKSUM_OFFSET]);
    digest.update(&[0, 0, 0, 0]);
    digest.update(&data[COMMON_HEADER_LENGTH..]);
    digest.finalize()
}
