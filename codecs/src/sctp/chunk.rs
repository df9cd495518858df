use super::chunk_types;
use super::errors::SctpError;
use super::padding_for;
use super::param::InitParameter;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;
use std::io::Cursor;

const CHUNK_HEADER_LENGTH: usize = 4;
const INIT_FIXED_LENGTH: usize = 16;

/// Body shared by INIT and INIT ACK chunks
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct InitChunk {
    pub initiate_tag: u32,
    pub advertised_receiver_window_credit: u32,
    pub num_outbound_streams: u16,
    pub num_inbound_streams: u16,
    pub initial_tsn: u32,
    pub parameters: Vec<InitParameter>,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Chunk {
    Init(InitChunk),
    InitAck(InitChunk),
    CookieEcho { cookie: Bytes },
    CookieAck,
    Unknown { type_id: u8, flags: u8, value: Bytes },
}

impl InitChunk {
    /// The state cookie an INIT ACK carries, which must be echoed back in COOKIE ECHO
    pub fn state_cookie(&self) -> Option<&Bytes> {
        self.parameters.iter().find_map(|parameter| match parameter {
            InitParameter::StateCookie(cookie) => Some(cookie),
            _ => None,
        })
    }

    fn validate(&self) -> Result<(), SctpError> {
        if self.initiate_tag == 0 {
            return Err(SctpError::InvalidInit { reason: "initiate tag is zero" });
        }

        if self.num_outbound_streams == 0 || self.num_inbound_streams == 0 {
            return Err(SctpError::InvalidInit { reason: "stream count is zero" });
        }

        Ok(())
    }

    fn write_body(&self, bytes: &mut Vec<u8>) -> Result<(), SctpError> {
        bytes.write_u32::<BigEndian>(self.initiate_tag)?;
        bytes.write_u32::<BigEndian>(self.advertised_receiver_window_credit)?;
        bytes.write_u16::<BigEndian>(self.num_outbound_streams)?;
        bytes.write_u16::<BigEndian>(self.num_inbound_streams)?;
        bytes.write_u32::<BigEndian>(self.initial_tsn)?;
        for parameter in &self.parameters {
            parameter.write(bytes)?;
        }

        Ok(())
    }

    fn read_body(type_id: u8, value: &[u8]) -> Result<InitChunk, SctpError> {
        if value.len() < INIT_FIXED_LENGTH {
            return Err(SctpError::InvalidLength {
                type_id: type_id as u16,
                length: value.len() + CHUNK_HEADER_LENGTH,
            });
        }

        let mut cursor = Cursor::new(value);
        let chunk = InitChunk {
            initiate_tag: cursor.read_u32::<BigEndian>()?,
            advertised_receiver_window_credit: cursor.read_u32::<BigEndian>()?,
            num_outbound_streams: cursor.read_u16::<BigEndian>()?,
            num_inbound_streams: cursor.read_u16::<BigEndian>()?,
            initial_tsn: cursor.read_u32::<BigEndian>()?,
            parameters: InitParameter::read_all(&value[INIT_FIXED_LENGTH..])?,
        };

        chunk.validate()?;
        Ok(chunk)
    }
}

impl Chunk {
    fn type_id(&self) -> u8 {
        match *self {
            Chunk::Init(_) => chunk_types::INIT,
            Chunk::InitAck(_) => chunk_types::INIT_ACK,
            Chunk::CookieEcho { .. } => chunk_types::COOKIE_ECHO,
            Chunk::CookieAck => chunk_types::COOKIE_ACK,
            Chunk::Unknown { type_id, .. } => type_id,
        }
    }

    /// Appends the chunk, including its trailing padding
    pub fn write(&self, bytes: &mut Vec<u8>) -> Result<(), SctpError> {
        let mut value = Vec::new();
        let flags = match self {
            Chunk::Init(init) | Chunk::InitAck(init) => {
                init.validate()?;
                init.write_body(&mut value)?;
                0
            }

            Chunk::CookieEcho { cookie } => {
                value.extend_from_slice(cookie);
                0
            }

            Chunk::CookieAck => 0,
            Chunk::Unknown { flags, value: data, .. } => {
                value.extend_from_slice(data);
                *flags
            }
        };

        let length = CHUNK_HEADER_LENGTH + value.len();
        bytes.write_u8(self.type_id())?;
        bytes.write_u8(flags)?;
        bytes.write_u16::<BigEndian>(length as u16)?;
        bytes.extend_from_slice(&value);
        bytes.extend(std::iter::repeat(0).take(padding_for(length)));
        Ok(())
    }

    /// Reads one chunk from the start of `data`, returning it with the number of bytes consumed
    /// (padding included).
    pub fn read(data: &[u8]) -> Result<(Chunk, usize), SctpError> {
        let mut cursor = Cursor::new(data);
        let type_id = cursor.read_u8()?;
        let flags = cursor.read_u8()?;
        let length = cursor.read_u16::<BigEndian>()? as usize;
        if length < CHUNK_HEADER_LENGTH || length > data.len() {
            return Err(SctpError::InvalidLength {
                type_id: type_id as u16,
                length,
            });
        }

        let value = &data[CHUNK_HEADER_LENGTH..length];
        let chunk = match type_id {
            chunk_types::INIT => Chunk::Init(InitChunk::read_body(type_id, value)?),
            chunk_types::INIT_ACK => Chunk::InitAck(InitChunk::read_body(type_id, value)?),
            chunk_types::COOKIE_ECHO => Chunk::CookieEcho {
                cookie: Bytes::copy_from_slice(value),
            },
            chunk_types::COOKIE_ACK => Chunk::CookieAck,
            _ => Chunk::Unknown {
                type_id,
                flags,
                value: Bytes::copy_from_slice(value),
            },
        };

        let consumed = (length + padding_for(length)).min(data.len());
        Ok((chunk, consumed))
    }
}
