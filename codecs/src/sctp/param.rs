use super::errors::SctpError;
use super::padding_for;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;
use std::io::Cursor;

const STATE_COOKIE: u16 = 7;
const UNRECOGNIZED_PARAMETER: u16 = 8;
const SUPPORTED_EXTENSIONS: u16 = 0x8008;
const FORWARD_TSN_SUPPORTED: u16 = 0xc000;

/// Optional and variable length parameters of INIT and INIT ACK chunks
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum InitParameter {
    StateCookie(Bytes),
    UnrecognizedParameter(Bytes),
    SupportedExtensions(Vec<u8>),
    ForwardTsnSupported,
    Unknown { type_id: u16, value: Bytes },
}

impl InitParameter {
    fn type_id(&self) -> u16 {
        match *self {
            InitParameter::StateCookie(_) => STATE_COOKIE,
            InitParameter::UnrecognizedParameter(_) => UNRECOGNIZED_PARAMETER,
            InitParameter::SupportedExtensions(_) => SUPPORTED_EXTENSIONS,
            InitParameter::ForwardTsnSupported => FORWARD_TSN_SUPPORTED,
            InitParameter::Unknown { type_id, .. } => type_id,
        }
    }

    fn value(&self) -> &[u8] {
        match self {
            InitParameter::StateCookie(value) => &value[..],
            InitParameter::UnrecognizedParameter(value) => &value[..],
            InitParameter::SupportedExtensions(chunk_types) => &chunk_types[..],
            InitParameter::ForwardTsnSupported => &[],
            InitParameter::Unknown { value, .. } => &value[..],
        }
    }

    pub(super) fn write(&self, bytes: &mut Vec<u8>) -> Result<(), SctpError> {
        let value = self.value();
        let length = 4 + value.len();
        bytes.write_u16::<BigEndian>(self.type_id())?;
        bytes.write_u16::<BigEndian>(length as u16)?;
        bytes.extend_from_slice(value);
        bytes.extend(std::iter::repeat(0).take(padding_for(length)));
        Ok(())
    }

    pub(super) fn read_all(data: &[u8]) -> Result<Vec<InitParameter>, SctpError> {
        let mut parameters = Vec::new();
        let mut cursor = Cursor::new(data);

        while (cursor.position() as usize) + 4 <= data.len() {
            let start = cursor.position() as usize;
            let type_id = cursor.read_u16::<BigEndian>()?;
            let length = cursor.read_u16::<BigEndian>()? as usize;
            if length < 4 || start + length > data.len() {
                return Err(SctpError::InvalidLength { type_id, length });
            }

            let value = Bytes::copy_from_slice(&data[start + 4..start + length]);
            let parameter = match type_id {
                STATE_COOKIE => InitParameter::StateCookie(value),
                UNRECOGNIZED_PARAMETER => InitParameter::UnrecognizedParameter(value),
                SUPPORTED_EXTENSIONS => InitParameter::SupportedExtensions(value.to_vec()),
                FORWARD_TSN_SUPPORTED => InitParameter::ForwardTsnSupported,
                _ => InitParameter::Unknown { type_id, value },
            };

            parameters.push(parameter);

            let next = start + length + padding_for(length);
            cursor.set_position(next.min(data.len()) as u64);
        }

        Ok(parameters)
    }
}
