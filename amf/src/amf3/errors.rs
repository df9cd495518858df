use std::{fmt, io, string};
use thiserror::Error;

/// Identifies which of the three AMF3 reference tables a reference pointed into
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ReferenceTable {
    String,
    Object,
    Trait,
}

impl fmt::Display for ReferenceTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ReferenceTable::String => write!(f, "string"),
            ReferenceTable::Object => write!(f, "object"),
            ReferenceTable::Trait => write!(f, "trait"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Amf3DeserializationError {
    #[error("Encountered unknown marker: {marker}")]
    UnknownMarker { marker: u8 },

    #[error("Hit end of the byte buffer but was expecting more data")]
    UnexpectedEof,

    #[error("Reference index {index} does not exist in the {table} table")]
    InvalidReference { index: u32, table: ReferenceTable },

    #[error("Values are nested deeper than the allowed maximum")]
    NestingTooDeep,

    #[error("Externalizable class '{class_name}' has no known external form")]
    UnsupportedExternalizable { class_name: String },

    #[error("{0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Utf8(#[from] string::FromUtf8Error),
}

#[derive(Debug, Error)]
pub enum Amf3SerializationError {
    /// Lengths, counts and reference indexes must fit in 28 bits
    #[error("Value {value} is too large to be encoded")]
    ValueOutOfRange { value: usize },

    #[error("Values are nested deeper than the allowed maximum")]
    NestingTooDeep,

    #[error("{0}")]
    Io(#[from] io::Error),
}
