use crate::amf3::{Amf3DeserializationError, Amf3SerializationError};
use std::{io, string};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Amf0DeserializationError {
    #[error("Encountered unknown marker: {marker}")]
    UnknownMarker { marker: u8 },

    /// Movie clip and record set markers are reserved by the format and carry no defined payload
    #[error("Encountered marker {marker} which is reserved and cannot be read")]
    UnsupportedType { marker: u8 },

    #[error("Unexpected empty object property name")]
    UnexpectedEmptyObjectPropertyName,

    #[error("Hit end of the byte buffer but was expecting more data")]
    UnexpectedEof,

    /// A reference marker pointed at an index that has not been read (or finished reading) yet
    #[error("Reference index {index} does not point to a previously read value")]
    InvalidReference { index: u16 },

    #[error("Failed to read AVM+ value: {0}")]
    Amf3(#[from] Amf3DeserializationError),

    #[error("{0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    FromUtf8Error(#[from] string::FromUtf8Error),
}

#[derive(Debug, Error)]
pub enum Amf0SerializationError {
    /// Object property names are always written with a 16 bit length
    #[error("Property name length {length} is greater than 65,535")]
    PropertyNameTooLong { length: usize },

    #[error("Failed to write AVM+ value: {0}")]
    Amf3(#[from] Amf3SerializationError),

    #[error("{0}")]
    Io(#[from] io::Error),
}
