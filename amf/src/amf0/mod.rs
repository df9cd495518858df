//! AMF0 values and their (de)serialization.
//!
//! AMF0 has no integer type, every number is an IEEE-754 double.  Objects, ECMA arrays, strict
//! arrays and typed objects take part in reference tracking: once one has been written in a
//! top-level call, writing an equal value again produces a reference marker with its index.

mod deserialization;
mod errors;
mod serialization;

pub use self::deserialization::{deserialize, read_value};
pub use self::errors::{Amf0DeserializationError, Amf0SerializationError};
pub use self::serialization::{serialize, write_value};

use crate::amf3::{Amf3Context, Amf3Value};
use std::collections::HashMap;

/// An Enum representing the different supported types of Amf0 values
#[derive(PartialEq, Debug, Clone)]
pub enum Amf0Value {
    Number(f64),
    Boolean(bool),
    Utf8String(String),
    Object(HashMap<String, Amf0Value>),

    /// An associative array.  Wire compatible with `Object` apart from its marker and the
    /// (advisory) element count.
    EcmaArray(HashMap<String, Amf0Value>),
    StrictArray(Vec<Amf0Value>),

    /// An object tagged with an ActionScript class name
    TypedObject {
        class_name: String,
        properties: HashMap<String, Amf0Value>,
    },

    /// Milliseconds since the unix epoch.  The time zone field is reserved by the format and
    /// should be 0.
    Date { unix_time: f64, time_zone: i16 },
    XmlDocument(String),
    Null,
    Undefined,
    Unsupported,

    /// A single AMF3 value embedded in an AMF0 stream through the AVM+ marker
    AvmPlus(Amf3Value),
}

impl Amf0Value {
    pub fn get_number(self) -> Option<f64> {
        match self {
            Amf0Value::Number(value) => Some(value),
            Amf0Value::AvmPlus(value) => value.as_f64(),
            _ => None,
        }
    }

    /// Returns the number as an integer when it is integral and within the safe range of an
    /// `i64`, since AMF0 carries every integer as a double.
    pub fn get_integer(self) -> Option<i64> {
        const MAX_SAFE_INTEGER: f64 = 9007199254740991.0;

        match self.get_number() {
            Some(value) if value.fract() == 0.0 && value.abs() <= MAX_SAFE_INTEGER => {
                Some(value as i64)
            }
            _ => None,
        }
    }

    pub fn get_boolean(self) -> Option<bool> {
        match self {
            Amf0Value::Boolean(value) => Some(value),
            _ => None,
        }
    }

    pub fn get_string(self) -> Option<String> {
        match self {
            Amf0Value::Utf8String(value) => Some(value),
            Amf0Value::XmlDocument(value) => Some(value),
            Amf0Value::AvmPlus(Amf3Value::String(value)) => Some(value),
            _ => None,
        }
    }

    pub fn get_object_properties(self) -> Option<HashMap<String, Amf0Value>> {
        match self {
            Amf0Value::Object(properties) => Some(properties),
            Amf0Value::EcmaArray(properties) => Some(properties),
            Amf0Value::TypedObject { properties, .. } => Some(properties),
            _ => None,
        }
    }

    fn is_complex(&self) -> bool {
        match *self {
            Amf0Value::Object(_)
            | Amf0Value::EcmaArray(_)
            | Amf0Value::StrictArray(_)
            | Amf0Value::TypedObject { .. } => true,
            _ => false,
        }
    }
}

/// Reference tables used while reading or writing one top-level AMF0 sequence.
///
/// Values switched to AMF3 through the AVM+ marker share a single `Amf3Context` for the whole
/// sequence.
#[derive(Default)]
pub struct Amf0Context {
    /// Complex values, indexed in the order they were started.  `None` marks a value that is
    /// still being read.
    references: Vec<Option<Amf0Value>>,
    amf3: Amf3Context,
}

impl Amf0Context {
    pub fn new() -> Amf0Context {
        Amf0Context::default()
    }

    /// Clears all reference tables so the context can be reused for an unrelated message
    pub fn reset(&mut self) {
        self.references.clear();
        self.amf3.reset();
    }
}

mod markers {
    pub const NUMBER_MARKER: u8 = 0x00;
    pub const BOOLEAN_MARKER: u8 = 0x01;
    pub const STRING_MARKER: u8 = 0x02;
    pub const OBJECT_MARKER: u8 = 0x03;
    pub const MOVIECLIP_MARKER: u8 = 0x04;
    pub const NULL_MARKER: u8 = 0x05;
    pub const UNDEFINED_MARKER: u8 = 0x06;
    pub const REFERENCE_MARKER: u8 = 0x07;
    pub const ECMA_ARRAY_MARKER: u8 = 0x08;
    pub const OBJECT_END_MARKER: u8 = 0x09;
    pub const STRICT_ARRAY_MARKER: u8 = 0x0a;
    pub const DATE_MARKER: u8 = 0x0b;
    pub const LONG_STRING_MARKER: u8 = 0x0c;
    pub const UNSUPPORTED_MARKER: u8 = 0x0d;
    pub const RECORDSET_MARKER: u8 = 0x0e;
    pub const XML_DOCUMENT_MARKER: u8 = 0x0f;
    pub const TYPED_OBJECT_MARKER: u8 = 0x10;
    pub const AVMPLUS_OBJECT_MARKER: u8 = 0x11;
    pub const UTF_8_EMPTY_MARKER: u16 = 0;
}
