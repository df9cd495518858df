//! AMF3 values and their (de)serialization.
//!
//! AMF3 keeps three reference tables per top-level call: strings, complex values (objects,
//! arrays, dates, XML, byte arrays, vectors and dictionaries) and object traits.  All three live in
//! an [`Amf3Context`].  The `serialize()` and `deserialize()` functions create a fresh context for
//! every call, while `read_value()` and `write_value()` let the caller decide how long one lives.

mod deserialization;
mod errors;
mod serialization;

pub use self::deserialization::{deserialize, read_value};
pub use self::errors::{Amf3DeserializationError, Amf3SerializationError, ReferenceTable};
pub use self::serialization::{serialize, write_value};

use std::collections::HashMap;

/// Largest (and smallest) integers that fit in the 29 bit `Integer` encoding
pub const MAX_INTEGER: i32 = 0x0fff_ffff;
pub const MIN_INTEGER: i32 = -0x1000_0000;

/// Objects nested deeper than this are rejected in both directions
pub const MAX_NESTING_DEPTH: usize = 64;

/// Externalizable classes whose external form is a single nested AMF3 value
pub const ARRAY_COLLECTION_CLASS: &str = "flex.messaging.io.ArrayCollection";
pub const OBJECT_PROXY_CLASS: &str = "flex.messaging.io.ObjectProxy";

#[derive(PartialEq, Debug, Clone)]
pub enum Amf3Value {
    Undefined,
    Null,
    Boolean(bool),

    /// A signed 29 bit integer.  Values outside that range are written as a `Double`.
    Integer(i32),
    Double(f64),
    String(String),

    /// Legacy `flash.xml.XMLDocument` contents
    XmlDocument(String),

    /// Milliseconds since the unix epoch, in UTC
    Date(f64),
    Array {
        associative: Vec<(String, Amf3Value)>,
        dense: Vec<Amf3Value>,
    },

    Object(Amf3Object),
    Xml(String),
    ByteArray(Vec<u8>),
    VectorInt {
        fixed: bool,
        items: Vec<i32>,
    },

    VectorUInt {
        fixed: bool,
        items: Vec<u32>,
    },

    VectorDouble {
        fixed: bool,
        items: Vec<f64>,
    },

    VectorObject {
        fixed: bool,
        type_name: String,
        items: Vec<Amf3Value>,
    },

    Dictionary {
        weak_keys: bool,
        entries: Vec<(Amf3Value, Amf3Value)>,
    },

    /// An instance of one of the supported externalizable Flex classes
    Externalizable {
        class_name: String,
        value: Box<Amf3Value>,
    },
}

/// An AMF3 object instance.  An empty class name marks an anonymous object.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct Amf3Object {
    pub class_name: String,
    pub dynamic: bool,

    /// Members declared by the class, in trait order
    pub sealed_members: Vec<(String, Amf3Value)>,

    /// Members added at runtime.  Only written when `dynamic` is set.
    pub dynamic_members: Vec<(String, Amf3Value)>,
}

impl Amf3Object {
    /// Creates an anonymous dynamic object, the shape ActionScript gives to object literals
    pub fn anonymous(members: Vec<(String, Amf3Value)>) -> Amf3Object {
        Amf3Object {
            class_name: String::new(),
            dynamic: true,
            sealed_members: Vec::new(),
            dynamic_members: members,
        }
    }

    /// Looks a member up by name, sealed members first
    pub fn get(&self, name: &str) -> Option<&Amf3Value> {
        self.sealed_members
            .iter()
            .chain(self.dynamic_members.iter())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }
}

impl Amf3Value {
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Amf3Value::Integer(value) => Some(value as f64),
            Amf3Value::Double(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the value as an `i32` if it is an integer, or a double with no fractional part
    /// that fits.
    pub fn as_i32(&self) -> Option<i32> {
        match *self {
            Amf3Value::Integer(value) => Some(value),
            Amf3Value::Double(value)
                if value.fract() == 0.0
                    && value >= i32::min_value() as f64
                    && value <= i32::max_value() as f64 =>
            {
                Some(value as i32)
            }

            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match *self {
            Amf3Value::String(ref value) => Some(value),
            _ => None,
        }
    }
}

#[derive(PartialEq, Debug, Clone)]
struct Amf3Trait {
    class_name: String,
    dynamic: bool,
    externalizable: bool,
    members: Vec<String>,
}

/// Reference tables for one top-level AMF3 sequence
#[derive(Default)]
pub struct Amf3Context {
    strings: Vec<String>,
    string_indexes: HashMap<String, usize>,

    /// `None` marks a value that is still being read or written
    objects: Vec<Option<Amf3Value>>,
    traits: Vec<Amf3Trait>,
    depth: usize,
}

impl Amf3Context {
    pub fn new() -> Amf3Context {
        Amf3Context::default()
    }

    pub fn reset(&mut self) {
        self.strings.clear();
        self.string_indexes.clear();
        self.objects.clear();
        self.traits.clear();
        self.depth = 0;
    }

    fn reserve_object(&mut self) -> usize {
        self.objects.push(None);
        self.objects.len() - 1
    }

    fn complete_object(&mut self, index: usize, value: &Amf3Value) {
        if let Some(slot) = self.objects.get_mut(index) {
            *slot = Some(value.clone());
        }
    }
}

mod markers {
    pub const UNDEFINED: u8 = 0x00;
    pub const NULL: u8 = 0x01;
    pub const FALSE: u8 = 0x02;
    pub const TRUE: u8 = 0x03;
    pub const INTEGER: u8 = 0x04;
    pub const DOUBLE: u8 = 0x05;
    pub const STRING: u8 = 0x06;
    pub const XML_DOCUMENT: u8 = 0x07;
    pub const DATE: u8 = 0x08;
    pub const ARRAY: u8 = 0x09;
    pub const OBJECT: u8 = 0x0a;
    pub const XML: u8 = 0x0b;
    pub const BYTE_ARRAY: u8 = 0x0c;
    pub const VECTOR_INT: u8 = 0x0d;
    pub const VECTOR_UINT: u8 = 0x0e;
    pub const VECTOR_DOUBLE: u8 = 0x0f;
    pub const VECTOR_OBJECT: u8 = 0x10;
    pub const DICTIONARY: u8 = 0x11;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_and_double_widen_to_f64() {
        assert_eq!(Amf3Value::Integer(-5).as_f64(), Some(-5.0));
        assert_eq!(Amf3Value::Double(2.5).as_f64(), Some(2.5));
        assert_eq!(Amf3Value::Null.as_f64(), None);
    }

    #[test]
    fn as_i32_rejects_fractions_and_out_of_range_doubles() {
        assert_eq!(Amf3Value::Double(300.0).as_i32(), Some(300));
        assert_eq!(Amf3Value::Double(1.5).as_i32(), None);
        assert_eq!(Amf3Value::Double(5_000_000_000.0).as_i32(), None);
    }

    #[test]
    fn object_member_lookup_checks_sealed_then_dynamic() {
        let object = Amf3Object {
            class_name: "Foo".to_string(),
            dynamic: true,
            sealed_members: vec![("a".to_string(), Amf3Value::Integer(1))],
            dynamic_members: vec![
                ("a".to_string(), Amf3Value::Integer(2)),
                ("b".to_string(), Amf3Value::Integer(3)),
            ],
        };

        assert_eq!(object.get("a"), Some(&Amf3Value::Integer(1)));
        assert_eq!(object.get("b"), Some(&Amf3Value::Integer(3)));
        assert_eq!(object.get("c"), None);
    }
}
