//! This crate provides functionality for serializing and deserializing data
//! based on the Adobe AMF0 and AMF3 encoding specifications located at
//! <https://wwwimages2.adobe.com/content/dam/acom/en/devnet/pdf/amf0-file-format-specification.pdf>
//! and <https://wwwimages2.adobe.com/content/dam/acom/en/devnet/pdf/amf-file-format-spec.pdf>
//!
//! Reference tables (AMF0 complex values, AMF3 strings, objects and traits) only live for the
//! duration of one top-level call.  When finer control is needed, the `read_value()` and
//! `write_value()` functions of each module take the context explicitly.
//!
//! # Examples
//! ```
//! use std::io::Cursor;
//! use std::collections::HashMap;
//! use rml_amf::{Amf0Value, serialize, deserialize};
//!
//! // Put some data into the Amf0Value types
//! let mut properties = HashMap::new();
//! properties.insert("app".to_string(), Amf0Value::Number(99.0));
//! properties.insert("second".to_string(), Amf0Value::Utf8String("test".to_string()));
//!
//! let value1 = Amf0Value::Number(32.0);
//! let value2 = Amf0Value::Boolean(true);
//! let object = Amf0Value::Object(properties);
//!
//! let input = vec![value1, object, value2];
//!
//! // Serialize the values into a vector of bytes
//! let serialized_data = serialize(&input).unwrap();
//!
//! // Deserialize the vector of bytes back into Amf0Value types
//! let mut serialized_cursor = Cursor::new(serialized_data);
//! let results = deserialize(&mut serialized_cursor).unwrap();
//!
//! assert_eq!(input, results);
//! ```
//!
//! AMF3 values are handled by the `amf3` module:
//!
//! ```
//! use std::io::Cursor;
//! use rml_amf::amf3::{self, Amf3Value};
//!
//! let input = vec![Amf3Value::Integer(5), Amf3Value::String("hello".to_string())];
//! let bytes = amf3::serialize(&input).unwrap();
//! let results = amf3::deserialize(&mut Cursor::new(bytes)).unwrap();
//!
//! assert_eq!(input, results);
//! ```

pub mod amf0;
pub mod amf3;

pub use crate::amf0::{
    deserialize, serialize, Amf0DeserializationError, Amf0SerializationError, Amf0Value,
};
pub use crate::amf3::{Amf3DeserializationError, Amf3SerializationError, Amf3Value};
