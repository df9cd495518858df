//! Command (invoke) and data (notify) messages in their AMF0 and AMF3 flavours.
//!
//! The AMF3 flavours are AMF0 encoded bodies prefixed by a single format byte of zero.  AMF3
//! values inside them are switched to with the AVM+ marker.

use super::{MessageDeserializationError, MessageSerializationError};
use bytes::{Buf, Bytes};
use rml_amf::Amf0Value;
use std::io::Cursor;

const AMF3_FORMAT_BYTE: u8 = 0;

/// Command fields shared by both command flavours
pub struct CommandParts {
    pub command_name: String,
    pub transaction_id: f64,
    pub command_object: Amf0Value,
    pub additional_arguments: Vec<Amf0Value>,
}

pub fn serialize_command(parts: CommandParts, amf3: bool) -> Result<Bytes, MessageSerializationError> {
    let mut values = Vec::with_capacity(3 + parts.additional_arguments.len());
    values.push(Amf0Value::Utf8String(parts.command_name));
    values.push(Amf0Value::Number(parts.transaction_id));
    values.push(parts.command_object);
    values.extend(parts.additional_arguments);

    serialize_data(&values, amf3)
}

pub fn deserialize_command(data: &[u8], amf3: bool) -> Result<CommandParts, MessageDeserializationError> {
    let mut values = deserialize_data(data, amf3)?.into_iter();

    let command_name = match values.next() {
        Some(Amf0Value::Utf8String(name)) => name,
        _ => return Err(MessageDeserializationError::InvalidMessageFormat),
    };

    let transaction_id = match values.next() {
        Some(Amf0Value::Number(id)) => id,
        _ => return Err(MessageDeserializationError::InvalidMessageFormat),
    };

    // Some peers leave off the command object entirely for argument-less commands
    let command_object = values.next().unwrap_or(Amf0Value::Null);

    Ok(CommandParts {
        command_name,
        transaction_id,
        command_object,
        additional_arguments: values.collect(),
    })
}

pub fn serialize_data(values: &[Amf0Value], amf3: bool) -> Result<Bytes, MessageSerializationError> {
    let encoded = rml_amf::serialize(values)?;
    if !amf3 {
        return Ok(Bytes::from(encoded));
    }

    let mut bytes = Vec::with_capacity(encoded.len() + 1);
    bytes.push(AMF3_FORMAT_BYTE);
    bytes.extend_from_slice(&encoded);
    Ok(Bytes::from(bytes))
}

pub fn deserialize_data(data: &[u8], amf3: bool) -> Result<Vec<Amf0Value>, MessageDeserializationError> {
    let mut data = data;
    if amf3 && data.first() == Some(&AMF3_FORMAT_BYTE) {
        data.advance(1);
    }

    let mut cursor = Cursor::new(data);
    Ok(rml_amf::deserialize(&mut cursor)?)
}
