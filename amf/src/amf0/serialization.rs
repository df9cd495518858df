//! Module contains functionality for serializing values into an
//! bytes based on the AMF0 specification
//! (http://wwwimages.adobe.com/content/dam/Adobe/en/devnet/amf/pdf/amf0-file-format-specification.pdf)

use super::errors::Amf0SerializationError;
use super::{markers, Amf0Context, Amf0Value};
use crate::amf3;
use byteorder::{BigEndian, WriteBytesExt};
use std::collections::HashMap;

/// Serializes values into an amf0 encoded vector of bytes
pub fn serialize(values: &[Amf0Value]) -> Result<Vec<u8>, Amf0SerializationError> {
    let mut context = Amf0Context::new();
    let mut bytes = vec![];
    for value in values {
        write_value(&mut bytes, value, &mut context)?;
    }

    Ok(bytes)
}

/// Appends a single value to `bytes`, recording complex values in the context so later equal
/// values are written as references.
pub fn write_value(
    bytes: &mut Vec<u8>,
    value: &Amf0Value,
    context: &mut Amf0Context,
) -> Result<(), Amf0SerializationError> {
    if value.is_complex() {
        if let Some(index) = find_reference(context, value) {
            bytes.push(markers::REFERENCE_MARKER);
            bytes.write_u16::<BigEndian>(index)?;
            return Ok(());
        }
    }

    match *value {
        Amf0Value::Boolean(val) => serialize_bool(val, bytes),
        Amf0Value::Null => bytes.push(markers::NULL_MARKER),
        Amf0Value::Undefined => bytes.push(markers::UNDEFINED_MARKER),
        Amf0Value::Unsupported => bytes.push(markers::UNSUPPORTED_MARKER),
        Amf0Value::Number(val) => serialize_number(val, bytes)?,
        Amf0Value::Utf8String(ref val) => serialize_string(val, bytes)?,
        Amf0Value::XmlDocument(ref val) => {
            bytes.push(markers::XML_DOCUMENT_MARKER);
            bytes.write_u32::<BigEndian>(val.len() as u32)?;
            bytes.extend(val.as_bytes());
        }

        Amf0Value::Date {
            unix_time,
            time_zone,
        } => {
            bytes.push(markers::DATE_MARKER);
            bytes.write_f64::<BigEndian>(unix_time)?;
            bytes.write_i16::<BigEndian>(time_zone)?;
        }

        Amf0Value::Object(ref properties) => {
            let index = reserve_reference(context);
            bytes.push(markers::OBJECT_MARKER);
            serialize_properties(properties, bytes, context)?;
            complete_reference(context, index, value);
        }

        Amf0Value::EcmaArray(ref properties) => {
            let index = reserve_reference(context);
            bytes.push(markers::ECMA_ARRAY_MARKER);
            bytes.write_u32::<BigEndian>(properties.len() as u32)?;
            serialize_properties(properties, bytes, context)?;
            complete_reference(context, index, value);
        }

        Amf0Value::TypedObject {
            ref class_name,
            ref properties,
        } => {
            let index = reserve_reference(context);
            bytes.push(markers::TYPED_OBJECT_MARKER);
            write_short_utf8(class_name, bytes)?;
            serialize_properties(properties, bytes, context)?;
            complete_reference(context, index, value);
        }

        Amf0Value::StrictArray(ref array) => {
            let index = reserve_reference(context);
            bytes.push(markers::STRICT_ARRAY_MARKER);
            bytes.write_u32::<BigEndian>(array.len() as u32)?;
            for item in array {
                write_value(bytes, item, context)?;
            }

            complete_reference(context, index, value);
        }

        Amf0Value::AvmPlus(ref amf3_value) => {
            bytes.push(markers::AVMPLUS_OBJECT_MARKER);
            amf3::write_value(bytes, amf3_value, &mut context.amf3)?;
        }
    }

    Ok(())
}

fn serialize_number(value: f64, bytes: &mut Vec<u8>) -> Result<(), Amf0SerializationError> {
    bytes.push(markers::NUMBER_MARKER);
    bytes.write_f64::<BigEndian>(value)?;
    Ok(())
}

fn serialize_bool(value: bool, bytes: &mut Vec<u8>) {
    bytes.push(markers::BOOLEAN_MARKER);
    bytes.push(value as u8);
}

fn serialize_string(value: &str, bytes: &mut Vec<u8>) -> Result<(), Amf0SerializationError> {
    // Strings too long for a 16 bit length switch to the long string marker
    if value.len() > (u16::max_value() as usize) {
        bytes.push(markers::LONG_STRING_MARKER);
        bytes.write_u32::<BigEndian>(value.len() as u32)?;
        bytes.extend(value.as_bytes());
        return Ok(());
    }

    bytes.push(markers::STRING_MARKER);
    write_short_utf8(value, bytes)
}

fn write_short_utf8(value: &str, bytes: &mut Vec<u8>) -> Result<(), Amf0SerializationError> {
    if value.len() > (u16::max_value() as usize) {
        return Err(Amf0SerializationError::PropertyNameTooLong {
            length: value.len(),
        });
    }

    bytes.write_u16::<BigEndian>(value.len() as u16)?;
    bytes.extend(value.as_bytes());
    Ok(())
}

fn serialize_properties(
    properties: &HashMap<String, Amf0Value>,
    bytes: &mut Vec<u8>,
    context: &mut Amf0Context,
) -> Result<(), Amf0SerializationError> {
    for (name, value) in properties {
        write_short_utf8(name, bytes)?;
        write_value(bytes, value, context)?;
    }

    bytes.write_u16::<BigEndian>(markers::UTF_8_EMPTY_MARKER)?;
    bytes.push(markers::OBJECT_END_MARKER);
    Ok(())
}

fn find_reference(context: &Amf0Context, value: &Amf0Value) -> Option<u16> {
    context
        .references
        .iter()
        .position(|existing| existing.as_ref() == Some(value))
        .filter(|index| *index <= u16::max_value() as usize)
        .map(|index| index as u16)
}

fn reserve_reference(context: &mut Amf0Context) -> usize {
    context.references.push(None);
    context.references.len() - 1
}

fn complete_reference(context: &mut Amf0Context, index: usize, value: &Amf0Value) {
    if let Some(slot) = context.references.get_mut(index) {
        *slot = Some(value.clone());
    }
}
