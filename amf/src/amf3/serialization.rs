use super::errors::Amf3SerializationError;
use super::{
    markers, Amf3Context, Amf3Object, Amf3Trait, Amf3Value, MAX_INTEGER, MAX_NESTING_DEPTH,
    MIN_INTEGER,
};
use byteorder::{BigEndian, WriteBytesExt};

/// Largest length, count or index that fits next to the one bit inline flag of a U29 header
const MAX_HEADER_VALUE: usize = 0x0fff_ffff;
const MAX_U29: u32 = 0x1fff_ffff;

/// Serializes values into an amf3 encoded vector of bytes, using one set of reference tables
/// for all of them.
pub fn serialize(values: &[Amf3Value]) -> Result<Vec<u8>, Amf3SerializationError> {
    let mut context = Amf3Context::new();
    let mut bytes = Vec::new();
    for value in values {
        write_value(&mut bytes, value, &mut context)?;
    }

    Ok(bytes)
}

/// Writes a marker followed by the value's payload.  Complex values equal to one already written
/// with this context are written as a reference.
pub fn write_value(
    bytes: &mut Vec<u8>,
    value: &Amf3Value,
    context: &mut Amf3Context,
) -> Result<(), Amf3SerializationError> {
    context.depth += 1;
    let result = if context.depth > MAX_NESTING_DEPTH {
        Err(Amf3SerializationError::NestingTooDeep)
    } else {
        write_inner(bytes, value, context)
    };

    context.depth -= 1;
    result
}

fn write_inner(
    bytes: &mut Vec<u8>,
    value: &Amf3Value,
    context: &mut Amf3Context,
) -> Result<(), Amf3SerializationError> {
    match *value {
        Amf3Value::Undefined => bytes.push(markers::UNDEFINED),
        Amf3Value::Null => bytes.push(markers::NULL),
        Amf3Value::Boolean(false) => bytes.push(markers::FALSE),
        Amf3Value::Boolean(true) => bytes.push(markers::TRUE),
        Amf3Value::Integer(number) if number >= MIN_INTEGER && number <= MAX_INTEGER => {
            bytes.push(markers::INTEGER);
            write_u29(bytes, (number as u32) & MAX_U29)?;
        }

        Amf3Value::Integer(number) => {
            bytes.push(markers::DOUBLE);
            bytes.write_f64::<BigEndian>(number as f64)?;
        }

        Amf3Value::Double(number) => {
            bytes.push(markers::DOUBLE);
            bytes.write_f64::<BigEndian>(number)?;
        }

        Amf3Value::String(ref text) => {
            bytes.push(markers::STRING);
            write_string(bytes, text, context)?;
        }

        _ => write_complex(bytes, value, context)?,
    }

    Ok(())
}

fn write_complex(
    bytes: &mut Vec<u8>,
    value: &Amf3Value,
    context: &mut Amf3Context,
) -> Result<(), Amf3SerializationError> {
    bytes.push(marker_for(value));

    let existing = context
        .objects
        .iter()
        .position(|object| object.as_ref() == Some(value));

    if let Some(index) = existing {
        return write_header(bytes, index, false);
    }

    let index = context.reserve_object();
    match *value {
        Amf3Value::XmlDocument(ref text) | Amf3Value::Xml(ref text) => {
            write_header(bytes, text.len(), true)?;
            bytes.extend(text.as_bytes());
        }

        Amf3Value::Date(millis) => {
            write_header(bytes, 0, true)?;
            bytes.write_f64::<BigEndian>(millis)?;
        }

        Amf3Value::ByteArray(ref data) => {
            write_header(bytes, data.len(), true)?;
            bytes.extend(data);
        }

        Amf3Value::Array {
            ref associative,
            ref dense,
        } => {
            write_header(bytes, dense.len(), true)?;
            for (key, item) in associative {
                write_string(bytes, key, context)?;
                write_value(bytes, item, context)?;
            }

            write_string(bytes, "", context)?;
            for item in dense {
                write_value(bytes, item, context)?;
            }
        }

        Amf3Value::Object(ref object) => write_object(bytes, object, context)?,
        Amf3Value::Externalizable {
            ref class_name,
            value: ref inner,
        } => {
            let traits = Amf3Trait {
                class_name: class_name.clone(),
                dynamic: false,
                externalizable: true,
                members: Vec::new(),
            };

            write_traits(bytes, traits, context)?;
            write_value(bytes, inner, context)?;
        }

        Amf3Value::VectorInt { fixed, ref items } => {
            write_header(bytes, items.len(), true)?;
            bytes.push(fixed as u8);
            for item in items {
                bytes.write_i32::<BigEndian>(*item)?;
            }
        }

        Amf3Value::VectorUInt { fixed, ref items } => {
            write_header(bytes, items.len(), true)?;
            bytes.push(fixed as u8);
            for item in items {
                bytes.write_u32::<BigEndian>(*item)?;
            }
        }

        Amf3Value::VectorDouble { fixed, ref items } => {
            write_header(bytes, items.len(), true)?;
            bytes.push(fixed as u8);
            for item in items {
                bytes.write_f64::<BigEndian>(*item)?;
            }
        }

        Amf3Value::VectorObject {
            fixed,
            ref type_name,
            ref items,
        } => {
            write_header(bytes, items.len(), true)?;
            bytes.push(fixed as u8);
            write_string(bytes, type_name, context)?;
            for item in items {
                write_value(bytes, item, context)?;
            }
        }

        Amf3Value::Dictionary {
            weak_keys,
            ref entries,
        } => {
            write_header(bytes, entries.len(), true)?;
            bytes.push(weak_keys as u8);
            for (key, item) in entries {
                write_value(bytes, key, context)?;
                write_value(bytes, item, context)?;
            }
        }

        // Simple values never reach this function
        _ => (),
    }

    context.complete_object(index, value);
    Ok(())
}

fn write_object(
    bytes: &mut Vec<u8>,
    object: &Amf3Object,
    context: &mut Amf3Context,
) -> Result<(), Amf3SerializationError> {
    let traits = Amf3Trait {
        class_name: object.class_name.clone(),
        dynamic: object.dynamic,
        externalizable: false,
        members: object
            .sealed_members
            .iter()
            .map(|(name, _)| name.clone())
            .collect(),
    };

    write_traits(bytes, traits, context)?;
    for (_, member) in &object.sealed_members {
        write_value(bytes, member, context)?;
    }

    if object.dynamic {
        for (name, member) in &object.dynamic_members {
            write_string(bytes, name, context)?;
            write_value(bytes, member, context)?;
        }

        write_string(bytes, "", context)?;
    }

    Ok(())
}

fn write_traits(
    bytes: &mut Vec<u8>,
    traits: Amf3Trait,
    context: &mut Amf3Context,
) -> Result<(), Amf3SerializationError> {
    if let Some(index) = context.traits.iter().position(|known| *known == traits) {
        check_header_value(index)?;
        return write_u29(bytes, ((index as u32) << 2) | 0b01);
    }

    // The member count shares the U29 with four flag bits
    if traits.members.len() > (MAX_U29 >> 4) as usize {
        return Err(Amf3SerializationError::ValueOutOfRange {
            value: traits.members.len(),
        });
    }

    let header = ((traits.members.len() as u32) << 4)
        | ((traits.dynamic as u32) << 3)
        | ((traits.externalizable as u32) << 2)
        | 0b11;

    write_u29(bytes, header)?;
    write_string(bytes, &traits.class_name, context)?;
    for member in &traits.members {
        write_string(bytes, member, context)?;
    }

    context.traits.push(traits);
    Ok(())
}

fn write_string(
    bytes: &mut Vec<u8>,
    value: &str,
    context: &mut Amf3Context,
) -> Result<(), Amf3SerializationError> {
    if value.is_empty() {
        return write_header(bytes, 0, true);
    }

    if let Some(&index) = context.string_indexes.get(value) {
        return write_header(bytes, index, false);
    }

    write_header(bytes, value.len(), true)?;
    bytes.extend(value.as_bytes());

    context
        .string_indexes
        .insert(value.to_string(), context.strings.len());
    context.strings.push(value.to_string());
    Ok(())
}

/// Writes a U29 whose low bit says whether `value` is an inline length/count (1) or a reference
/// index (0)
fn write_header(
    bytes: &mut Vec<u8>,
    value: usize,
    inline: bool,
) -> Result<(), Amf3SerializationError> {
    check_header_value(value)?;
    write_u29(bytes, ((value as u32) << 1) | inline as u32)
}

fn check_header_value(value: usize) -> Result<(), Amf3SerializationError> {
    if value > MAX_HEADER_VALUE {
        return Err(Amf3SerializationError::ValueOutOfRange { value });
    }

    Ok(())
}

fn write_u29(bytes: &mut Vec<u8>, value: u32) -> Result<(), Amf3SerializationError> {
    if value < 0x80 {
        bytes.push(value as u8);
    } else if value < 0x4000 {
        bytes.push(((value >> 7) as u8) | 0x80);
        bytes.push((value & 0x7f) as u8);
    } else if value < 0x20_0000 {
        bytes.push(((value >> 14) as u8) | 0x80);
        bytes.push((((value >> 7) & 0x7f) as u8) | 0x80);
        bytes.push((value & 0x7f) as u8);
    } else if value <= MAX_U29 {
        bytes.push((((value >> 22) & 0x7f) as u8) | 0x80);
        bytes.push((((value >> 15) & 0x7f) as u8) | 0x80);
        bytes.push((((value >> 8) & 0x7f) as u8) | 0x80);
        bytes.push((value & 0xff) as u8);
    } else {
        return Err(Amf3SerializationError::ValueOutOfRange {
            value: value as usize,
        });
    }

    Ok(())
}

fn marker_for(value: &Amf3Value) -> u8 {
    match *value {
        Amf3Value::Undefined => markers::UNDEFINED,
        Amf3Value::Null => markers::NULL,
        Amf3Value::Boolean(false) => markers::FALSE,
        Amf3Value::Boolean(true) => markers::TRUE,
        Amf3Value::Integer(_) => markers::INTEGER,
        Amf3Value::Double(_) => markers::DOUBLE,
        Amf3Value::String(_) => markers::STRING,
        Amf3Value::XmlDocument(_) => markers::XML_DOCUMENT,
        Amf3Value::Date(_) => markers::DATE,
        Amf3Value::Array { .. } => markers::ARRAY,
        Amf3Value::Object(_) | Amf3Value::Externalizable { .. } => markers::OBJECT,
        Amf3Value::Xml(_) => markers::XML,
        Amf3Value::ByteArray(_) => markers::BYTE_ARRAY,
        Amf3Value::VectorInt { .. } => markers::VECTOR_INT,
        Amf3Value::VectorUInt { .. } => markers::VECTOR_UINT,
        Amf3Value::VectorDouble { .. } => markers::VECTOR_DOUBLE,
        Amf3Value::VectorObject { .. } => markers::VECTOR_OBJECT,
        Amf3Value::Dictionary { .. } => markers::DICTIONARY,
    }
}
