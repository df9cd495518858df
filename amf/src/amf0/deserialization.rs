//! This module contains functionality to deserialize values from bytes
//! that were encoded via the AMF0 specification
//! (http://wwwimages.adobe.com/content/dam/Adobe/en/devnet/amf/pdf/amf0-file-format-specification.pdf)

use super::errors::Amf0DeserializationError;
use super::{markers, Amf0Context, Amf0Value};
use crate::amf3;
use byteorder::{BigEndian, ReadBytesExt};
use std::collections::HashMap;
use std::io::Read;

struct ObjectProperty {
    label: String,
    value: Amf0Value,
}

/// Turns any readable byte stream and converts it into an array of AMF0 values.
///
/// All values read share one reference table, which is discarded when the call returns.
pub fn deserialize<R: Read>(bytes: &mut R) -> Result<Vec<Amf0Value>, Amf0DeserializationError> {
    let mut context = Amf0Context::new();
    let mut results = vec![];

    loop {
        let mut buffer: [u8; 1] = [0];
        let bytes_read = bytes.read(&mut buffer)?;
        if bytes_read == 0 || buffer[0] == markers::OBJECT_END_MARKER {
            break;
        }

        let value = read_value(bytes, Some(buffer[0]), &mut context)?;
        results.push(value);
    }

    Ok(results)
}

/// Reads a single value.  When `marker` is `None` the type marker is read from the stream first,
/// otherwise the caller has already consumed it.
pub fn read_value<R: Read>(
    bytes: &mut R,
    marker: Option<u8>,
    context: &mut Amf0Context,
) -> Result<Amf0Value, Amf0DeserializationError> {
    let marker = match marker {
        Some(marker) => marker,
        None => read_marker(bytes)?,
    };

    match marker {
        markers::BOOLEAN_MARKER => parse_bool(bytes),
        markers::NULL_MARKER => Ok(Amf0Value::Null),
        markers::UNDEFINED_MARKER => Ok(Amf0Value::Undefined),
        markers::UNSUPPORTED_MARKER => Ok(Amf0Value::Unsupported),
        markers::NUMBER_MARKER => parse_number(bytes),
        markers::STRING_MARKER => parse_string(bytes).map(Amf0Value::Utf8String),
        markers::LONG_STRING_MARKER => parse_long_string(bytes).map(Amf0Value::Utf8String),
        markers::XML_DOCUMENT_MARKER => parse_long_string(bytes).map(Amf0Value::XmlDocument),
        markers::DATE_MARKER => parse_date(bytes),
        markers::OBJECT_MARKER => parse_object(bytes, context),
        markers::ECMA_ARRAY_MARKER => parse_ecma_array(bytes, context),
        markers::STRICT_ARRAY_MARKER => parse_strict_array(bytes, context),
        markers::TYPED_OBJECT_MARKER => parse_typed_object(bytes, context),
        markers::REFERENCE_MARKER => parse_reference(bytes, context),
        markers::AVMPLUS_OBJECT_MARKER => {
            let value = amf3::read_value(bytes, None, &mut context.amf3)?;
            Ok(Amf0Value::AvmPlus(value))
        }

        markers::MOVIECLIP_MARKER | markers::RECORDSET_MARKER => {
            Err(Amf0DeserializationError::UnsupportedType { marker })
        }

        _ => Err(Amf0DeserializationError::UnknownMarker { marker }),
    }
}

fn read_marker<R: Read>(bytes: &mut R) -> Result<u8, Amf0DeserializationError> {
    let mut buffer: [u8; 1] = [0];
    if bytes.read(&mut buffer)? == 0 {
        return Err(Amf0DeserializationError::UnexpectedEof);
    }

    Ok(buffer[0])
}

fn parse_number<R: Read>(bytes: &mut R) -> Result<Amf0Value, Amf0DeserializationError> {
    let number = bytes.read_f64::<BigEndian>()?;
    let value = Amf0Value::Number(number);

    Ok(value)
}

fn parse_bool<R: Read>(bytes: &mut R) -> Result<Amf0Value, Amf0DeserializationError> {
    let value = bytes.read_u8()?;

    if value == 0 {
        Ok(Amf0Value::Boolean(false))
    } else {
        Ok(Amf0Value::Boolean(true))
    }
}

fn parse_string<R: Read>(bytes: &mut R) -> Result<String, Amf0DeserializationError> {
    let length = bytes.read_u16::<BigEndian>()?;
    read_utf8(bytes, length as usize)
}

fn parse_long_string<R: Read>(bytes: &mut R) -> Result<String, Amf0DeserializationError> {
    let length = bytes.read_u32::<BigEndian>()?;
    read_utf8(bytes, length as usize)
}

fn read_utf8<R: Read>(bytes: &mut R, length: usize) -> Result<String, Amf0DeserializationError> {
    let mut buffer: Vec<u8> = vec![0_u8; length];
    bytes.read_exact(&mut buffer)?;

    let value = String::from_utf8(buffer)?;
    Ok(value)
}

fn parse_date<R: Read>(bytes: &mut R) -> Result<Amf0Value, Amf0DeserializationError> {
    let unix_time = bytes.read_f64::<BigEndian>()?;
    let time_zone = bytes.read_i16::<BigEndian>()?;

    Ok(Amf0Value::Date {
        unix_time,
        time_zone,
    })
}

fn parse_object<R: Read>(
    bytes: &mut R,
    context: &mut Amf0Context,
) -> Result<Amf0Value, Amf0DeserializationError> {
    let index = reserve_reference(context);
    let properties = parse_properties(bytes, context)?;

    let deserialized_value = Amf0Value::Object(properties);
    complete_reference(context, index, &deserialized_value);
    Ok(deserialized_value)
}

fn parse_ecma_array<R: Read>(
    bytes: &mut R,
    context: &mut Amf0Context,
) -> Result<Amf0Value, Amf0DeserializationError> {
    // While the spec says it gives you the count of items in the array, it is vague about if
    // the object end marker is used.  In real world usages I have found the associative array
    // actually ends with a 0x000009 ending (same as objects do).  If we don't consume this
    // then the buffer will start at that ending and funky things will happen.  So for now it seems
    // like we can ignore the associative count and just read exactly as we would an object.
    let index = reserve_reference(context);
    let _associative_count = bytes.read_u32::<BigEndian>()?;
    let properties = parse_properties(bytes, context)?;

    let deserialized_value = Amf0Value::EcmaArray(properties);
    complete_reference(context, index, &deserialized_value);
    Ok(deserialized_value)
}

fn parse_typed_object<R: Read>(
    bytes: &mut R,
    context: &mut Amf0Context,
) -> Result<Amf0Value, Amf0DeserializationError> {
    let index = reserve_reference(context);
    let class_name = parse_string(bytes)?;
    let properties = parse_properties(bytes, context)?;

    let deserialized_value = Amf0Value::TypedObject {
        class_name,
        properties,
    };

    complete_reference(context, index, &deserialized_value);
    Ok(deserialized_value)
}

fn parse_strict_array<R: Read>(
    bytes: &mut R,
    context: &mut Amf0Context,
) -> Result<Amf0Value, Amf0DeserializationError> {
    let index = reserve_reference(context);
    let array_count = bytes.read_u32::<BigEndian>()?;
    let mut values: Vec<Amf0Value> = Vec::new();

    for _ in 0..array_count {
        values.push(read_value(bytes, None, context)?);
    }

    let deserialized_value = Amf0Value::StrictArray(values);
    complete_reference(context, index, &deserialized_value);
    Ok(deserialized_value)
}

fn parse_reference<R: Read>(
    bytes: &mut R,
    context: &mut Amf0Context,
) -> Result<Amf0Value, Amf0DeserializationError> {
    let index = bytes.read_u16::<BigEndian>()?;
    match context.references.get(index as usize) {
        Some(Some(value)) => Ok(value.clone()),
        _ => Err(Amf0DeserializationError::InvalidReference { index }),
    }
}

fn parse_properties<R: Read>(
    bytes: &mut R,
    context: &mut Amf0Context,
) -> Result<HashMap<String, Amf0Value>, Amf0DeserializationError> {
    let mut properties = HashMap::new();

    loop {
        match parse_object_property(bytes, context)? {
            Some(property) => properties.insert(property.label, property.value),
            None => break,
        };
    }

    Ok(properties)
}

fn parse_object_property<R: Read>(
    bytes: &mut R,
    context: &mut Amf0Context,
) -> Result<Option<ObjectProperty>, Amf0DeserializationError> {
    let label_length = bytes.read_u16::<BigEndian>()?;
    if label_length == 0 {
        // Next byte should be the end of object marker.  We need to read this
        // to make sure we progress the current position.
        let byte = bytes.read_u8()?;
        if byte != markers::OBJECT_END_MARKER {
            return Err(Amf0DeserializationError::UnexpectedEmptyObjectPropertyName);
        }

        return Ok(None);
    }

    let label = read_utf8(bytes, label_length as usize)?;
    let marker = read_marker(bytes)?;
    if marker == markers::OBJECT_END_MARKER {
        return Err(Amf0DeserializationError::UnexpectedEof);
    }

    let value = read_value(bytes, Some(marker), context)?;
    Ok(Some(ObjectProperty { label, value }))
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

#[cfg(test)]
mod tests {
    use super::super::Amf0Value;
    use super::*;
    use crate::amf3::Amf3Value;
    use byteorder::{BigEndian, WriteBytesExt};
    use std::collections::HashMap;
    use std::io::Cursor;

    #[test]
    fn can_deserialize_strict_array() {
        let mut vector = vec![];
        vector.push(markers::STRICT_ARRAY_MARKER);
        vector.write_u32::<BigEndian>(2).unwrap();
        vector.push(markers::NUMBER_MARKER);
        vector.write_f64::<BigEndian>(1.0).unwrap();
        vector.push(markers::NUMBER_MARKER);
        vector.write_f64::<BigEndian>(2.0).unwrap();

        let mut input = Cursor::new(vector);
        let result = deserialize(&mut input).unwrap();

        let expected = vec![Amf0Value::StrictArray(vec![
            Amf0Value::Number(1.0),
            Amf0Value::Number(2.0),
        ])];

        assert_eq!(result, expected);
    }

    #[test]
    fn can_deserialize_number() {
        let number: f64 = 332.0;

        let mut vector = vec![];
        vector.write_u8(markers::NUMBER_MARKER).unwrap();
        vector.write_f64::<BigEndian>(number).unwrap();

        let mut input = Cursor::new(vector);
        let result = deserialize(&mut input).unwrap();

        let expected = vec![Amf0Value::Number(number)];
        assert_eq!(result, expected);
    }

    #[test]
    fn can_deserialize_booleans() {
        let vector = vec![
            markers::BOOLEAN_MARKER,
            1,
            markers::BOOLEAN_MARKER,
            0,
        ];

        let mut input = Cursor::new(vector);
        let result = deserialize(&mut input).unwrap();

        let expected = vec![Amf0Value::Boolean(true), Amf0Value::Boolean(false)];
        assert_eq!(result, expected);
    }

    #[test]
    fn can_deserialize_string() {
        let value = "test";

        let mut vector = vec![];
        vector.write_u8(markers::STRING_MARKER).unwrap();
        vector.write_u16::<BigEndian>(value.len() as u16).unwrap();
        vector.extend(value.as_bytes());

        let mut input = Cursor::new(vector);
        let result = deserialize(&mut input).unwrap();

        let expected = vec![Amf0Value::Utf8String(value.to_string())];
        assert_eq!(result, expected);
    }

    #[test]
    fn can_deserialize_long_string() {
        let value = "a".repeat(70000);

        let mut vector = vec![];
        vector.write_u8(markers::LONG_STRING_MARKER).unwrap();
        vector.write_u32::<BigEndian>(value.len() as u32).unwrap();
        vector.extend(value.as_bytes());

        let mut input = Cursor::new(vector);
        let result = deserialize(&mut input).unwrap();

        assert_eq!(result, vec![Amf0Value::Utf8String(value)]);
    }

    #[test]
    fn can_deserialize_null_and_undefined() {
        let vector = vec![markers::NULL_MARKER, markers::UNDEFINED_MARKER];

        let mut input = Cursor::new(vector);
        let result = deserialize(&mut input).unwrap();

        assert_eq!(result, vec![Amf0Value::Null, Amf0Value::Undefined]);
    }

    #[test]
    fn can_deserialize_object() {
        const NUMBER: f64 = 332.0;

        let mut vector = vec![];
        vector.push(markers::OBJECT_MARKER);
        vector.write_u16::<BigEndian>(4).unwrap();
        vector.extend("test".as_bytes());
        vector.push(markers::NUMBER_MARKER);
        vector.write_f64::<BigEndian>(NUMBER).unwrap();
        vector
            .write_u16::<BigEndian>(markers::UTF_8_EMPTY_MARKER)
            .unwrap();
        vector.push(markers::OBJECT_END_MARKER);

        let mut input = Cursor::new(vector);
        let result = deserialize(&mut input).unwrap();

        let mut properties = HashMap::new();
        properties.insert("test".to_string(), Amf0Value::Number(NUMBER));

        let expected = vec![Amf0Value::Object(properties)];
        assert_eq!(result, expected);
    }

    #[test]
    fn can_deserialize_documented_object_example() {
        let vector = vec![
            0x03, 0x00, 0x04, 0x6e, 0x61, 0x6d, 0x65, 0x02, 0x00, 0x04, 0x4d, 0x69, 0x6b, 0x65,
            0x00, 0x03, 0x61, 0x67, 0x65, 0x00, 0x40, 0x3e, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x05, 0x61, 0x6c, 0x69, 0x61, 0x73, 0x02, 0x00, 0x04, 0x4d, 0x69, 0x6b, 0x65,
            0x00, 0x00, 0x09,
        ];

        let mut input = Cursor::new(vector);
        let result = deserialize(&mut input).unwrap();

        let mut properties = HashMap::new();
        properties.insert("name".to_string(), Amf0Value::Utf8String("Mike".to_string()));
        properties.insert("age".to_string(), Amf0Value::Number(30.0));
        properties.insert("alias".to_string(), Amf0Value::Utf8String("Mike".to_string()));

        assert_eq!(result, vec![Amf0Value::Object(properties)]);
    }

    #[test]
    fn can_deserialize_ecma_array() {
        let mut vector = vec![];
        vector.push(markers::ECMA_ARRAY_MARKER);
        vector.write_u32::<BigEndian>(2).unwrap();
        vector.write_u16::<BigEndian>(5).unwrap();
        vector.extend("test1".as_bytes());
        vector.push(markers::NUMBER_MARKER);
        vector.write_f64::<BigEndian>(1.0).unwrap();
        vector.write_u16::<BigEndian>(5).unwrap();
        vector.extend("test2".as_bytes());
        vector.write_u8(markers::STRING_MARKER).unwrap();
        vector.write_u16::<BigEndian>(6).unwrap();
        vector.extend("second".as_bytes());
        vector
            .write_u16::<BigEndian>(markers::UTF_8_EMPTY_MARKER)
            .unwrap();
        vector.push(markers::OBJECT_END_MARKER);

        let mut input = Cursor::new(vector);
        let result = deserialize(&mut input).unwrap();

        let mut properties = HashMap::new();
        properties.insert("test1".to_string(), Amf0Value::Number(1.0));
        properties.insert(
            "test2".to_string(),
            Amf0Value::Utf8String("second".to_string()),
        );

        let expected = vec![Amf0Value::EcmaArray(properties)];
        assert_eq!(result, expected);
    }

    #[test]
    fn can_deserialize_date() {
        let mut vector = vec![];
        vector.push(markers::DATE_MARKER);
        vector.write_f64::<BigEndian>(1_500_000_000_000.0).unwrap();
        vector.write_i16::<BigEndian>(0).unwrap();

        let mut input = Cursor::new(vector);
        let result = deserialize(&mut input).unwrap();

        let expected = vec![Amf0Value::Date {
            unix_time: 1_500_000_000_000.0,
            time_zone: 0,
        }];

        assert_eq!(result, expected);
    }

    #[test]
    fn can_deserialize_typed_object() {
        let mut vector = vec![];
        vector.push(markers::TYPED_OBJECT_MARKER);
        vector.write_u16::<BigEndian>(3).unwrap();
        vector.extend("Foo".as_bytes());
        vector.write_u16::<BigEndian>(1).unwrap();
        vector.extend("a".as_bytes());
        vector.push(markers::BOOLEAN_MARKER);
        vector.push(1);
        vector.write_u16::<BigEndian>(0).unwrap();
        vector.push(markers::OBJECT_END_MARKER);

        let mut input = Cursor::new(vector);
        let result = deserialize(&mut input).unwrap();

        let mut properties = HashMap::new();
        properties.insert("a".to_string(), Amf0Value::Boolean(true));
        let expected = vec![Amf0Value::TypedObject {
            class_name: "Foo".to_string(),
            properties,
        }];

        assert_eq!(result, expected);
    }

    #[test]
    fn reference_resolves_to_previously_read_object() {
        let mut vector = vec![];
        vector.push(markers::STRICT_ARRAY_MARKER);
        vector.write_u32::<BigEndian>(2).unwrap();
        vector.push(markers::OBJECT_MARKER);
        vector.write_u16::<BigEndian>(1).unwrap();
        vector.extend("x".as_bytes());
        vector.push(markers::NUMBER_MARKER);
        vector.write_f64::<BigEndian>(5.0).unwrap();
        vector.write_u16::<BigEndian>(0).unwrap();
        vector.push(markers::OBJECT_END_MARKER);
        vector.push(markers::REFERENCE_MARKER);
        vector.write_u16::<BigEndian>(1).unwrap();

        let mut input = Cursor::new(vector);
        let result = deserialize(&mut input).unwrap();

        let mut properties = HashMap::new();
        properties.insert("x".to_string(), Amf0Value::Number(5.0));
        let object = Amf0Value::Object(properties);

        assert_eq!(result, vec![Amf0Value::StrictArray(vec![object.clone(), object])]);
    }

    #[test]
    fn reference_to_unknown_index_is_error() {
        let mut vector = vec![markers::REFERENCE_MARKER];
        vector.write_u16::<BigEndian>(3).unwrap();

        let mut input = Cursor::new(vector);
        match deserialize(&mut input) {
            Err(Amf0DeserializationError::InvalidReference { index: 3 }) => (),
            x => panic!("Expected invalid reference error, received {:?}", x),
        }
    }

    #[test]
    fn reference_to_value_still_being_read_is_error() {
        let mut vector = vec![markers::STRICT_ARRAY_MARKER];
        vector.write_u32::<BigEndian>(1).unwrap();
        vector.push(markers::REFERENCE_MARKER);
        vector.write_u16::<BigEndian>(0).unwrap();

        let mut input = Cursor::new(vector);
        match deserialize(&mut input) {
            Err(Amf0DeserializationError::InvalidReference { index: 0 }) => (),
            x => panic!("Expected invalid reference error, received {:?}", x),
        }
    }

    #[test]
    fn avmplus_marker_switches_to_amf3() {
        let vector = vec![
            markers::AVMPLUS_OBJECT_MARKER,
            0x06,
            0x07,
            b'a',
            b'b',
            b'c',
            markers::NUMBER_MARKER,
            0x3f,
            0xf0,
            0,
            0,
            0,
            0,
            0,
            0,
        ];

        let mut input = Cursor::new(vector);
        let result = deserialize(&mut input).unwrap();

        let expected = vec![
            Amf0Value::AvmPlus(Amf3Value::String("abc".to_string())),
            Amf0Value::Number(1.0),
        ];

        assert_eq!(result, expected);
    }

    #[test]
    fn movieclip_marker_is_unsupported() {
        let mut input = Cursor::new(vec![markers::MOVIECLIP_MARKER]);
        match deserialize(&mut input) {
            Err(Amf0DeserializationError::UnsupportedType { marker: 4 }) => (),
            x => panic!("Expected unsupported type error, received {:?}", x),
        }
    }

    #[test]
    fn truncated_number_is_error() {
        let mut input = Cursor::new(vec![markers::NUMBER_MARKER, 0x40]);
        assert!(deserialize(&mut input).is_err());
    }
}
