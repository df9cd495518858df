use super::errors::{Amf3DeserializationError, ReferenceTable};
use super::{
    markers, Amf3Context, Amf3Object, Amf3Trait, Amf3Value, ARRAY_COLLECTION_CLASS,
    MAX_NESTING_DEPTH, OBJECT_PROXY_CLASS,
};
use byteorder::{BigEndian, ReadBytesExt};
use std::io::Read;

/// Reads AMF3 values until the stream is exhausted, sharing one set of reference tables
pub fn deserialize<R: Read>(bytes: &mut R) -> Result<Vec<Amf3Value>, Amf3DeserializationError> {
    let mut context = Amf3Context::new();
    let mut results = Vec::new();

    loop {
        let mut buffer: [u8; 1] = [0];
        if bytes.read(&mut buffer)? == 0 {
            break;
        }

        results.push(read_value(bytes, Some(buffer[0]), &mut context)?);
    }

    Ok(results)
}

/// Reads a single value.  When `marker` is `None` the type marker is read from the stream first.
pub fn read_value<R: Read>(
    bytes: &mut R,
    marker: Option<u8>,
    context: &mut Amf3Context,
) -> Result<Amf3Value, Amf3DeserializationError> {
    let marker = match marker {
        Some(marker) => marker,
        None => {
            let mut buffer: [u8; 1] = [0];
            if bytes.read(&mut buffer)? == 0 {
                return Err(Amf3DeserializationError::UnexpectedEof);
            }

            buffer[0]
        }
    };

    context.depth += 1;
    let result = if context.depth > MAX_NESTING_DEPTH {
        Err(Amf3DeserializationError::NestingTooDeep)
    } else {
        read_marked_value(bytes, marker, context)
    };

    context.depth -= 1;
    result
}

fn read_marked_value<R: Read>(
    bytes: &mut R,
    marker: u8,
    context: &mut Amf3Context,
) -> Result<Amf3Value, Amf3DeserializationError> {
    match marker {
        markers::UNDEFINED => Ok(Amf3Value::Undefined),
        markers::NULL => Ok(Amf3Value::Null),
        markers::FALSE => Ok(Amf3Value::Boolean(false)),
        markers::TRUE => Ok(Amf3Value::Boolean(true)),
        markers::INTEGER => {
            let value = read_u29(bytes)?;

            // Sign extend from 29 bits
            let signed = ((value << 3) as i32) >> 3;
            Ok(Amf3Value::Integer(signed))
        }

        markers::DOUBLE => Ok(Amf3Value::Double(bytes.read_f64::<BigEndian>()?)),
        markers::STRING => Ok(Amf3Value::String(read_string(bytes, context)?)),
        markers::XML_DOCUMENT
        | markers::XML
        | markers::DATE
        | markers::ARRAY
        | markers::OBJECT
        | markers::BYTE_ARRAY
        | markers::VECTOR_INT
        | markers::VECTOR_UINT
        | markers::VECTOR_DOUBLE
        | markers::VECTOR_OBJECT
        | markers::DICTIONARY => read_complex(bytes, marker, context),

        _ => Err(Amf3DeserializationError::UnknownMarker { marker }),
    }
}

fn read_complex<R: Read>(
    bytes: &mut R,
    marker: u8,
    context: &mut Amf3Context,
) -> Result<Amf3Value, Amf3DeserializationError> {
    let header = read_u29(bytes)?;
    if header & 1 == 0 {
        let index = header >> 1;
        return match context.objects.get(index as usize) {
            Some(Some(value)) => Ok(value.clone()),
            _ => Err(Amf3DeserializationError::InvalidReference {
                index,
                table: ReferenceTable::Object,
            }),
        };
    }

    let index = context.reserve_object();
    let length = (header >> 1) as usize;
    let value = match marker {
        markers::XML_DOCUMENT => Amf3Value::XmlDocument(read_utf8(bytes, length)?),
        markers::XML => Amf3Value::Xml(read_utf8(bytes, length)?),
        markers::DATE => Amf3Value::Date(bytes.read_f64::<BigEndian>()?),
        markers::BYTE_ARRAY => {
            let mut data = vec![0_u8; length];
            bytes.read_exact(&mut data)?;
            Amf3Value::ByteArray(data)
        }

        markers::ARRAY => {
            let mut associative = Vec::new();
            loop {
                let key = read_string(bytes, context)?;
                if key.is_empty() {
                    break;
                }

                let item = read_value(bytes, None, context)?;
                associative.push((key, item));
            }

            let mut dense = Vec::new();
            for _ in 0..length {
                dense.push(read_value(bytes, None, context)?);
            }

            Amf3Value::Array { associative, dense }
        }

        markers::OBJECT => read_object(bytes, header, context)?,
        markers::VECTOR_INT => {
            let fixed = bytes.read_u8()? != 0;
            let mut items = Vec::new();
            for _ in 0..length {
                items.push(bytes.read_i32::<BigEndian>()?);
            }

            Amf3Value::VectorInt { fixed, items }
        }

        markers::VECTOR_UINT => {
            let fixed = bytes.read_u8()? != 0;
            let mut items = Vec::new();
            for _ in 0..length {
                items.push(bytes.read_u32::<BigEndian>()?);
            }

            Amf3Value::VectorUInt { fixed, items }
        }

        markers::VECTOR_DOUBLE => {
            let fixed = bytes.read_u8()? != 0;
            let mut items = Vec::new();
            for _ in 0..length {
                items.push(bytes.read_f64::<BigEndian>()?);
            }

            Amf3Value::VectorDouble { fixed, items }
        }

        markers::VECTOR_OBJECT => {
            let fixed = bytes.read_u8()? != 0;
            let type_name = read_string(bytes, context)?;
            let mut items = Vec::new();
            for _ in 0..length {
                items.push(read_value(bytes, None, context)?);
            }

            Amf3Value::VectorObject {
                fixed,
                type_name,
                items,
            }
        }

        markers::DICTIONARY => {
            let weak_keys = bytes.read_u8()? != 0;
            let mut entries = Vec::new();
            for _ in 0..length {
                let key = read_value(bytes, None, context)?;
                let item = read_value(bytes, None, context)?;
                entries.push((key, item));
            }

            Amf3Value::Dictionary { weak_keys, entries }
        }

        _ => return Err(Amf3DeserializationError::UnknownMarker { marker }),
    };

    context.complete_object(index, &value);
    Ok(value)
}

fn read_object<R: Read>(
    bytes: &mut R,
    header: u32,
    context: &mut Amf3Context,
) -> Result<Amf3Value, Amf3DeserializationError> {
    let traits = read_traits(bytes, header, context)?;

    if traits.externalizable {
        if traits.class_name != ARRAY_COLLECTION_CLASS && traits.class_name != OBJECT_PROXY_CLASS {
            return Err(Amf3DeserializationError::UnsupportedExternalizable {
                class_name: traits.class_name,
            });
        }

        let value = read_value(bytes, None, context)?;
        return Ok(Amf3Value::Externalizable {
            class_name: traits.class_name,
            value: Box::new(value),
        });
    }

    let mut sealed_members = Vec::with_capacity(traits.members.len());
    for name in &traits.members {
        let member = read_value(bytes, None, context)?;
        sealed_members.push((name.clone(), member));
    }

    let mut dynamic_members = Vec::new();
    if traits.dynamic {
        loop {
            let name = read_string(bytes, context)?;
            if name.is_empty() {
                break;
            }

            let member = read_value(bytes, None, context)?;
            dynamic_members.push((name, member));
        }
    }

    Ok(Amf3Value::Object(Amf3Object {
        class_name: traits.class_name,
        dynamic: traits.dynamic,
        sealed_members,
        dynamic_members,
    }))
}

fn read_traits<R: Read>(
    bytes: &mut R,
    header: u32,
    context: &mut Amf3Context,
) -> Result<Amf3Trait, Amf3DeserializationError> {
    if header & 0b10 == 0 {
        let index = header >> 2;
        return context
            .traits
            .get(index as usize)
            .cloned()
            .ok_or(Amf3DeserializationError::InvalidReference {
                index,
                table: ReferenceTable::Trait,
            });
    }

    let externalizable = header & 0b100 != 0;
    let dynamic = header & 0b1000 != 0;
    let member_count = header >> 4;
    let class_name = read_string(bytes, context)?;

    let mut members = Vec::new();
    for _ in 0..member_count {
        members.push(read_string(bytes, context)?);
    }

    let traits = Amf3Trait {
        class_name,
        dynamic,
        externalizable,
        members,
    };

    context.traits.push(traits.clone());
    Ok(traits)
}

fn read_string<R: Read>(
    bytes: &mut R,
    context: &mut Amf3Context,
) -> Result<String, Amf3DeserializationError> {
    let header = read_u29(bytes)?;
    if header & 1 == 0 {
        let index = header >> 1;
        return context.strings.get(index as usize).cloned().ok_or(
            Amf3DeserializationError::InvalidReference {
                index,
                table: ReferenceTable::String,
            },
        );
    }

    let length = (header >> 1) as usize;
    if length == 0 {
        return Ok(String::new());
    }

    let value = read_utf8(bytes, length)?;
    context.strings.push(value.clone());
    Ok(value)
}

fn read_utf8<R: Read>(bytes: &mut R, length: usize) -> Result<String, Amf3DeserializationError> {
    let mut buffer = vec![0_u8; length];
    bytes.read_exact(&mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

fn read_u29<R: Read>(bytes: &mut R) -> Result<u32, Amf3DeserializationError> {
    let mut result: u32 = 0;
    for _ in 0..3 {
        let byte = bytes.read_u8()?;
        result = (result << 7) | (byte & 0x7f) as u32;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
    }

    let byte = bytes.read_u8()?;
    Ok((result << 8) | byte as u32)
}

#[cfg(test)]
mod tests {
    use super::super::{serialize, Amf3Object, Amf3Value};
    use super::*;
    use std::io::Cursor;

    fn read_all(bytes: Vec<u8>) -> Result<Vec<Amf3Value>, Amf3DeserializationError> {
        deserialize(&mut Cursor::new(bytes))
    }

    #[test]
    fn can_read_u29_boundaries() {
        let cases: Vec<(Vec<u8>, u32)> = vec![
            (vec![0x00], 0),
            (vec![0x7f], 0x7f),
            (vec![0x81, 0x00], 0x80),
            (vec![0xff, 0xff, 0x7f], 0x1f_ffff),
            (vec![0x80, 0xc0, 0x80, 0x00], 0x20_0000),
            (vec![0xff, 0xff, 0xff, 0xff], 0x1fff_ffff),
        ];

        for (input, expected) in cases {
            let result = read_u29(&mut Cursor::new(input)).unwrap();
            assert_eq!(result, expected);
        }
    }

    #[test]
    fn can_read_negative_integer() {
        let result = read_all(vec![markers::INTEGER, 0xff, 0xff, 0xff, 0xff]).unwrap();
        assert_eq!(result, vec![Amf3Value::Integer(-1)]);

        let result = read_all(vec![markers::INTEGER, 0xc0, 0x80, 0x80, 0x00]).unwrap();
        assert_eq!(result, vec![Amf3Value::Integer(-0x1000_0000)]);
    }

    #[test]
    fn can_read_simple_values() {
        let input = vec![
            markers::UNDEFINED,
            markers::NULL,
            markers::FALSE,
            markers::TRUE,
            markers::DOUBLE,
            0x3f,
            0xf8,
            0,
            0,
            0,
            0,
            0,
            0,
        ];

        let result = read_all(input).unwrap();
        let expected = vec![
            Amf3Value::Undefined,
            Amf3Value::Null,
            Amf3Value::Boolean(false),
            Amf3Value::Boolean(true),
            Amf3Value::Double(1.5),
        ];

        assert_eq!(result, expected);
    }

    #[test]
    fn string_reference_resolves_to_earlier_string() {
        let input = vec![markers::STRING, 0x05, b'h', b'i', markers::STRING, 0x00];
        let result = read_all(input).unwrap();

        let expected = vec![
            Amf3Value::String("hi".to_string()),
            Amf3Value::String("hi".to_string()),
        ];

        assert_eq!(result, expected);
    }

    #[test]
    fn unknown_string_reference_is_error() {
        match read_all(vec![markers::STRING, 0x02]) {
            Err(Amf3DeserializationError::InvalidReference {
                index: 1,
                table: ReferenceTable::String,
            }) => (),
            x => panic!("Expected invalid string reference, received {:?}", x),
        }
    }

    #[test]
    fn unknown_trait_reference_is_error() {
        match read_all(vec![markers::OBJECT, 0x05]) {
            Err(Amf3DeserializationError::InvalidReference {
                index: 1,
                table: ReferenceTable::Trait,
            }) => (),
            x => panic!("Expected invalid trait reference, received {:?}", x),
        }
    }

    #[test]
    fn object_reference_to_value_being_read_is_error() {
        // Array whose only dense element references the array itself
        let input = vec![markers::ARRAY, 0x03, 0x01, markers::ARRAY, 0x00];
        match read_all(input) {
            Err(Amf3DeserializationError::InvalidReference {
                index: 0,
                table: ReferenceTable::Object,
            }) => (),
            x => panic!("Expected invalid object reference, received {:?}", x),
        }
    }

    #[test]
    fn typed_objects_share_traits() {
        let input = vec![
            markers::ARRAY,
            0x05,
            0x01,
            markers::OBJECT,
            0x13,
            0x0b,
            b'P',
            b'o',
            b'i',
            b'n',
            b't',
            0x03,
            b'x',
            markers::INTEGER,
            0x01,
            markers::OBJECT,
            0x01,
            markers::INTEGER,
            0x02,
        ];

        let result = read_all(input).unwrap();
        let point = |x| {
            Amf3Value::Object(Amf3Object {
                class_name: "Point".to_string(),
                dynamic: false,
                sealed_members: vec![("x".to_string(), Amf3Value::Integer(x))],
                dynamic_members: Vec::new(),
            })
        };

        let expected = vec![Amf3Value::Array {
            associative: Vec::new(),
            dense: vec![point(1), point(2)],
        }];

        assert_eq!(result, expected);
    }

    #[test]
    fn can_read_array_collection() {
        let input = vec![
            markers::OBJECT,
            0x07,
            0x43,
            b'f',
            b'l',
            b'e',
            b'x',
            b'.',
            b'm',
            b'e',
            b's',
            b's',
            b'a',
            b'g',
            b'i',
            b'n',
            b'g',
            b'.',
            b'i',
            b'o',
            b'.',
            b'A',
            b'r',
            b'r',
            b'a',
            b'y',
            b'C',
            b'o',
            b'l',
            b'l',
            b'e',
            b'c',
            b't',
            b'i',
            b'o',
            b'n',
            markers::ARRAY,
            0x03,
            0x01,
            markers::TRUE,
        ];

        let result = read_all(input).unwrap();
        let expected = vec![Amf3Value::Externalizable {
            class_name: ARRAY_COLLECTION_CLASS.to_string(),
            value: Box::new(Amf3Value::Array {
                associative: Vec::new(),
                dense: vec![Amf3Value::Boolean(true)],
            }),
        }];

        assert_eq!(result, expected);
    }

    #[test]
    fn unknown_externalizable_class_is_error() {
        let input = vec![markers::OBJECT, 0x07, 0x03, b'A'];
        match read_all(input) {
            Err(Amf3DeserializationError::UnsupportedExternalizable { class_name }) => {
                assert_eq!(class_name, "A")
            }
            x => panic!("Expected unsupported externalizable, received {:?}", x),
        }
    }

    #[test]
    fn unknown_marker_is_error() {
        match read_all(vec![0x20]) {
            Err(Amf3DeserializationError::UnknownMarker { marker: 0x20 }) => (),
            x => panic!("Expected unknown marker, received {:?}", x),
        }
    }

    #[test]
    fn deeply_nested_input_is_rejected() {
        let mut input = Vec::new();
        for _ in 0..MAX_NESTING_DEPTH + 1 {
            input.extend_from_slice(&[markers::ARRAY, 0x03, 0x01]);
        }

        input.push(markers::NULL);
        match read_all(input) {
            Err(Amf3DeserializationError::NestingTooDeep) => (),
            x => panic!("Expected NestingTooDeep, received {:?}", x),
        }
    }

    #[test]
    fn shared_values_read_back_equal() {
        let shared = Amf3Value::Object(Amf3Object::anonymous(vec![(
            "name".to_string(),
            Amf3Value::String("camera".to_string()),
        )]));

        let input = vec![
            Amf3Value::Array {
                associative: vec![("first".to_string(), shared.clone())],
                dense: vec![shared.clone(), Amf3Value::Date(1_600_000_000_000.0)],
            },
            shared,
            Amf3Value::ByteArray(vec![1, 2, 3]),
            Amf3Value::VectorUInt {
                fixed: false,
                items: vec![0, u32::max_value()],
            },
            Amf3Value::VectorDouble {
                fixed: true,
                items: vec![0.5, -2.0],
            },
            Amf3Value::VectorObject {
                fixed: false,
                type_name: "String".to_string(),
                items: vec![Amf3Value::String("name".to_string())],
            },
            Amf3Value::Dictionary {
                weak_keys: false,
                entries: vec![(Amf3Value::Integer(1), Amf3Value::Xml("<x/>".to_string()))],
            },
            Amf3Value::XmlDocument("<doc/>".to_string()),
        ];

        let bytes = serialize(&input).unwrap();
        let result = read_all(bytes).unwrap();

        assert_eq!(result, input);
    }
}
