//! Conversion of records between their serialized and deserialized forms.
//!
//! The transformer walks the resolved leaves in layout order, reading each
//! value through the source's accessor and writing it through the
//! destination's. Layout order guarantees that an element naming a dynamic
//! array length lands in the destination before the array elements that
//! depend on it. The first failing element aborts the run and leaves the
//! destination partially written.

use crate::access::ElementAccessor;
use crate::codec::{Codec, Decoder, StaticCodec, StaticDecoder};
use crate::errors::CodecError;
use crate::layout::DataRepresentation;
use crate::value::Value;

/// Copies every leaf of `source` into `destination`.
///
/// Both sides must be built from the same schema root; the representations
/// may differ or match (a matching pair acts as a deep copy).
pub fn transform(source: &Decoder<'_>, destination: &mut Codec<'_>) -> Result<(), CodecError> {
    check_same_root(source.element_count(), destination.element_count())?;
    for index in 0..source.element_count() {
        if source.element(index)?.name != destination.element(index)?.name {
            return Err(CodecError::InvalidArg(format!(
                "source and destination disagree at element {index}"
            )));
        }
        let value = source.element_value(index)?;
        destination.set_element_value(index, value)?;
    }
    Ok(())
}

/// [`transform`] over the static leaves only.
pub fn transform_static(
    source: &StaticDecoder<'_>,
    destination: &mut StaticCodec<'_>,
) -> Result<(), CodecError> {
    check_same_root(source.element_count(), destination.element_count())?;
    for index in 0..source.element_count() {
        if source.element(index)?.name != destination.element(index)?.name {
            return Err(CodecError::InvalidArg(format!(
                "source and destination disagree at element {index}"
            )));
        }
        let value = source.element_value(index)?;
        destination.set_element_value(index, value)?;
    }
    Ok(())
}

/// Writes the opposite representation of `source` into `out`, resizing it to
/// the resolved destination size first.
pub fn transform_to_buffer(source: &Decoder<'_>, out: &mut Vec<u8>) -> Result<(), CodecError> {
    transform_to_representation(source, out, source.representation().opposite())
}

/// Writes the chosen representation of `source` into `out`. Passing the
/// source's own representation produces a normalized deep copy.
pub fn transform_to_representation(
    source: &Decoder<'_>,
    out: &mut Vec<u8>,
    representation: DataRepresentation,
) -> Result<(), CodecError> {
    out.clear();
    out.resize(source.buffer_size(representation), 0);
    let accessor = ElementAccessor::for_representation(representation);
    for (index, element) in source.layout_elements().iter().enumerate() {
        let value: Value = source.element_value(index)?;
        accessor.set_value(element, out, &value)?;
    }
    Ok(())
}

fn check_same_root(source_count: usize, destination_count: usize) -> Result<(), CodecError> {
    if source_count != destination_count {
        return Err(CodecError::InvalidArg(format!(
            "source has {source_count} elements, destination {destination_count}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CodecFactory;

    const ALL_TYPES_DESC: &str = r#"<structs>
        <struct alignment="4" name="main" version="2">
            <element alignment="1" arraysize="1" byteorder="BE" bytepos="0" name="flag" type="tBool"/>
            <element alignment="1" arraysize="1" byteorder="BE" bytepos="1" name="i8" type="tInt8"/>
            <element alignment="1" arraysize="1" byteorder="BE" bytepos="2" name="u8" type="tUInt8"/>
            <element alignment="2" arraysize="1" byteorder="BE" bytepos="3" name="i16" type="tInt16"/>
            <element alignment="2" arraysize="1" byteorder="BE" bytepos="5" name="u16" type="tUInt16"/>
            <element alignment="4" arraysize="1" byteorder="BE" bytepos="7" name="i32" type="tInt32"/>
            <element alignment="4" arraysize="1" byteorder="BE" bytepos="11" name="u32" type="tUInt32"/>
            <element alignment="8" arraysize="1" byteorder="BE" bytepos="15" name="i64" type="tInt64"/>
            <element alignment="8" arraysize="1" byteorder="BE" bytepos="23" name="u64" type="tUInt64"/>
            <element alignment="4" arraysize="1" byteorder="BE" bytepos="31" name="f32" type="tFloat32"/>
            <element alignment="8" arraysize="1" byteorder="BE" bytepos="35" name="f64" type="tFloat64"/>
            <element alignment="1" arraysize="1" byteorder="BE" bytepos="43" name="letter" type="tChar"/>
        </struct>
    </structs>"#;

    const COMPLEX_DESC: &str = r#"<structs>
        <struct alignment="4" name="child_struct" version="2">
            <element alignment="1" arraysize="1" byteorder="LE" bytepos="0" name="child_size" type="tInt8"/>
            <element alignment="4" arraysize="child_size" byteorder="LE" bytepos="1" name="child_array" type="tInt32"/>
            <element alignment="1" arraysize="1" byteorder="LE" bytepos="-1" name="child_size2" type="tInt8"/>
            <element alignment="4" arraysize="child_size2" byteorder="LE" bytepos="-1" name="child_array2" type="tInt32"/>
            <element alignment="2" arraysize="3" byteorder="LE" bytepos="-1" name="fixed_array" type="tInt16"/>
        </struct>
        <struct alignment="4" name="test" version="2">
            <element alignment="1" arraysize="1" byteorder="LE" bytepos="0" name="array_size" type="tInt8"/>
            <element alignment="4" arraysize="array_size" byteorder="LE" bytepos="1" name="array" type="child_struct"/>
        </struct>
        <struct alignment="4" name="main" version="2">
            <element alignment="1" arraysize="1" byteorder="LE" bytepos="0" name="before" type="tInt8"/>
            <element alignment="4" arraysize="1" byteorder="LE" bytepos="1" name="test" type="test"/>
            <element alignment="1" arraysize="1" byteorder="LE" bytepos="-1" name="after" type="tInt8"/>
        </struct>
    </structs>"#;

    fn complex_serialized() -> Vec<u8> {
        let mut data = vec![4u8, 2u8]; // before, test.array_size
        let children = [
            (3i8, [1i32, 2, 3], 2i8, [10i32, 20], [40i16, 50, 60]),
            (3, [11, 22, 33], 2, [110, 220], [400, 500, 600]),
        ];
        for (size, array, size2, array2, fixed) in children {
            data.push(size as u8);
            for v in array {
                data.extend_from_slice(&v.to_le_bytes());
            }
            data.push(size2 as u8);
            for v in array2 {
                data.extend_from_slice(&v.to_le_bytes());
            }
            for v in fixed {
                data.extend_from_slice(&v.to_le_bytes());
            }
        }
        data.push(8); // after
        assert_eq!(data.len(), 59);
        data
    }

    fn assert_complex_values(decoder: &Decoder<'_>) {
        let expectations: &[(&str, i64)] = &[
            ("before", 4),
            ("test.array_size", 2),
            ("test.array[0].child_size", 3),
            ("test.array[0].child_array[0]", 1),
            ("test.array[0].child_array[1]", 2),
            ("test.array[0].child_array[2]", 3),
            ("test.array[0].child_size2", 2),
            ("test.array[0].child_array2[0]", 10),
            ("test.array[0].child_array2[1]", 20),
            ("test.array[0].fixed_array[0]", 40),
            ("test.array[0].fixed_array[1]", 50),
            ("test.array[0].fixed_array[2]", 60),
            ("test.array[1].child_size", 3),
            ("test.array[1].child_array[0]", 11),
            ("test.array[1].child_array[1]", 22),
            ("test.array[1].child_array[2]", 33),
            ("test.array[1].child_size2", 2),
            ("test.array[1].child_array2[0]", 110),
            ("test.array[1].child_array2[1]", 220),
            ("test.array[1].fixed_array[0]", 400),
            ("test.array[1].fixed_array[1]", 500),
            ("test.array[1].fixed_array[2]", 600),
            ("after", 8),
        ];
        assert_eq!(decoder.element_count(), expectations.len());
        for (path, expected) in expectations {
            assert_eq!(decoder.value_by_path(path).unwrap().as_i64(), *expected, "{path}");
        }
    }

    #[test]
    fn test_all_types_round_trip() {
        let factory = CodecFactory::new("main", ALL_TYPES_DESC).unwrap();
        let des_size = factory.static_buffer_size(DataRepresentation::Deserialized);
        assert_eq!(des_size, 52);
        assert_eq!(factory.static_buffer_size(DataRepresentation::Serialized), 44);

        let values = [
            ("flag", Value::Bool(true)),
            ("i8", Value::Int8(1)),
            ("u8", Value::UInt8(2)),
            ("i16", Value::Int16(3)),
            ("u16", Value::UInt16(4)),
            ("i32", Value::Int32(5)),
            ("u32", Value::UInt32(6)),
            ("i64", Value::Int64(7)),
            ("u64", Value::UInt64(8)),
            ("f32", Value::Float32(3.1415)),
            ("f64", Value::Float64(2.7182)),
            ("letter", Value::Int8(b'x' as i8)),
        ];

        let mut original = vec![0u8; des_size];
        {
            let mut codec = factory
                .make_static_codec(&mut original, DataRepresentation::Deserialized)
                .unwrap();
            for (path, value) in values {
                codec.set_value_by_path(path, value).unwrap();
            }
        }

        let decoder = factory
            .make_decoder(&original, DataRepresentation::Deserialized)
            .unwrap();
        let mut serialized = Vec::new();
        transform_to_buffer(&decoder, &mut serialized).unwrap();
        assert_eq!(serialized.len(), 44);
        // big-endian u16 of 4 sits at serialized bytes 5..7
        assert_eq!(&serialized[5..7], &[0x00, 0x04]);

        let decoder = factory
            .make_decoder(&serialized, DataRepresentation::Serialized)
            .unwrap();
        let mut back = Vec::new();
        transform_to_buffer(&decoder, &mut back).unwrap();
        assert_eq!(back, original);

        let decoder = factory
            .make_decoder(&back, DataRepresentation::Deserialized)
            .unwrap();
        for (path, value) in values {
            assert_eq!(decoder.value_by_path(path).unwrap(), value, "{path}");
        }
    }

    #[test]
    fn test_complex_dynamic_round_trip() {
        let factory = CodecFactory::new("main", COMPLEX_DESC).unwrap();
        let serialized = complex_serialized();

        let decoder = factory
            .make_decoder(&serialized, DataRepresentation::Serialized)
            .unwrap();
        assert_eq!(decoder.buffer_size(DataRepresentation::Serialized), 59);
        assert_eq!(decoder.buffer_size(DataRepresentation::Deserialized), 84);
        assert_complex_values(&decoder);

        let mut deserialized = Vec::new();
        transform_to_buffer(&decoder, &mut deserialized).unwrap();
        assert_eq!(deserialized.len(), 84);

        let decoder = factory
            .make_decoder(&deserialized, DataRepresentation::Deserialized)
            .unwrap();
        assert_complex_values(&decoder);

        let mut back = Vec::new();
        transform_to_buffer(&decoder, &mut back).unwrap();
        assert_eq!(back, serialized);
    }

    #[test]
    fn test_transform_into_codec() {
        let factory = CodecFactory::new("main", COMPLEX_DESC).unwrap();
        let serialized = complex_serialized();
        let decoder = factory
            .make_decoder(&serialized, DataRepresentation::Serialized)
            .unwrap();

        // the destination codec can only resolve its dynamic lengths once
        // they are present, so stage them with a buffer transform first
        let mut destination = Vec::new();
        transform_to_buffer(&decoder, &mut destination).unwrap();

        let mut codec = factory
            .make_codec(&mut destination, DataRepresentation::Deserialized)
            .unwrap();
        transform(&decoder, &mut codec).unwrap();
        assert_complex_values(&factory.make_decoder(codec.buffer(), DataRepresentation::Deserialized).unwrap());
    }

    #[test]
    fn test_same_representation_transform_is_a_copy() {
        let factory = CodecFactory::new("main", ALL_TYPES_DESC).unwrap();
        let mut original = vec![0u8; 52];
        {
            let mut codec = factory
                .make_static_codec(&mut original, DataRepresentation::Deserialized)
                .unwrap();
            codec.set_value_by_path("u32", Value::UInt32(0xDEAD)).unwrap();
            codec.set_value_by_path("f64", Value::Float64(-1.25)).unwrap();
        }
        let decoder = factory
            .make_decoder(&original, DataRepresentation::Deserialized)
            .unwrap();
        let mut copy = Vec::new();
        transform_to_representation(&decoder, &mut copy, DataRepresentation::Deserialized).unwrap();
        assert_eq!(copy, original);
    }

    #[test]
    fn test_static_transform() {
        let factory = CodecFactory::new("main", ALL_TYPES_DESC).unwrap();
        let mut source_data = vec![0u8; 52];
        {
            let mut codec = factory
                .make_static_codec(&mut source_data, DataRepresentation::Deserialized)
                .unwrap();
            codec.set_value_by_path("i32", Value::Int32(-9)).unwrap();
        }
        let source = factory
            .make_static_decoder(&source_data, DataRepresentation::Deserialized)
            .unwrap();
        let mut destination_data = vec![0u8; 44];
        let mut destination = factory
            .make_static_codec(&mut destination_data, DataRepresentation::Serialized)
            .unwrap();
        transform_static(&source, &mut destination).unwrap();
        assert_eq!(destination.value_by_path("i32").unwrap(), Value::Int32(-9));
    }

    #[test]
    fn test_mismatched_roots_are_rejected() {
        let factory_a = CodecFactory::new("main", ALL_TYPES_DESC).unwrap();
        let factory_b = CodecFactory::new("main", COMPLEX_DESC).unwrap();
        let data_a = vec![0u8; 52];
        let mut data_b = vec![0u8; 84];
        let decoder = factory_a
            .make_decoder(&data_a, DataRepresentation::Deserialized)
            .unwrap();
        let mut codec = factory_b
            .make_codec(&mut data_b, DataRepresentation::Deserialized)
            .unwrap();
        assert!(matches!(
            transform(&decoder, &mut codec),
            Err(CodecError::InvalidArg(_))
        ));
    }
}
