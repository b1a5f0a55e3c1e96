//! Schema-aware access to binary record buffers.
//!
//! A [`CodecFactory`] parses a schema once, plans the layout of a chosen root
//! struct and hands out viewers and mutators over caller-owned buffers:
//! [`StaticDecoder`]/[`StaticCodec`] serve the static leaves of a record,
//! [`Decoder`]/[`Codec`] additionally resolve dynamic sections against the
//! buffer at construction time. The factory is immutable after construction;
//! decoders and codecs borrow it and must not outlive it.

use std::borrow::Cow;

use crate::access::ElementAccessor;
use crate::errors::CodecError;
use crate::layout::{self, DataRepresentation, EnumTable, Layout, LayoutElement};
use crate::path;
use crate::schema::Schema;
use crate::value::Value;

/// Owns a parsed schema and the derived static layout.
#[derive(Debug, Clone)]
pub struct CodecFactory {
    schema: Schema,
    layout: Layout,
}

impl CodecFactory {
    /// Parses `ddl` and plans the layout of `root_struct`.
    pub fn new(root_struct: &str, ddl: &str) -> Result<CodecFactory, CodecError> {
        let schema = Schema::parse(ddl)?;
        CodecFactory::from_schema(schema, root_struct)
    }

    /// Plans the layout of `root_struct` over an already loaded schema.
    pub fn from_schema(schema: Schema, root_struct: &str) -> Result<CodecFactory, CodecError> {
        if root_struct.trim().is_empty() {
            return Err(CodecError::InvalidArg("empty struct name".to_string()));
        }
        if !schema.is_valid() {
            return Err(CodecError::NotInitialized);
        }
        let layout = layout::plan_layout(&schema, root_struct)?;
        Ok(CodecFactory { schema, layout })
    }

    /// Resolves a stream declaration to its root type and plans that.
    pub fn for_stream(schema: Schema, stream_name: &str) -> Result<CodecFactory, CodecError> {
        let root = schema
            .find_stream(stream_name)
            .ok_or_else(|| CodecError::NotFound(format!("stream '{stream_name}'")))?
            .stream_type
            .clone();
        CodecFactory::from_schema(schema, &root)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Bytes needed for a record holding only the static leaves.
    pub fn static_buffer_size(&self, representation: DataRepresentation) -> usize {
        self.layout.static_buffer_size(representation)
    }

    pub fn static_element_count(&self) -> usize {
        self.layout.static_elements().len()
    }

    pub fn static_element(&self, index: usize) -> Result<&LayoutElement, CodecError> {
        element_at(self.layout.static_elements(), index)
    }

    pub fn find_index(&self, path: &str) -> Result<usize, CodecError> {
        path::find_index(self.layout.static_elements(), path)
    }

    pub fn find_struct_index(&self, path: &str) -> Result<usize, CodecError> {
        path::find_struct_index(self.layout.static_elements(), path)
    }

    pub fn find_array_index(&self, path: &str) -> Result<usize, CodecError> {
        path::find_array_index(self.layout.static_elements(), path)
    }

    /// A read-only view over the static leaves of `data`.
    pub fn make_static_decoder<'a>(
        &'a self,
        data: &'a [u8],
        representation: DataRepresentation,
    ) -> Result<StaticDecoder<'a>, CodecError> {
        check_buffer(data, self.static_buffer_size(representation))?;
        Ok(StaticDecoder {
            elements: self.layout.static_elements(),
            enums: self.layout.enum_tables(),
            data,
            representation,
        })
    }

    /// A mutator over the static leaves of `data`.
    pub fn make_static_codec<'a>(
        &'a self,
        data: &'a mut [u8],
        representation: DataRepresentation,
    ) -> Result<StaticCodec<'a>, CodecError> {
        check_buffer(data, self.static_buffer_size(representation))?;
        Ok(StaticCodec {
            elements: self.layout.static_elements(),
            enums: self.layout.enum_tables(),
            data,
            representation,
        })
    }

    /// A read-only view over `data` with every dynamic section resolved.
    pub fn make_decoder<'a>(
        &'a self,
        data: &'a [u8],
        representation: DataRepresentation,
    ) -> Result<Decoder<'a>, CodecError> {
        let (elements, enums, serialized_size, deserialized_size) =
            self.resolve(data, representation)?;
        Ok(Decoder {
            elements,
            enums,
            data,
            representation,
            serialized_size,
            deserialized_size,
        })
    }

    /// A mutator over `data` with every dynamic section resolved.
    pub fn make_codec<'a>(
        &'a self,
        data: &'a mut [u8],
        representation: DataRepresentation,
    ) -> Result<Codec<'a>, CodecError> {
        let (elements, enums, serialized_size, deserialized_size) =
            self.resolve(data, representation)?;
        Ok(Codec {
            elements,
            enums,
            data,
            representation,
            serialized_size,
            deserialized_size,
        })
    }

    #[allow(clippy::type_complexity)]
    fn resolve<'a>(
        &'a self,
        data: &[u8],
        representation: DataRepresentation,
    ) -> Result<(Cow<'a, [LayoutElement]>, Cow<'a, [EnumTable]>, usize, usize), CodecError> {
        if data.is_empty() {
            return Err(CodecError::NullPointer);
        }
        if !self.layout.is_dynamic() {
            check_buffer(data, self.static_buffer_size(representation))?;
            return Ok((
                Cow::Borrowed(self.layout.static_elements()),
                Cow::Borrowed(self.layout.enum_tables()),
                self.static_buffer_size(DataRepresentation::Serialized),
                self.static_buffer_size(DataRepresentation::Deserialized),
            ));
        }
        let resolved =
            layout::resolve_layout(&self.schema, self.layout.root_name(), data, representation)?;
        let needed = match representation {
            DataRepresentation::Serialized => resolved.serialized_size,
            DataRepresentation::Deserialized => resolved.deserialized_size,
        };
        check_buffer(data, needed)?;
        Ok((
            Cow::Owned(resolved.elements),
            Cow::Owned(resolved.enums),
            resolved.serialized_size,
            resolved.deserialized_size,
        ))
    }
}

/// Read-only view over the static leaves of a record.
#[derive(Debug)]
pub struct StaticDecoder<'a> {
    elements: &'a [LayoutElement],
    enums: &'a [EnumTable],
    data: &'a [u8],
    representation: DataRepresentation,
}

/// Mutator over the static leaves of a record.
#[derive(Debug)]
pub struct StaticCodec<'a> {
    elements: &'a [LayoutElement],
    enums: &'a [EnumTable],
    data: &'a mut [u8],
    representation: DataRepresentation,
}

/// Read-only view over a record, dynamic sections resolved.
#[derive(Debug)]
pub struct Decoder<'a> {
    elements: Cow<'a, [LayoutElement]>,
    enums: Cow<'a, [EnumTable]>,
    data: &'a [u8],
    representation: DataRepresentation,
    serialized_size: usize,
    deserialized_size: usize,
}

/// Mutator over a record, dynamic sections resolved.
#[derive(Debug)]
pub struct Codec<'a> {
    elements: Cow<'a, [LayoutElement]>,
    enums: Cow<'a, [EnumTable]>,
    data: &'a mut [u8],
    representation: DataRepresentation,
    serialized_size: usize,
    deserialized_size: usize,
}

macro_rules! reader_impl {
    () => {
        pub fn representation(&self) -> DataRepresentation {
            self.representation
        }

        pub fn element_count(&self) -> usize {
            self.elements().len()
        }

        pub fn element(&self, index: usize) -> Result<&LayoutElement, CodecError> {
            element_at(self.elements(), index)
        }

        /// Reads the value of the leaf at `index`.
        pub fn element_value(&self, index: usize) -> Result<Value, CodecError> {
            let element = element_at(self.elements(), index)?;
            ElementAccessor::for_representation(self.representation).get_value(element, self.buffer())
        }

        /// Reads the leaf at `index` and renders it; enum-typed leaves render
        /// their symbolic name when the value maps to one.
        pub fn element_value_as_string(&self, index: usize) -> Result<String, CodecError> {
            let element = element_at(self.elements(), index)?;
            let value = self.element_value(index)?;
            if let Some(table) = element.enumeration {
                if let Some(name) = self.enum_tables()[table].name_of(value.as_i64()) {
                    return Ok(name.to_string());
                }
            }
            Ok(value.to_string())
        }

        pub fn value_by_path(&self, path: &str) -> Result<Value, CodecError> {
            let index = self.find_index(path)?;
            self.element_value(index)
        }

        pub fn find_index(&self, path: &str) -> Result<usize, CodecError> {
            path::find_index(self.elements(), path)
        }

        pub fn find_struct_index(&self, path: &str) -> Result<usize, CodecError> {
            path::find_struct_index(self.elements(), path)
        }

        pub fn find_array_index(&self, path: &str) -> Result<usize, CodecError> {
            path::find_array_index(self.elements(), path)
        }

        /// The bytes backing the leaf at `index`. Only meaningful for the
        /// deserialized representation, where every leaf is byte aligned.
        pub fn element_bytes(&self, index: usize) -> Result<&[u8], CodecError> {
            let element = element_at(self.elements(), index)?;
            if self.representation != DataRepresentation::Deserialized {
                return Err(CodecError::InvalidArg(
                    "element addresses exist only in the deserialized representation".to_string(),
                ));
            }
            let position = element.deserialized;
            byte_range(position.bit_offset, position.bit_offset + position.bit_size, self.buffer().len())
                .map(|range| &self.buffer()[range])
        }

        /// The contiguous bytes of the struct addressed by `path`.
        pub fn struct_bytes(&self, path: &str) -> Result<&[u8], CodecError> {
            let range = block_range(self.elements(), self.representation, path, self.buffer().len())?;
            Ok(&self.buffer()[range])
        }

        /// The contiguous bytes of the array addressed by `path`.
        pub fn array_bytes(&self, path: &str) -> Result<&[u8], CodecError> {
            self.struct_bytes(path)
        }

        pub fn enum_tables(&self) -> &[EnumTable] {
            &self.enums
        }
    };
}

macro_rules! writer_impl {
    () => {
        /// Writes `value` into the leaf at `index`, converting to its type.
        pub fn set_element_value(&mut self, index: usize, value: Value) -> Result<(), CodecError> {
            let element = element_at(&self.elements, index)?;
            ElementAccessor::for_representation(self.representation)
                .set_value(element, self.data, &value)
        }

        pub fn set_value_by_path(&mut self, path: &str, value: Value) -> Result<(), CodecError> {
            let index = self.find_index(path)?;
            self.set_element_value(index, value)
        }

        /// Assigns every element declared with a constant its constant value.
        pub fn set_constants(&mut self) -> Result<(), CodecError> {
            let accessor = ElementAccessor::for_representation(self.representation);
            for index in 0..self.elements.len() {
                let element = &self.elements[index];
                let Some(constant) = element.constant else {
                    continue;
                };
                accessor.set_value(element, self.data, &constant)?;
            }
            Ok(())
        }

        /// Overwrites the contiguous bytes of the struct addressed by `path`.
        pub fn set_struct_bytes(&mut self, path: &str, bytes: &[u8]) -> Result<(), CodecError> {
            let range = block_range(&self.elements, self.representation, path, self.data.len())?;
            if bytes.len() != range.len() {
                return Err(CodecError::InvalidArg(format!(
                    "block '{}' is {} bytes, got {}",
                    path,
                    range.len(),
                    bytes.len()
                )));
            }
            self.data[range].copy_from_slice(bytes);
            Ok(())
        }

        /// Overwrites the contiguous bytes of the array addressed by `path`.
        pub fn set_array_bytes(&mut self, path: &str, bytes: &[u8]) -> Result<(), CodecError> {
            self.set_struct_bytes(path, bytes)
        }
    };
}

impl<'a> StaticDecoder<'a> {
    fn elements(&self) -> &[LayoutElement] {
        self.elements
    }

    pub fn buffer(&self) -> &[u8] {
        self.data
    }

    reader_impl!();
}

impl<'a> StaticCodec<'a> {
    fn elements(&self) -> &[LayoutElement] {
        self.elements
    }

    pub fn buffer(&self) -> &[u8] {
        &*self.data
    }

    reader_impl!();
    writer_impl!();
}

impl<'a> Decoder<'a> {
    pub(crate) fn layout_elements(&self) -> &[LayoutElement] {
        &self.elements
    }

    fn elements(&self) -> &[LayoutElement] {
        &self.elements
    }

    pub fn buffer(&self) -> &[u8] {
        self.data
    }

    /// Resolved size of this record in the given representation.
    pub fn buffer_size(&self, representation: DataRepresentation) -> usize {
        match representation {
            DataRepresentation::Serialized => self.serialized_size,
            DataRepresentation::Deserialized => self.deserialized_size,
        }
    }

    reader_impl!();
}

impl<'a> Codec<'a> {
    fn elements(&self) -> &[LayoutElement] {
        &self.elements
    }

    pub fn buffer(&self) -> &[u8] {
        &*self.data
    }

    /// Resolved size of this record in the given representation.
    pub fn buffer_size(&self, representation: DataRepresentation) -> usize {
        match representation {
            DataRepresentation::Serialized => self.serialized_size,
            DataRepresentation::Deserialized => self.deserialized_size,
        }
    }

    reader_impl!();
    writer_impl!();
}

fn element_at(elements: &[LayoutElement], index: usize) -> Result<&LayoutElement, CodecError> {
    elements
        .get(index)
        .ok_or_else(|| CodecError::InvalidArg(format!("element index {index} out of range")))
}

fn check_buffer(data: &[u8], needed: usize) -> Result<(), CodecError> {
    if data.is_empty() {
        return Err(CodecError::NullPointer);
    }
    if data.len() < needed {
        return Err(CodecError::InvalidArg(format!(
            "buffer of {} bytes, layout needs {}",
            data.len(),
            needed
        )));
    }
    Ok(())
}

fn byte_range(
    start_bit: usize,
    end_bit: usize,
    buffer_len: usize,
) -> Result<std::ops::Range<usize>, CodecError> {
    if start_bit % 8 != 0 || end_bit % 8 != 0 {
        return Err(CodecError::InvalidArg(
            "block is not byte aligned".to_string(),
        ));
    }
    let range = start_bit / 8..end_bit / 8;
    if range.end > buffer_len {
        return Err(CodecError::InvalidArg(format!(
            "block {}..{} exceeds buffer of {} bytes",
            range.start, range.end, buffer_len
        )));
    }
    Ok(range)
}

/// Byte span covered by every leaf of the struct or array at `path`.
fn block_range(
    elements: &[LayoutElement],
    representation: DataRepresentation,
    path: &str,
    buffer_len: usize,
) -> Result<std::ops::Range<usize>, CodecError> {
    let block = path::find_block(elements, path)?;
    let mut start_bit = usize::MAX;
    let mut end_bit = 0;
    for element in &elements[block] {
        let position = element.position(representation);
        start_bit = start_bit.min(position.bit_offset);
        end_bit = end_bit.max(position.bit_offset + position.bit_size);
    }
    byte_range(start_bit, end_bit, buffer_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueType;

    const NESTED_DESC: &str = r#"<structs>
        <struct alignment="4" name="child_struct" version="2">
            <element alignment="1" arraysize="1" byteorder="BE" bytepos="0" name="value_dummy" type="tInt8"/>
            <element alignment="4" arraysize="3" byteorder="BE" bytepos="1" name="value" type="tInt32"/>
            <element alignment="1" arraysize="1" byteorder="BE" bytepos="13" name="after" type="tInt8"/>
        </struct>
        <struct alignment="4" name="test" version="2">
            <element alignment="4" arraysize="2" byteorder="LE" bytepos="0" name="child" type="child_struct"/>
        </struct>
    </structs>"#;

    const DYNAMIC_DESC: &str = r#"<structs>
        <struct alignment="4" name="main" version="2">
            <element alignment="1" arraysize="1" byteorder="LE" bytepos="0" name="array_size" type="tInt8"/>
            <element alignment="4" arraysize="array_size" byteorder="LE" bytepos="1" name="array" type="tInt32"/>
            <element alignment="2" arraysize="1" byteorder="LE" bytepos="-1" name="after" type="tInt16"/>
        </struct>
    </structs>"#;

    const ENUM_DESC: &str = r#"<adtf:ddl>
        <enums>
            <enum name="tTest" type="tInt32">
                <element name="A" value="1"/>
                <element name="B" value="2"/>
                <element name="C" value="3"/>
            </enum>
            <enum name="tTest2" type="tInt32">
                <element name="D" value="1"/>
                <element name="E" value="2"/>
                <element name="F" value="3"/>
            </enum>
        </enums>
        <structs>
            <struct alignment="4" name="main" version="2">
                <element alignment="4" arraysize="1" byteorder="LE" bytepos="0" name="static" type="tTest"/>
                <element alignment="1" arraysize="1" byteorder="LE" bytepos="4" name="array_size" type="tInt8"/>
                <element alignment="4" arraysize="array_size" byteorder="LE" bytepos="5" name="array" type="tTest2"/>
                <element alignment="4" arraysize="1" byteorder="LE" bytepos="-1" name="after" type="tTest2"/>
            </struct>
        </structs>
    </adtf:ddl>"#;

    /// Deserialized image of the nested test record, natural layout.
    fn nested_deserialized() -> Vec<u8> {
        let mut data = Vec::new();
        for (dummy, values, after) in [(1i8, [2i32, 3, 4], 5i8), (6, [7, 8, 9], 10)] {
            data.extend_from_slice(&dummy.to_ne_bytes());
            data.extend_from_slice(&[0u8; 3]);
            for v in values {
                data.extend_from_slice(&v.to_ne_bytes());
            }
            data.extend_from_slice(&after.to_ne_bytes());
            data.extend_from_slice(&[0u8; 3]);
        }
        assert_eq!(data.len(), 40);
        data
    }

    /// Serialized image of the nested test record, packed big-endian values.
    fn nested_serialized() -> Vec<u8> {
        let mut data = Vec::new();
        for (dummy, values, after) in [(1i8, [2i32, 3, 4], 5i8), (6, [7, 8, 9], 10)] {
            data.push(dummy as u8);
            for v in values {
                data.extend_from_slice(&v.to_be_bytes());
            }
            data.push(after as u8);
        }
        assert_eq!(data.len(), 28);
        data
    }

    fn assert_nested_values(factory: &CodecFactory, data: &[u8], rep: DataRepresentation) {
        let decoder = factory.make_static_decoder(data, rep).unwrap();
        assert_eq!(decoder.element_count(), 10);
        let expectations = [
            ("child[0].value_dummy", 1i64),
            ("child[0].value[0]", 2),
            ("child[0].value[1]", 3),
            ("child[0].value[2]", 4),
            ("child[0].after", 5),
            ("child[1].value_dummy", 6),
            ("child[1].value[0]", 7),
            ("child[1].value[1]", 8),
            ("child[1].value[2]", 9),
            ("child[1].after", 10),
        ];
        for (path, expected) in expectations {
            assert_eq!(decoder.value_by_path(path).unwrap().as_i64(), expected, "{path}");
        }
        assert_eq!(
            decoder.value_by_path("child[0].value_dummy").unwrap().value_type(),
            ValueType::Int8
        );
        assert_eq!(
            decoder.value_by_path("child[0].value[0]").unwrap().value_type(),
            ValueType::Int32
        );
    }

    #[test]
    fn test_factory_static_queries() {
        let factory = CodecFactory::new("test", NESTED_DESC).unwrap();
        assert_eq!(factory.static_element_count(), 10);
        assert_eq!(factory.find_index("child[0].after").unwrap(), 4);
        assert_eq!(factory.find_struct_index("child[1]").unwrap(), 5);
        assert_eq!(factory.find_array_index("child").unwrap(), 0);
        assert_eq!(factory.static_element(0).unwrap().name, "child[0].value_dummy");
        assert_eq!(
            factory.static_buffer_size(DataRepresentation::Deserialized),
            40
        );
        assert_eq!(factory.static_buffer_size(DataRepresentation::Serialized), 28);
    }

    #[test]
    fn test_static_decoding_deserialized() {
        let factory = CodecFactory::new("test", NESTED_DESC).unwrap();
        let data = nested_deserialized();
        assert_nested_values(&factory, &data, DataRepresentation::Deserialized);
    }

    #[test]
    fn test_static_decoding_serialized() {
        let factory = CodecFactory::new("test", NESTED_DESC).unwrap();
        let data = nested_serialized();
        assert_nested_values(&factory, &data, DataRepresentation::Serialized);
    }

    #[test]
    fn test_static_codec_writes_through() {
        let factory = CodecFactory::new("test", NESTED_DESC).unwrap();
        let mut data = nested_deserialized();
        {
            let mut codec = factory
                .make_static_codec(&mut data, DataRepresentation::Deserialized)
                .unwrap();
            codec.set_element_value(1, Value::Int32(0x10)).unwrap();
            codec
                .set_value_by_path("child[1].value[2]", Value::Int32(0x20))
                .unwrap();
            assert_eq!(codec.value_by_path("child[0].value[0]").unwrap().as_i64(), 0x10);
        }
        assert_eq!(&data[4..8], &0x10i32.to_ne_bytes());
        assert_eq!(&data[32..36], &0x20i32.to_ne_bytes());
    }

    #[test]
    fn test_dynamic_decoder_deserialized() {
        let factory = CodecFactory::new("main", DYNAMIC_DESC).unwrap();
        let mut data = Vec::new();
        data.extend_from_slice(&4i8.to_ne_bytes());
        data.extend_from_slice(&[0u8; 3]);
        for v in [1i32, 2, 3, 4] {
            data.extend_from_slice(&v.to_ne_bytes());
        }
        data.extend_from_slice(&8i16.to_ne_bytes());
        data.extend_from_slice(&[0u8; 2]);

        let decoder = factory
            .make_decoder(&data, DataRepresentation::Deserialized)
            .unwrap();
        assert_eq!(decoder.element_count(), 6);
        assert_eq!(decoder.buffer_size(DataRepresentation::Deserialized), 24);
        assert_eq!(decoder.buffer_size(DataRepresentation::Serialized), 19);
        assert_eq!(decoder.value_by_path("array_size").unwrap().as_i64(), 4);
        for i in 0..4 {
            assert_eq!(
                decoder.value_by_path(&format!("array[{i}]")).unwrap().as_i64(),
                i as i64 + 1
            );
        }
        assert_eq!(decoder.value_by_path("after").unwrap().as_i64(), 8);
    }

    #[test]
    fn test_dynamic_decoder_serialized() {
        let factory = CodecFactory::new("main", DYNAMIC_DESC).unwrap();
        let mut data = vec![4u8];
        for v in [1i32, 2, 3, 4] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        data.extend_from_slice(&8i16.to_le_bytes());
        assert_eq!(data.len(), 19);

        let decoder = factory
            .make_decoder(&data, DataRepresentation::Serialized)
            .unwrap();
        assert_eq!(decoder.element_count(), 6);
        assert_eq!(decoder.buffer_size(DataRepresentation::Serialized), 19);
        assert_eq!(decoder.value_by_path("array[3]").unwrap().as_i64(), 4);
        assert_eq!(decoder.value_by_path("after").unwrap().as_i64(), 8);
    }

    #[test]
    fn test_shrinking_dynamic_array_drops_leaves() {
        let factory = CodecFactory::new("main", DYNAMIC_DESC).unwrap();
        let mut data = vec![0u8; 19];
        data[0] = 4;
        let decoder = factory
            .make_decoder(&data, DataRepresentation::Serialized)
            .unwrap();
        assert_eq!(decoder.element_count(), 6);

        data[0] = 0;
        let decoder = factory
            .make_decoder(&data, DataRepresentation::Serialized)
            .unwrap();
        assert_eq!(decoder.element_count(), 2);
        assert_eq!(decoder.buffer_size(DataRepresentation::Serialized), 3);
        assert!(decoder.find_index("array[0]").is_err());
    }

    #[test]
    fn test_enum_values_render_symbolically() {
        let factory = CodecFactory::new("main", ENUM_DESC).unwrap();
        let mut data = Vec::new();
        data.extend_from_slice(&2i32.to_ne_bytes());
        data.extend_from_slice(&3i8.to_ne_bytes());
        data.extend_from_slice(&[0u8; 3]);
        for v in [1i32, 2, 3] {
            data.extend_from_slice(&v.to_ne_bytes());
        }
        data.extend_from_slice(&3i32.to_ne_bytes());

        let decoder = factory
            .make_decoder(&data, DataRepresentation::Deserialized)
            .unwrap();
        let index = decoder.find_index("static").unwrap();
        assert_eq!(decoder.element_value_as_string(index).unwrap(), "B");
        let index = decoder.find_index("array_size").unwrap();
        assert_eq!(decoder.element_value_as_string(index).unwrap(), "3");
        for (i, expected) in ["D", "E", "F"].iter().enumerate() {
            let index = decoder.find_index(&format!("array[{i}]")).unwrap();
            assert_eq!(decoder.element_value_as_string(index).unwrap(), *expected);
        }
        let index = decoder.find_index("after").unwrap();
        assert_eq!(decoder.element_value_as_string(index).unwrap(), "F");
    }

    #[test]
    fn test_set_constants() {
        let desc = ENUM_DESC
            .replace(
                "name=\"static\" type=\"tTest\"",
                "name=\"static\" type=\"tTest\" value=\"A\"",
            )
            .replace(
                "name=\"array\" type=\"tTest2\"",
                "name=\"array\" type=\"tTest2\" value=\"D\"",
            )
            .replace(
                "name=\"after\" type=\"tTest2\"",
                "name=\"after\" type=\"tTest2\" value=\"E\"",
            );
        let factory = CodecFactory::new("main", &desc).unwrap();
        let mut data = vec![0u8; 24];
        data[4] = 3;
        let mut codec = factory
            .make_codec(&mut data, DataRepresentation::Deserialized)
            .unwrap();

        for path in ["static", "array[0]", "array[1]", "array[2]", "after"] {
            assert_eq!(codec.value_by_path(path).unwrap().as_i64(), 0, "{path}");
        }
        codec.set_constants().unwrap();
        assert_eq!(codec.value_by_path("static").unwrap().as_i64(), 1);
        assert_eq!(codec.value_by_path("array_size").unwrap().as_i64(), 3);
        for path in ["array[0]", "array[1]", "array[2]"] {
            assert_eq!(codec.value_by_path(path).unwrap().as_i64(), 1, "{path}");
        }
        assert_eq!(codec.value_by_path("after").unwrap().as_i64(), 2);
    }

    #[test]
    fn test_wire_record_with_dynamic_tail() {
        // u16 a, u8 b, u8 len, u8 data[len], u16 after packed tightly
        let desc = r#"<structs>
            <struct alignment="1" name="m" version="1">
                <element name="a" type="tUInt16" bytepos="0"/>
                <element name="b" type="tUInt8" bytepos="2"/>
                <element name="len" type="tUInt8" bytepos="3"/>
                <element name="data" type="tUInt8" bytepos="4" arraysize="len"/>
                <element name="after" type="tUInt16" bytepos="-1"/>
            </struct>
        </structs>"#;
        let factory = CodecFactory::new("m", desc).unwrap();
        let data = [0x00u8, 0x11, 0x22, 0x02, 0xAA, 0xBB, 0xCC, 0xCC];
        let decoder = factory
            .make_decoder(&data, DataRepresentation::Serialized)
            .unwrap();
        assert_eq!(decoder.value_by_path("a").unwrap().as_u64(), 0x1100);
        assert_eq!(decoder.value_by_path("b").unwrap().as_u64(), 0x22);
        assert_eq!(decoder.value_by_path("len").unwrap().as_u64(), 2);
        assert_eq!(decoder.value_by_path("data[0]").unwrap().as_u64(), 0xAA);
        assert_eq!(decoder.value_by_path("data[1]").unwrap().as_u64(), 0xBB);
        assert_eq!(decoder.value_by_path("after").unwrap().as_u64(), 0xCCCC);
    }

    #[test]
    fn test_single_bit_write() {
        let desc = r#"<structs>
            <struct alignment="1" name="p" version="1">
                <element name="v" type="tUInt16" bytepos="0" bitpos="0" numbits="1" byteorder="LE"/>
            </struct>
        </structs>"#;
        let factory = CodecFactory::new("p", desc).unwrap();
        let mut data = [0u8; 2];
        {
            let mut codec = factory
                .make_static_codec(&mut data, DataRepresentation::Serialized)
                .unwrap();
            codec.set_value_by_path("v", Value::UInt16(1)).unwrap();
            assert_eq!(codec.value_by_path("v").unwrap().as_u64(), 1);
        }
        assert_eq!(data, [0x01, 0x00]);
    }

    #[test]
    fn test_signed_bit_field_round_trip() {
        let desc = r#"<structs>
            <struct alignment="1" name="q" version="1">
                <element name="v" type="tInt16" bytepos="0" numbits="10" byteorder="LE"/>
            </struct>
        </structs>"#;
        let factory = CodecFactory::new("q", desc).unwrap();
        let mut data = [0u8; 2];
        let mut codec = factory
            .make_static_codec(&mut data, DataRepresentation::Serialized)
            .unwrap();
        codec.set_value_by_path("v", Value::Int16(-358)).unwrap();
        assert_eq!(codec.value_by_path("v").unwrap(), Value::Int16(-358));
    }

    #[test]
    fn test_block_transfer() {
        let factory = CodecFactory::new("test", NESTED_DESC).unwrap();
        let mut data = nested_deserialized();
        // child[1] starts at byte 20; a struct block spans its leaves, which
        // end at the 'after' element, 17 bytes in
        let child1: Vec<u8> = data[20..37].to_vec();
        let mut codec = factory
            .make_static_codec(&mut data, DataRepresentation::Deserialized)
            .unwrap();

        let block = codec.struct_bytes("child[0]").unwrap();
        assert_eq!(block.len(), 17);
        codec.set_struct_bytes("child[0]", &child1).unwrap();
        assert_eq!(codec.value_by_path("child[0].value[0]").unwrap().as_i64(), 7);
        assert_eq!(codec.value_by_path("child[0].after").unwrap().as_i64(), 10);

        let array = codec.array_bytes("child[0].value").unwrap();
        assert_eq!(array.len(), 12);
    }

    #[test]
    fn test_block_transfer_rejects_bit_packed_regions() {
        let desc = r#"<structs>
            <struct alignment="1" name="q" version="1">
                <element name="v" type="tInt16" bytepos="0" numbits="10" byteorder="LE"/>
            </struct>
        </structs>"#;
        let factory = CodecFactory::new("q", desc).unwrap();
        let data = [0u8; 2];
        let decoder = factory
            .make_static_decoder(&data, DataRepresentation::Serialized)
            .unwrap();
        assert!(matches!(
            decoder.struct_bytes("v"),
            Err(CodecError::InvalidArg(_))
        ));
    }

    #[test]
    fn test_element_bytes_only_deserialized() {
        let factory = CodecFactory::new("test", NESTED_DESC).unwrap();
        let data = nested_deserialized();
        let decoder = factory
            .make_static_decoder(&data, DataRepresentation::Deserialized)
            .unwrap();
        assert_eq!(decoder.element_bytes(1).unwrap(), &data[4..8]);

        let serialized = nested_serialized();
        let decoder = factory
            .make_static_decoder(&serialized, DataRepresentation::Serialized)
            .unwrap();
        assert!(matches!(
            decoder.element_bytes(1),
            Err(CodecError::InvalidArg(_))
        ));
    }

    #[test]
    fn test_error_handling() {
        // bad index
        let factory = CodecFactory::new("test", NESTED_DESC).unwrap();
        let data = nested_deserialized();
        let decoder = factory
            .make_static_decoder(&data, DataRepresentation::Deserialized)
            .unwrap();
        assert!(matches!(
            decoder.element_value(10),
            Err(CodecError::InvalidArg(_))
        ));

        // empty buffer
        assert_eq!(
            factory
                .make_static_decoder(&[], DataRepresentation::Deserialized)
                .err(),
            Some(CodecError::NullPointer)
        );
        assert_eq!(
            factory.make_decoder(&[], DataRepresentation::Deserialized).err(),
            Some(CodecError::NullPointer)
        );

        // buffer too small
        assert!(matches!(
            factory.make_static_decoder(&data[..10], DataRepresentation::Deserialized),
            Err(CodecError::InvalidArg(_))
        ));

        // unknown root struct
        assert!(matches!(
            CodecFactory::new("nope", NESTED_DESC),
            Err(CodecError::NotFound(_))
        ));

        // empty struct name and empty description
        assert!(matches!(
            CodecFactory::new("", NESTED_DESC),
            Err(CodecError::InvalidArg(_))
        ));
        assert!(matches!(
            CodecFactory::new("test", ""),
            Err(CodecError::Failed(_))
        ));
    }

    #[test]
    fn test_factory_for_stream() {
        let desc = r#"<adtf:ddl>
            <structs>
                <struct alignment="1" name="frame" version="1">
                    <element name="id" type="tUInt16" bytepos="0"/>
                </struct>
            </structs>
            <streams>
                <stream name="bus" type="frame"/>
            </streams>
        </adtf:ddl>"#;
        let schema = Schema::parse(desc).unwrap();
        let factory = CodecFactory::for_stream(schema.clone(), "bus").unwrap();
        assert_eq!(factory.layout().root_name(), "frame");
        assert!(matches!(
            CodecFactory::for_stream(schema, "nope"),
            Err(CodecError::NotFound(_))
        ));
    }

    #[test]
    fn test_partial_schema_requires_completion() {
        let partial = Schema::parse_partial(
            r#"<structs>
                <struct alignment="1" name="outer" version="1">
                    <element name="inner" type="missing_t" bytepos="0"/>
                </struct>
            </structs>"#,
        )
        .unwrap();
        assert!(!partial.is_valid());
        assert_eq!(
            CodecFactory::from_schema(partial.clone(), "outer").err(),
            Some(CodecError::NotInitialized)
        );

        let base = Schema::parse(
            r#"<structs>
                <struct alignment="1" name="missing_t" version="1">
                    <element name="x" type="tUInt8" bytepos="0"/>
                </struct>
            </structs>"#,
        )
        .unwrap();
        let mut completed = partial;
        completed.complete_with(&base).unwrap();
        let factory = CodecFactory::from_schema(completed, "outer").unwrap();
        assert_eq!(factory.static_element_count(), 1);
        assert_eq!(factory.static_element(0).unwrap().name, "inner.x");
    }
}
