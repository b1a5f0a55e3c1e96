//! Layout planning: from a schema and a root struct to the flat list of
//! addressable leaf slots.
//!
//! Every leaf carries its bit position and width in both representations.
//! The serialized side follows the schema's explicit byte/bit positions and
//! packs tightly where none are given; the deserialized side mirrors the
//! natural C layout, aligning each element relative to its enclosing struct
//! instance and padding every struct to its declared alignment.
//!
//! A layout built without a buffer stops at the first dynamic array; that
//! static prefix is what the static codec classes serve. Resolving against a
//! buffer walks the whole tree, reading each length element on the way.

use std::collections::HashMap;

use crate::access::ElementAccessor;
use crate::bits::ByteOrder;
use crate::errors::CodecError;
use crate::schema::{
    ArraySize, LanguageVersion, Schema, StructElement, TypeRef, value_type_for,
};
use crate::value::{Value, ValueType};

/// Which form of a record a buffer holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataRepresentation {
    /// Wire/storage form: bit-packed, explicit byte order, no host padding.
    Serialized,
    /// In-memory form: byte-aligned, host byte order, platform padding.
    Deserialized,
}

impl DataRepresentation {
    pub fn opposite(self) -> DataRepresentation {
        match self {
            DataRepresentation::Serialized => DataRepresentation::Deserialized,
            DataRepresentation::Deserialized => DataRepresentation::Serialized,
        }
    }
}

/// Bit position and width of a leaf in one representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub bit_offset: usize,
    pub bit_size: usize,
}

/// One addressable scalar slot of a planned record.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutElement {
    /// Full dotted path, array leaves indexed (`child[0].value[2]`).
    pub name: String,
    pub value_type: ValueType,
    pub serialized: Position,
    pub deserialized: Position,
    pub byte_order: ByteOrder,
    /// Constant overlay value from the schema's `value` attribute.
    pub constant: Option<Value>,
    /// Index into the layout's enum tables for enum-typed leaves.
    pub enumeration: Option<usize>,
}

impl LayoutElement {
    pub fn position(&self, representation: DataRepresentation) -> Position {
        match representation {
            DataRepresentation::Serialized => self.serialized,
            DataRepresentation::Deserialized => self.deserialized,
        }
    }
}

/// Symbol table of an enumeration referenced by the layout.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumTable {
    pub name: String,
    pub values: Vec<(String, i64)>,
}

impl EnumTable {
    pub fn value_of(&self, name: &str) -> Option<i64> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    pub fn name_of(&self, value: i64) -> Option<&str> {
        self.values
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(n, _)| n.as_str())
    }
}

/// The static plan for a root struct.
#[derive(Debug, Clone)]
pub struct Layout {
    root: String,
    elements: Vec<LayoutElement>,
    enums: Vec<EnumTable>,
    serialized_size: usize,
    deserialized_size: usize,
    dynamic: bool,
}

impl Layout {
    pub fn root_name(&self) -> &str {
        &self.root
    }

    /// Leaves up to, but not including, the first dynamic section.
    pub fn static_elements(&self) -> &[LayoutElement] {
        &self.elements
    }

    pub fn enum_tables(&self) -> &[EnumTable] {
        &self.enums
    }

    /// Whether the record contains a dynamic section.
    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    /// Bytes covered by the static leaves in the given representation.
    pub fn static_buffer_size(&self, representation: DataRepresentation) -> usize {
        match representation {
            DataRepresentation::Serialized => self.serialized_size,
            DataRepresentation::Deserialized => self.deserialized_size,
        }
    }
}

/// Fully expanded layout of one record instance.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedLayout {
    pub elements: Vec<LayoutElement>,
    pub enums: Vec<EnumTable>,
    pub serialized_size: usize,
    pub deserialized_size: usize,
}

/// Plans the static layout of `root`.
pub fn plan_layout(schema: &Schema, root: &str) -> Result<Layout, CodecError> {
    let root_index = schema
        .struct_position(root)
        .ok_or_else(|| CodecError::NotFound(format!("struct '{root}'")))?;
    let mut walker = Walker::new(schema, None);
    let (serialized_end, deserialized_end) =
        walker.walk_struct(root_index, "", 0, 0, &mut Vec::new())?;
    Ok(Layout {
        root: root.to_string(),
        elements: walker.elements,
        enums: walker.enums,
        serialized_size: serialized_end.div_ceil(8),
        deserialized_size: deserialized_end.div_ceil(8),
        dynamic: walker.truncated,
    })
}

/// Expands the layout of `root` over a concrete buffer, reading every dynamic
/// array length on the way.
pub(crate) fn resolve_layout(
    schema: &Schema,
    root: &str,
    data: &[u8],
    representation: DataRepresentation,
) -> Result<ResolvedLayout, CodecError> {
    let root_index = schema
        .struct_position(root)
        .ok_or_else(|| CodecError::NotFound(format!("struct '{root}'")))?;
    let mut walker = Walker::new(schema, Some((data, representation)));
    let (serialized_end, deserialized_end) =
        walker.walk_struct(root_index, "", 0, 0, &mut Vec::new())?;
    Ok(ResolvedLayout {
        elements: walker.elements,
        enums: walker.enums,
        serialized_size: serialized_end.div_ceil(8),
        deserialized_size: deserialized_end.div_ceil(8),
    })
}

struct Walker<'a> {
    schema: &'a Schema,
    buffer: Option<(&'a [u8], DataRepresentation)>,
    elements: Vec<LayoutElement>,
    enums: Vec<EnumTable>,
    enum_index: HashMap<String, usize>,
    truncated: bool,
}

impl<'a> Walker<'a> {
    fn new(schema: &'a Schema, buffer: Option<(&'a [u8], DataRepresentation)>) -> Self {
        Walker {
            schema,
            buffer,
            elements: Vec::new(),
            enums: Vec::new(),
            enum_index: HashMap::new(),
            truncated: false,
        }
    }

    /// Lays out one struct instance starting at the given bit bases and
    /// returns the padded end positions `(serialized, deserialized)`.
    fn walk_struct(
        &mut self,
        index: usize,
        prefix: &str,
        serialized_base: usize,
        deserialized_base: usize,
        visiting: &mut Vec<usize>,
    ) -> Result<(usize, usize), CodecError> {
        let schema = self.schema;
        let st = &schema.structs[index];
        if visiting.contains(&index) {
            return Err(CodecError::NoClass(format!(
                "recursive reference to struct '{}'",
                st.name
            )));
        }
        visiting.push(index);

        let version = schema.language_version_of(st);
        let mut ser_cursor = serialized_base;
        let mut des_cursor = deserialized_base;
        let mut ser_high = serialized_base;
        let mut des_high = deserialized_base;
        // first leaf of each scalar sibling, for dynamic length lookups
        let mut scope: HashMap<&'a str, usize> = HashMap::new();

        for elem in &st.elements {
            let count = match &elem.array_size {
                ArraySize::Fixed(count) => *count,
                ArraySize::Dynamic(size_name) => match self.buffer {
                    None => {
                        self.truncated = true;
                        break;
                    }
                    Some((data, representation)) => {
                        self.read_count(&scope, size_name, data, representation, prefix)?
                    }
                },
            };

            let ser_start = match elem.byte_pos {
                Some(byte_pos) => serialized_base + byte_pos * 8 + elem.bit_pos as usize,
                None => ser_cursor,
            };

            match schema.type_ref(&elem.type_name) {
                None => {
                    visiting.pop();
                    return Err(CodecError::NoClass(format!(
                        "element '{}{}' references undefined type '{}'",
                        prefix, elem.name, elem.type_name
                    )));
                }
                Some(TypeRef::Complex(child)) => {
                    if elem.num_bits.is_some() {
                        visiting.pop();
                        return Err(CodecError::InvalidArg(format!(
                            "element '{}{}': numbits on a struct type",
                            prefix, elem.name
                        )));
                    }
                    if let Some((data, _)) = self.buffer {
                        if count > data.len() * 8 {
                            visiting.pop();
                            return Err(CodecError::InvalidArg(format!(
                                "element '{}{}': array length {} exceeds the buffer",
                                prefix, elem.name, count
                            )));
                        }
                    }
                    let alignment = elem
                        .alignment
                        .unwrap_or(schema.structs[child].alignment)
                        .max(1);
                    let mut ser_pos = ser_start;
                    let mut des_pos = align_up_from(des_cursor, deserialized_base, alignment * 8);
                    for i in 0..count {
                        let mut child_prefix =
                            leaf_name(prefix, &elem.name, &elem.array_size, i);
                        child_prefix.push('.');
                        let (ser_end, des_end) =
                            self.walk_struct(child, &child_prefix, ser_pos, des_pos, visiting)?;
                        ser_pos = ser_end;
                        des_pos = des_end;
                        if self.truncated {
                            break;
                        }
                    }
                    ser_cursor = ser_pos;
                    des_cursor = des_pos;
                }
                Some(primitive_or_enum) => {
                    let (value_type, enumeration) =
                        self.leaf_type(&elem.type_name, primitive_or_enum)?;
                    let type_bits = value_type.bit_size();
                    let ser_bits = elem.num_bits.unwrap_or(type_bits);
                    let alignment = elem.alignment.unwrap_or(type_bits / 8).max(1);
                    let des_start = align_up_from(des_cursor, deserialized_base, alignment * 8);
                    let constant = self.resolve_constant(elem, value_type, enumeration, prefix)?;

                    if let Some((data, representation)) = self.buffer {
                        let start = match representation {
                            DataRepresentation::Serialized => ser_start,
                            DataRepresentation::Deserialized => des_start,
                        };
                        let end = count
                            .checked_mul(type_bits)
                            .and_then(|bits| bits.checked_add(start));
                        if end.map_or(true, |end| end > data.len() * 8) {
                            visiting.pop();
                            return Err(CodecError::InvalidArg(format!(
                                "element '{}{}': array length {} exceeds the buffer",
                                prefix, elem.name, count
                            )));
                        }
                    }

                    let first_leaf = self.elements.len();
                    for i in 0..count {
                        self.elements.push(LayoutElement {
                            name: leaf_name(prefix, &elem.name, &elem.array_size, i),
                            value_type,
                            serialized: Position {
                                bit_offset: ser_start + i * type_bits,
                                bit_size: if count == 1 { ser_bits } else { type_bits },
                            },
                            deserialized: Position {
                                bit_offset: des_start + i * type_bits,
                                bit_size: type_bits,
                            },
                            byte_order: elem.byte_order,
                            constant,
                            enumeration,
                        });
                    }
                    if elem.array_size == ArraySize::Fixed(1) {
                        scope.insert(elem.name.as_str(), first_leaf);
                    }
                    ser_cursor = if count == 1 {
                        ser_start + ser_bits
                    } else {
                        ser_start + count * type_bits
                    };
                    des_cursor = des_start + count * type_bits;
                }
            }

            ser_high = ser_high.max(ser_cursor);
            des_high = des_high.max(des_cursor);
            if self.truncated {
                break;
            }
        }

        visiting.pop();

        if self.truncated {
            return Ok((ser_high, des_high));
        }

        let align_bits = st.alignment.max(1) * 8;
        let des_end = align_up_from(des_high, deserialized_base, align_bits);
        let ser_end = if version >= LanguageVersion::V3_0 {
            align_up_from(ser_high, serialized_base, align_bits)
        } else {
            ser_high
        };
        Ok((ser_end, des_end))
    }

    fn leaf_type(
        &mut self,
        type_name: &str,
        type_ref: TypeRef,
    ) -> Result<(ValueType, Option<usize>), CodecError> {
        match type_ref {
            TypeRef::Primitive(index) => {
                if let Some(value_type) = value_type_for(type_name) {
                    return Ok((value_type, None));
                }
                // user-declared primitives read as unsigned of their width
                let value_type = match self.schema.data_types[index].bit_size {
                    8 => ValueType::UInt8,
                    16 => ValueType::UInt16,
                    32 => ValueType::UInt32,
                    64 => ValueType::UInt64,
                    other => {
                        return Err(CodecError::NotSupported(format!(
                            "datatype '{type_name}' of width {other}"
                        )));
                    }
                };
                Ok((value_type, None))
            }
            TypeRef::Enumeration(index) => {
                let underlying = self.schema.enums[index].type_name.clone();
                let value_type = value_type_for(&underlying).ok_or_else(|| {
                    CodecError::InvalidType(format!(
                        "enum '{type_name}' over unknown type '{underlying}'"
                    ))
                })?;
                Ok((value_type, Some(self.enum_table(index))))
            }
            TypeRef::Complex(_) => Err(CodecError::InvalidType(format!(
                "'{type_name}' is not a scalar type"
            ))),
        }
    }

    fn enum_table(&mut self, index: usize) -> usize {
        let en = &self.schema.enums[index];
        if let Some(&table) = self.enum_index.get(&en.name) {
            return table;
        }
        self.enums.push(EnumTable {
            name: en.name.clone(),
            values: en.values.iter().map(|v| (v.name.clone(), v.value)).collect(),
        });
        let table = self.enums.len() - 1;
        self.enum_index.insert(en.name.clone(), table);
        table
    }

    fn resolve_constant(
        &self,
        elem: &StructElement,
        value_type: ValueType,
        enumeration: Option<usize>,
        prefix: &str,
    ) -> Result<Option<Value>, CodecError> {
        let Some(text) = &elem.value else {
            return Ok(None);
        };
        let text = text.trim();
        if let Some(table) = enumeration {
            if let Some(value) = self.enums[table].value_of(text) {
                return Value::Int64(value).convert_to(value_type).map(Some);
            }
        }
        if value_type.is_float() {
            let parsed: f64 = text.parse().map_err(|_| {
                CodecError::InvalidArg(format!(
                    "element '{}{}': bad constant '{}'",
                    prefix, elem.name, text
                ))
            })?;
            return Value::Float64(parsed).convert_to(value_type).map(Some);
        }
        let parsed: i64 = text.parse().map_err(|_| {
            CodecError::InvalidArg(format!(
                "element '{}{}': bad constant '{}'",
                prefix, elem.name, text
            ))
        })?;
        Value::Int64(parsed).convert_to(value_type).map(Some)
    }

    fn read_count(
        &self,
        scope: &HashMap<&str, usize>,
        size_name: &str,
        data: &[u8],
        representation: DataRepresentation,
        prefix: &str,
    ) -> Result<usize, CodecError> {
        let &leaf = scope.get(size_name).ok_or_else(|| {
            CodecError::NotFound(format!("array size element '{prefix}{size_name}'"))
        })?;
        let element = &self.elements[leaf];
        if !element.value_type.is_integer() {
            return Err(CodecError::InvalidType(format!(
                "array size element '{prefix}{size_name}' is not an integer"
            )));
        }
        let accessor = ElementAccessor::for_representation(representation);
        let value = accessor.get_value(element, data)?;
        Ok(value.as_u64() as usize)
    }
}

fn leaf_name(prefix: &str, name: &str, array_size: &ArraySize, index: usize) -> String {
    if *array_size == ArraySize::Fixed(1) {
        format!("{prefix}{name}")
    } else {
        format!("{prefix}{name}[{index}]")
    }
}

/// Rounds `cursor` up so its distance from `base` is a multiple of `align_bits`.
fn align_up_from(cursor: usize, base: usize, align_bits: usize) -> usize {
    let relative = cursor - base;
    base + relative.div_ceil(align_bits) * align_bits
}
