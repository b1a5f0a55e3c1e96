//! In-memory model of a DDL schema document.
//!
//! A [`Schema`] owns every entity by value in flat vectors and resolves
//! references through name-to-index maps, so cloning a schema always yields a
//! fully independent graph. Mutating entry points reindex before returning.

use std::collections::HashMap;

use crate::bits::ByteOrder;
use crate::errors::{CodecError, Diagnostic, DiagnosticKind, SchemaError};
use crate::value::ValueType;
use crate::{validate, xml};

/// DDL language version tag carried by headers and structs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LanguageVersion {
    V1_0,
    #[default]
    V2_0,
    V3_0,
    V4_0,
}

impl LanguageVersion {
    /// Parses the version spellings found in the wild (`1.0+`, `1.02`, `2.0`,
    /// `2.0.0`, `3.0`, `3.00`, `4.0`, `4.00`).
    pub fn parse(text: &str) -> Option<LanguageVersion> {
        let text = text.trim();
        match text {
            "1.0+" | "1.0" | "1.02" | "1.02+" => Some(LanguageVersion::V1_0),
            "2.0" | "2.00" | "2.0.0" => Some(LanguageVersion::V2_0),
            "3.0" | "3.00" => Some(LanguageVersion::V3_0),
            "4.0" | "4.00" => Some(LanguageVersion::V4_0),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LanguageVersion::V1_0 => "1.0+",
            LanguageVersion::V2_0 => "2.0",
            LanguageVersion::V3_0 => "3.0",
            LanguageVersion::V4_0 => "4.0",
        }
    }
}

/// Schema metadata from the `<header>` section.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Header {
    pub language_version: LanguageVersion,
    pub author: String,
    pub date_creation: String,
    pub date_change: String,
    pub description: String,
    pub ext_declarations: Vec<ExtDeclaration>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtDeclaration {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BaseUnit {
    pub name: String,
    pub symbol: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnitPrefix {
    pub name: String,
    pub symbol: String,
    pub power: i32,
}

/// Reference from a derived unit to a base unit with prefix and power.
#[derive(Debug, Clone, PartialEq)]
pub struct RefUnit {
    pub unit: String,
    pub prefix: String,
    pub power: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    pub name: String,
    pub numerator: String,
    pub denominator: String,
    pub offset: String,
    pub ref_units: Vec<RefUnit>,
}

/// A primitive data type.
#[derive(Debug, Clone, PartialEq)]
pub struct DataType {
    pub name: String,
    pub bit_size: usize,
    pub description: Option<String>,
    pub unit: Option<String>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub default: Option<f64>,
    /// Seeded by the library rather than declared by the document.
    pub predefined: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    pub name: String,
    pub value: i64,
}

/// An enumeration over an integer primitive type.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumType {
    pub name: String,
    pub type_name: String,
    pub values: Vec<EnumValue>,
}

impl EnumType {
    pub fn value_of(&self, name: &str) -> Option<i64> {
        self.values.iter().find(|v| v.name == name).map(|v| v.value)
    }

    pub fn name_of(&self, value: i64) -> Option<&str> {
        self.values
            .iter()
            .find(|v| v.value == value)
            .map(|v| v.name.as_str())
    }
}

/// Array size of a struct element: a literal count or the name of a sibling
/// element holding the count at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArraySize {
    Fixed(usize),
    Dynamic(String),
}

impl Default for ArraySize {
    fn default() -> Self {
        ArraySize::Fixed(1)
    }
}

/// One named field of a struct.
#[derive(Debug, Clone, PartialEq)]
pub struct StructElement {
    pub name: String,
    pub type_name: String,
    /// Byte position in the serialized representation; `None` packs the
    /// element tightly after its predecessor's last bit.
    pub byte_pos: Option<usize>,
    /// Bit position within the start byte, 0 (LSB) to 7 (MSB).
    pub bit_pos: u8,
    /// Serialized width override for integer elements.
    pub num_bits: Option<usize>,
    pub array_size: ArraySize,
    pub byte_order: ByteOrder,
    /// Alignment in the deserialized representation; defaults to the type's
    /// natural alignment.
    pub alignment: Option<usize>,
    pub unit: Option<String>,
    pub description: Option<String>,
    /// Constant overlay value; an enum symbol for enum-typed elements.
    pub value: Option<String>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub default: Option<f64>,
    pub scale: Option<f64>,
    pub offset: Option<f64>,
}

impl StructElement {
    /// A plain element of the given type: tightly packed, little-endian,
    /// scalar. The usual starting point for programmatic schema building.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        StructElement {
            name: name.into(),
            type_name: type_name.into(),
            byte_pos: None,
            bit_pos: 0,
            num_bits: None,
            array_size: ArraySize::default(),
            byte_order: ByteOrder::default(),
            alignment: None,
            unit: None,
            description: None,
            value: None,
            min: None,
            max: None,
            default: None,
            scale: None,
            offset: None,
        }
    }
}

/// A composite type.
#[derive(Debug, Clone, PartialEq)]
pub struct StructType {
    pub name: String,
    /// Struct revision carried by the `version` attribute.
    pub version: u32,
    pub alignment: usize,
    /// Language version override from the `ddlversion` attribute.
    pub ddl_version: Option<LanguageVersion>,
    pub comment: Option<String>,
    pub elements: Vec<StructElement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamStruct {
    pub name: Option<String>,
    pub type_name: String,
    pub byte_pos: usize,
}

/// A top-level data channel bound to a root type.
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    pub name: String,
    pub stream_type: String,
    pub description: Option<String>,
    pub structs: Vec<StreamStruct>,
}

/// Stream meta type declaration (language version 4.0).
#[derive(Debug, Clone, PartialEq)]
pub struct StreamMetaType {
    pub name: String,
    pub version: String,
    pub parent: Option<String>,
    pub properties: Vec<(String, String)>,
}

/// Resolved kind and index of a named type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeRef {
    Primitive(usize),
    Enumeration(usize),
    Complex(usize),
}

/// Primitive types every schema starts with, as `(name, bit width)`.
const PREDEFINED_TYPES: &[(&str, usize)] = &[
    ("tBool", 8),
    ("tChar", 8),
    ("tInt8", 8),
    ("tUInt8", 8),
    ("tInt16", 16),
    ("tUInt16", 16),
    ("tInt32", 32),
    ("tUInt32", 32),
    ("tInt64", 64),
    ("tUInt64", 64),
    ("tFloat32", 32),
    ("tFloat64", 64),
    // language version 4.0 spellings
    ("bool", 8),
    ("char", 8),
    ("int8", 8),
    ("uint8", 8),
    ("int16", 16),
    ("uint16", 16),
    ("int32", 32),
    ("uint32", 32),
    ("int64", 64),
    ("uint64", 64),
    ("float", 32),
    ("double", 64),
];

/// Maps a primitive type name to its scalar value type.
pub fn value_type_for(name: &str) -> Option<ValueType> {
    match name {
        "tBool" | "bool" => Some(ValueType::Bool),
        "tChar" | "char" | "tInt8" | "int8" => Some(ValueType::Int8),
        "tUInt8" | "uint8" => Some(ValueType::UInt8),
        "tInt16" | "int16" => Some(ValueType::Int16),
        "tUInt16" | "uint16" => Some(ValueType::UInt16),
        "tInt32" | "int32" => Some(ValueType::Int32),
        "tUInt32" | "uint32" => Some(ValueType::UInt32),
        "tInt64" | "int64" => Some(ValueType::Int64),
        "tUInt64" | "uint64" => Some(ValueType::UInt64),
        "tFloat32" | "float" => Some(ValueType::Float32),
        "tFloat64" | "double" => Some(ValueType::Float64),
        _ => None,
    }
}

/// A complete DDL schema.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub header: Header,
    pub base_units: Vec<BaseUnit>,
    pub prefixes: Vec<UnitPrefix>,
    pub units: Vec<Unit>,
    pub data_types: Vec<DataType>,
    pub enums: Vec<EnumType>,
    pub structs: Vec<StructType>,
    pub streams: Vec<Stream>,
    pub stream_meta_types: Vec<StreamMetaType>,
    valid: bool,
    type_index: HashMap<String, TypeRef>,
    unit_index: HashMap<String, usize>,
    stream_index: HashMap<String, usize>,
}

impl Schema {
    /// An empty schema seeded with the predefined primitive types.
    pub fn new() -> Self {
        let mut schema = Schema {
            valid: true,
            ..Default::default()
        };
        for &(name, bit_size) in PREDEFINED_TYPES {
            schema.data_types.push(DataType {
                name: name.to_string(),
                bit_size,
                description: None,
                unit: None,
                min: None,
                max: None,
                default: None,
                predefined: true,
            });
        }
        schema.reindex();
        schema
    }

    /// Parses a DDL document. Every diagnostic is collected; any diagnostic,
    /// including unresolved type references, fails the parse.
    pub fn parse(text: &str) -> Result<Schema, SchemaError> {
        let mut schema = xml::parse_document(text)?;
        let diagnostics = validate::run(&schema);
        if !diagnostics.is_empty() {
            return Err(SchemaError::new(diagnostics));
        }
        schema.valid = true;
        Ok(schema)
    }

    /// Parses a partial DDL document whose type references may point into a
    /// base schema loaded elsewhere.
    ///
    /// Hard errors still fail. A schema with only unresolved references is
    /// returned but marked invalid; [`Schema::complete_with`] resolves it.
    pub fn parse_partial(text: &str) -> Result<Schema, SchemaError> {
        let mut schema = xml::parse_document(text)?;
        let diagnostics = validate::run(&schema);
        let hard: Vec<Diagnostic> = diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::Error)
            .cloned()
            .collect();
        if !hard.is_empty() {
            return Err(SchemaError::new(hard));
        }
        schema.valid = diagnostics.is_empty();
        Ok(schema)
    }

    /// Copies the definitions this partial schema is missing out of `base`
    /// and revalidates. On success the schema becomes valid.
    pub fn complete_with(&mut self, base: &Schema) -> Result<(), SchemaError> {
        let mut wanted: Vec<String> = Vec::new();
        for st in &self.structs {
            for elem in &st.elements {
                if self.type_ref(&elem.type_name).is_none() {
                    wanted.push(elem.type_name.clone());
                }
            }
        }
        for name in wanted {
            self.copy_type_from(base, &name);
        }
        self.reindex();
        let diagnostics = validate::run(self);
        if !diagnostics.is_empty() {
            return Err(SchemaError::new(diagnostics));
        }
        self.valid = true;
        Ok(())
    }

    fn copy_type_from(&mut self, base: &Schema, name: &str) {
        if self.type_ref(name).is_some() {
            return;
        }
        match base.type_ref(name) {
            Some(TypeRef::Primitive(i)) => {
                self.data_types.push(base.data_types[i].clone());
                self.reindex();
            }
            Some(TypeRef::Enumeration(i)) => {
                let e = base.enums[i].clone();
                let underlying = e.type_name.clone();
                self.enums.push(e);
                self.reindex();
                self.copy_type_from(base, &underlying);
            }
            Some(TypeRef::Complex(i)) => {
                let st = base.structs[i].clone();
                let referenced: Vec<String> =
                    st.elements.iter().map(|e| e.type_name.clone()).collect();
                self.structs.push(st);
                self.reindex();
                for type_name in referenced {
                    self.copy_type_from(base, &type_name);
                }
            }
            None => {}
        }
    }

    /// Merges `other` into `self`. Identical definitions are skipped; a
    /// conflicting definition fails unless `overwrite` is set.
    pub fn merge(&mut self, other: &Schema, overwrite: bool) -> Result<(), CodecError> {
        fn merge_kind<T: Clone + PartialEq>(
            kind: &str,
            own: &mut Vec<T>,
            incoming: &[T],
            name_of: impl Fn(&T) -> &str,
            overwrite: bool,
        ) -> Result<(), CodecError> {
            for item in incoming {
                match own.iter().position(|e| name_of(e) == name_of(item)) {
                    Some(i) if own[i] == *item => {}
                    Some(i) if overwrite => own[i] = item.clone(),
                    Some(_) => {
                        return Err(CodecError::Failed(format!(
                            "conflicting {} '{}' while merging",
                            kind,
                            name_of(item)
                        )));
                    }
                    None => own.push(item.clone()),
                }
            }
            Ok(())
        }

        merge_kind("base unit", &mut self.base_units, &other.base_units, |e| &e.name, overwrite)?;
        merge_kind("prefix", &mut self.prefixes, &other.prefixes, |e| &e.name, overwrite)?;
        merge_kind("unit", &mut self.units, &other.units, |e| &e.name, overwrite)?;
        merge_kind(
            "datatype",
            &mut self.data_types,
            &other
                .data_types
                .iter()
                .filter(|d| !d.predefined)
                .cloned()
                .collect::<Vec<_>>(),
            |e| &e.name,
            overwrite,
        )?;
        merge_kind("enum", &mut self.enums, &other.enums, |e| &e.name, overwrite)?;
        merge_kind("struct", &mut self.structs, &other.structs, |e| &e.name, overwrite)?;
        merge_kind("stream", &mut self.streams, &other.streams, |e| &e.name, overwrite)?;
        merge_kind(
            "streammetatype",
            &mut self.stream_meta_types,
            &other.stream_meta_types,
            |e| &e.name,
            overwrite,
        )?;
        for decl in &other.header.ext_declarations {
            if !self
                .header
                .ext_declarations
                .iter()
                .any(|d| d.key == decl.key)
            {
                self.header.ext_declarations.push(decl.clone());
            }
        }
        self.reindex();
        Ok(())
    }

    /// Rebuilds the name-to-index maps. Call after mutating entity vectors.
    pub fn reindex(&mut self) {
        self.type_index.clear();
        for (i, dt) in self.data_types.iter().enumerate() {
            self.type_index.insert(dt.name.clone(), TypeRef::Primitive(i));
        }
        for (i, en) in self.enums.iter().enumerate() {
            self.type_index
                .insert(en.name.clone(), TypeRef::Enumeration(i));
        }
        for (i, st) in self.structs.iter().enumerate() {
            self.type_index.insert(st.name.clone(), TypeRef::Complex(i));
        }
        self.unit_index.clear();
        for (i, unit) in self.units.iter().enumerate() {
            self.unit_index.insert(unit.name.clone(), i);
        }
        self.stream_index.clear();
        for (i, stream) in self.streams.iter().enumerate() {
            self.stream_index.insert(stream.name.clone(), i);
        }
    }

    /// Whether all type references are resolved. Partial schemas start out
    /// invalid until completed against a base.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn type_ref(&self, name: &str) -> Option<TypeRef> {
        self.type_index.get(name).copied()
    }

    pub fn find_data_type(&self, name: &str) -> Option<&DataType> {
        match self.type_ref(name)? {
            TypeRef::Primitive(i) => Some(&self.data_types[i]),
            _ => None,
        }
    }

    pub fn find_enum(&self, name: &str) -> Option<&EnumType> {
        match self.type_ref(name)? {
            TypeRef::Enumeration(i) => Some(&self.enums[i]),
            _ => None,
        }
    }

    pub fn find_struct(&self, name: &str) -> Option<&StructType> {
        match self.type_ref(name)? {
            TypeRef::Complex(i) => Some(&self.structs[i]),
            _ => None,
        }
    }

    pub(crate) fn struct_position(&self, name: &str) -> Option<usize> {
        match self.type_ref(name)? {
            TypeRef::Complex(i) => Some(i),
            _ => None,
        }
    }

    pub fn find_unit(&self, name: &str) -> Option<&Unit> {
        self.unit_index.get(name).map(|&i| &self.units[i])
    }

    pub fn find_base_unit(&self, name: &str) -> Option<&BaseUnit> {
        self.base_units.iter().find(|b| b.name == name)
    }

    pub fn find_prefix(&self, name: &str) -> Option<&UnitPrefix> {
        self.prefixes.iter().find(|p| p.name == name)
    }

    pub fn find_stream(&self, name: &str) -> Option<&Stream> {
        self.stream_index.get(name).map(|&i| &self.streams[i])
    }

    /// The effective language version of a struct: its own tag, else the
    /// document header's.
    pub fn language_version_of(&self, st: &StructType) -> LanguageVersion {
        st.ddl_version.unwrap_or(self.header.language_version)
    }

    /// Runs structural validation and returns the collected diagnostics.
    pub fn validate(&self) -> Vec<Diagnostic> {
        validate::run(self)
    }

    /// Renders the schema as a DDL document. Predefined primitives are not
    /// emitted.
    pub fn to_xml(&self) -> String {
        xml::write_document(self)
    }
}
