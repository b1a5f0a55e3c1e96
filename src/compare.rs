//! Schema comparison at configurable granularity.
//!
//! Two schemas can be compared for semantic equality with per-aspect flags,
//! for subset containment, or purely for binary layout compatibility (the
//! planned positions match even when every name differs).

use crate::errors::CodecError;
use crate::layout::plan_layout;
use crate::schema::{EnumType, Schema, StructElement, StructType, TypeRef};

/// Which aspects participate in a semantic comparison.
///
/// Layout-relevant attributes (positions, widths, array sizes, byte order,
/// alignment) always participate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompareFlags {
    /// Compare entity and element names.
    pub names: bool,
    /// Compare struct versions and language version tags.
    pub versions: bool,
    /// Compare descriptions and comments.
    pub descriptions: bool,
    /// Compare min/max/default/scale/offset decorations.
    pub visualization_attributes: bool,
    /// Compare header metadata.
    pub header: bool,
    /// Compare enum value tables.
    pub enum_values: bool,
    /// Compare derived units and element unit references.
    pub units: bool,
    /// Compare base units.
    pub base_units: bool,
    /// Compare prefixes.
    pub prefixes: bool,
    /// Containment instead of equality: every entity of the left schema must
    /// exist, equal under the other flags, in the right one.
    pub subset: bool,
    /// Follow complex element types into the referenced structs.
    pub recursive: bool,
}

impl Default for CompareFlags {
    fn default() -> Self {
        CompareFlags {
            names: true,
            versions: true,
            descriptions: true,
            visualization_attributes: true,
            header: true,
            enum_values: true,
            units: true,
            base_units: true,
            prefixes: true,
            subset: false,
            recursive: true,
        }
    }
}

impl CompareFlags {
    /// Only what determines the binary layout.
    pub fn binary_only() -> Self {
        CompareFlags {
            names: false,
            versions: false,
            descriptions: false,
            visualization_attributes: false,
            header: false,
            enum_values: false,
            units: false,
            base_units: false,
            prefixes: false,
            subset: false,
            recursive: true,
        }
    }
}

/// Compares two schemas under the given flags.
pub fn schemas_equal(left: &Schema, right: &Schema, flags: &CompareFlags) -> bool {
    if flags.header && !headers_equal(left, right, flags) {
        return false;
    }
    if flags.base_units
        && !set_equal(&left.base_units, &right.base_units, flags.subset, |e| &e.name, |a, b| a == b)
    {
        return false;
    }
    if flags.prefixes
        && !set_equal(&left.prefixes, &right.prefixes, flags.subset, |e| &e.name, |a, b| a == b)
    {
        return false;
    }
    if flags.units
        && !set_equal(&left.units, &right.units, flags.subset, |e| &e.name, |a, b| a == b)
    {
        return false;
    }

    let left_types: Vec<_> = left.data_types.iter().filter(|d| !d.predefined).collect();
    let right_types: Vec<_> = right.data_types.iter().filter(|d| !d.predefined).collect();
    if !set_equal(&left_types, &right_types, flags.subset, |e| &e.name, |a, b| {
        a.bit_size == b.bit_size
            && (!flags.descriptions || a.description == b.description)
            && (!flags.visualization_attributes
                || (a.min == b.min && a.max == b.max && a.default == b.default))
            && (!flags.units || a.unit == b.unit)
    }) {
        return false;
    }

    if !set_equal(&left.enums, &right.enums, flags.subset, |e| &e.name, |a, b| {
        enums_equal(a, b, flags)
    }) {
        return false;
    }

    set_equal(&left.structs, &right.structs, flags.subset, |e| &e.name, |a, b| {
        struct_types_equal(left, a, right, b, flags, &mut Vec::new())
    })
}

/// Compares two named structs under the given flags.
pub fn structs_equal(
    left: &Schema,
    left_name: &str,
    right: &Schema,
    right_name: &str,
    flags: &CompareFlags,
) -> Result<bool, CodecError> {
    let a = left
        .find_struct(left_name)
        .ok_or_else(|| CodecError::NotFound(format!("struct '{left_name}'")))?;
    let b = right
        .find_struct(right_name)
        .ok_or_else(|| CodecError::NotFound(format!("struct '{right_name}'")))?;
    Ok(struct_types_equal(left, a, right, b, flags, &mut Vec::new()))
}

/// Whether two roots produce the same binary layout in both representations,
/// names aside.
pub fn structs_binary_equal(
    left: &Schema,
    left_name: &str,
    right: &Schema,
    right_name: &str,
) -> Result<bool, CodecError> {
    let a = plan_layout(left, left_name)?;
    let b = plan_layout(right, right_name)?;
    if a.is_dynamic() != b.is_dynamic() {
        return Ok(false);
    }
    let a_elements = a.static_elements();
    let b_elements = b.static_elements();
    if a_elements.len() != b_elements.len() {
        return Ok(false);
    }
    Ok(a_elements.iter().zip(b_elements).all(|(x, y)| {
        x.value_type == y.value_type
            && x.serialized == y.serialized
            && x.deserialized == y.deserialized
            && x.byte_order == y.byte_order
    }))
}

/// Whether every entity of `part` exists, equal, in `whole`.
pub fn is_subset(part: &Schema, whole: &Schema) -> bool {
    let flags = CompareFlags {
        subset: true,
        header: false,
        ..Default::default()
    };
    schemas_equal(part, whole, &flags)
}

fn headers_equal(left: &Schema, right: &Schema, flags: &CompareFlags) -> bool {
    let a = &left.header;
    let b = &right.header;
    (!flags.versions || a.language_version == b.language_version)
        && a.author == b.author
        && a.date_creation == b.date_creation
        && a.date_change == b.date_change
        && (!flags.descriptions || a.description == b.description)
        && a.ext_declarations == b.ext_declarations
}

fn enums_equal(a: &EnumType, b: &EnumType, flags: &CompareFlags) -> bool {
    a.type_name == b.type_name && (!flags.enum_values || a.values == b.values)
}

fn struct_types_equal(
    left: &Schema,
    a: &StructType,
    right: &Schema,
    b: &StructType,
    flags: &CompareFlags,
    visiting: &mut Vec<(String, String)>,
) -> bool {
    if a.alignment != b.alignment || a.elements.len() != b.elements.len() {
        return false;
    }
    if flags.versions && (a.version != b.version || a.ddl_version != b.ddl_version) {
        return false;
    }
    if flags.descriptions && a.comment != b.comment {
        return false;
    }
    a.elements
        .iter()
        .zip(&b.elements)
        .all(|(x, y)| elements_equal(left, x, right, y, flags, visiting))
}

fn elements_equal(
    left: &Schema,
    a: &StructElement,
    right: &Schema,
    b: &StructElement,
    flags: &CompareFlags,
    visiting: &mut Vec<(String, String)>,
) -> bool {
    if a.byte_pos != b.byte_pos
        || a.bit_pos != b.bit_pos
        || a.num_bits != b.num_bits
        || a.array_size != b.array_size
        || a.byte_order != b.byte_order
        || a.alignment != b.alignment
        || a.value != b.value
    {
        return false;
    }
    if flags.names && a.name != b.name {
        return false;
    }
    if flags.descriptions && a.description != b.description {
        return false;
    }
    if flags.visualization_attributes
        && (a.min != b.min
            || a.max != b.max
            || a.default != b.default
            || a.scale != b.scale
            || a.offset != b.offset)
    {
        return false;
    }
    if flags.units && a.unit != b.unit {
        return false;
    }

    match (left.type_ref(&a.type_name), right.type_ref(&b.type_name)) {
        (Some(TypeRef::Complex(x)), Some(TypeRef::Complex(y))) => {
            if !flags.recursive {
                return !flags.names || a.type_name == b.type_name;
            }
            let pair = (a.type_name.clone(), b.type_name.clone());
            if visiting.contains(&pair) {
                return true;
            }
            visiting.push(pair);
            let equal = struct_types_equal(
                left,
                &left.structs[x],
                right,
                &right.structs[y],
                flags,
                visiting,
            );
            visiting.pop();
            equal
        }
        _ => {
            if flags.names {
                a.type_name == b.type_name
            } else {
                // without names, primitive types still have to agree in kind
                left.type_ref(&a.type_name).map(|v| std::mem::discriminant(&v))
                    == right.type_ref(&b.type_name).map(|v| std::mem::discriminant(&v))
            }
        }
    }
}

fn set_equal<T>(
    left: &[T],
    right: &[T],
    subset: bool,
    name_of: impl Fn(&T) -> &str,
    equal: impl FnMut(&T, &T) -> bool,
) -> bool {
    let mut equal = equal;
    if !subset && left.len() != right.len() {
        return false;
    }
    left.iter().all(|a| {
        right
            .iter()
            .find(|b| name_of(b) == name_of(a))
            .is_some_and(|b| equal(a, b))
    })
}
