//! Structural validation of a schema.
//!
//! Produces the full list of diagnostics instead of stopping at the first
//! problem. Unresolved type references are reported with their own kind so a
//! partial schema can be told apart from a broken one.

use std::collections::{HashMap, HashSet};

use crate::errors::{Diagnostic, DiagnosticKind};
use crate::layout;
use crate::schema::{ArraySize, Schema, StructType, TypeRef, value_type_for};

/// Runs every check and returns the collected diagnostics.
pub(crate) fn run(schema: &Schema) -> Vec<Diagnostic> {
    let mut diags = Vec::new();

    check_duplicate_names(schema, &mut diags);
    check_data_types(schema, &mut diags);
    check_enums(schema, &mut diags);
    check_units(schema, &mut diags);
    check_streams(schema, &mut diags);

    for st in &schema.structs {
        check_struct(schema, st, &mut diags);
    }
    let before = diags.len();
    check_recursion(schema, &mut diags);
    let recursive = diags.len() > before;
    let unresolved = diags
        .iter()
        .any(|d| d.kind == DiagnosticKind::UnresolvedReference);

    // Overlap detection rides on the layout planner and only makes sense once
    // every referenced type resolves and no struct recurses.
    if !recursive && !unresolved {
        for st in &schema.structs {
            check_overlap(schema, st, &mut diags);
        }
    }

    diags
}

fn check_duplicate_names(schema: &Schema, diags: &mut Vec<Diagnostic>) {
    fn dups<'a>(names: impl Iterator<Item = &'a str>, kind: &str, diags: &mut Vec<Diagnostic>) {
        let mut seen = HashSet::new();
        for name in names {
            if !seen.insert(name) {
                diags.push(Diagnostic::error(None, format!("duplicate {kind} '{name}'")));
            }
        }
    }

    dups(schema.base_units.iter().map(|e| e.name.as_str()), "base unit", diags);
    dups(schema.prefixes.iter().map(|e| e.name.as_str()), "prefix", diags);
    dups(schema.units.iter().map(|e| e.name.as_str()), "unit", diags);
    dups(schema.streams.iter().map(|e| e.name.as_str()), "stream", diags);

    // data types, enums and structs share one type namespace
    let mut seen = HashSet::new();
    for name in schema
        .data_types
        .iter()
        .map(|e| e.name.as_str())
        .chain(schema.enums.iter().map(|e| e.name.as_str()))
        .chain(schema.structs.iter().map(|e| e.name.as_str()))
    {
        if !seen.insert(name) {
            diags.push(Diagnostic::error(None, format!("duplicate type '{name}'")));
        }
    }
}

fn check_data_types(schema: &Schema, diags: &mut Vec<Diagnostic>) {
    for dt in &schema.data_types {
        if !matches!(dt.bit_size, 8 | 16 | 32 | 64) {
            diags.push(Diagnostic::error(
                None,
                format!("datatype '{}': width {} outside {{8,16,32,64}}", dt.name, dt.bit_size),
            ));
        }
        if let (Some(min), Some(max)) = (dt.min, dt.max) {
            if min > max {
                diags.push(Diagnostic::error(
                    None,
                    format!("datatype '{}': min {} above max {}", dt.name, min, max),
                ));
            }
        }
        if let Some(default) = dt.default {
            if dt.min.is_some_and(|min| default < min) || dt.max.is_some_and(|max| default > max) {
                diags.push(Diagnostic::error(
                    None,
                    format!("datatype '{}': default {} outside min/max", dt.name, default),
                ));
            }
        }
    }
}

fn check_enums(schema: &Schema, diags: &mut Vec<Diagnostic>) {
    for en in &schema.enums {
        match value_type_for(&en.type_name) {
            Some(vt) if vt.is_integer() => {}
            Some(_) => diags.push(Diagnostic::error(
                None,
                format!("enum '{}': type '{}' is not an integer", en.name, en.type_name),
            )),
            None => diags.push(Diagnostic::error(
                None,
                format!("enum '{}': unknown type '{}'", en.name, en.type_name),
            )),
        }
        let mut seen = HashSet::new();
        for value in &en.values {
            if !seen.insert(value.name.as_str()) {
                diags.push(Diagnostic::error(
                    None,
                    format!("enum '{}': duplicate element '{}'", en.name, value.name),
                ));
            }
        }
    }
}

fn check_units(schema: &Schema, diags: &mut Vec<Diagnostic>) {
    for unit in &schema.units {
        for ref_unit in &unit.ref_units {
            let target_is_base = schema.find_base_unit(&ref_unit.unit).is_some();
            let target_is_unit = schema.find_unit(&ref_unit.unit).is_some();
            if !target_is_base && !target_is_unit {
                diags.push(Diagnostic::error(
                    None,
                    format!("unit '{}': unknown referenced unit '{}'", unit.name, ref_unit.unit),
                ));
            }
            if !ref_unit.prefix.is_empty() && schema.find_prefix(&ref_unit.prefix).is_none() {
                diags.push(Diagnostic::error(
                    None,
                    format!("unit '{}': unknown prefix '{}'", unit.name, ref_unit.prefix),
                ));
            }
        }
    }
    // derived units must not form cycles
    for unit in &schema.units {
        let mut trail = vec![unit.name.as_str()];
        if unit_cycles(schema, &unit.name, &mut trail) {
            diags.push(Diagnostic::error(
                None,
                format!("unit '{}': recursive definition", unit.name),
            ));
        }
    }
}

fn unit_cycles<'a>(schema: &'a Schema, name: &str, trail: &mut Vec<&'a str>) -> bool {
    let Some(unit) = schema.find_unit(name) else {
        return false;
    };
    for ref_unit in &unit.ref_units {
        if trail.contains(&ref_unit.unit.as_str()) {
            return true;
        }
        trail.push(ref_unit.unit.as_str());
        if unit_cycles(schema, &ref_unit.unit, trail) {
            return true;
        }
        trail.pop();
    }
    false
}

fn check_streams(schema: &Schema, diags: &mut Vec<Diagnostic>) {
    for stream in &schema.streams {
        if schema.find_struct(&stream.stream_type).is_none() {
            diags.push(Diagnostic::error(
                None,
                format!("stream '{}': unknown root type '{}'", stream.name, stream.stream_type),
            ));
        }
        for member in &stream.structs {
            if schema.find_struct(&member.type_name).is_none() {
                diags.push(Diagnostic::error(
                    None,
                    format!("stream '{}': unknown struct type '{}'", stream.name, member.type_name),
                ));
            }
        }
    }
}

fn check_struct(schema: &Schema, st: &StructType, diags: &mut Vec<Diagnostic>) {
    if !st.alignment.is_power_of_two() {
        diags.push(Diagnostic::error(
            None,
            format!("struct '{}': alignment {} is not a power of two", st.name, st.alignment),
        ));
    }

    let mut seen = HashSet::new();
    let mut declared: HashMap<&str, usize> = HashMap::new();

    for (i, elem) in st.elements.iter().enumerate() {
        let place = format!("{}.{}", st.name, elem.name);
        if !seen.insert(elem.name.as_str()) {
            diags.push(Diagnostic::error(
                None,
                format!("struct '{}': duplicate element '{}'", st.name, elem.name),
            ));
        }

        let type_ref = schema.type_ref(&elem.type_name);
        if type_ref.is_none() {
            diags.push(Diagnostic::unresolved(
                None,
                format!("element '{place}': undefined type '{}'", elem.type_name),
            ));
        }

        if let Some(alignment) = elem.alignment {
            if !alignment.is_power_of_two() {
                diags.push(Diagnostic::error(
                    None,
                    format!("element '{place}': alignment {alignment} is not a power of two"),
                ));
            }
        }

        if let Some(num_bits) = elem.num_bits {
            let integer_width = match type_ref {
                Some(TypeRef::Primitive(_)) => value_type_for(&elem.type_name)
                    .filter(|vt| vt.is_integer())
                    .map(|vt| vt.bit_size()),
                Some(TypeRef::Enumeration(idx)) => {
                    value_type_for(&schema.enums[idx].type_name).map(|vt| vt.bit_size())
                }
                _ => None,
            };
            match integer_width {
                None => diags.push(Diagnostic::error(
                    None,
                    format!("element '{place}': numbits on a non-integer type"),
                )),
                Some(width) if num_bits == 0 || num_bits > width => {
                    diags.push(Diagnostic::error(
                        None,
                        format!("element '{place}': numbits {num_bits} outside 1..={width}"),
                    ));
                }
                Some(_) => {}
            }
            if elem.array_size != ArraySize::Fixed(1) {
                diags.push(Diagnostic::error(
                    None,
                    format!("element '{place}': numbits cannot be combined with an array"),
                ));
            }
        }

        if let ArraySize::Dynamic(size_name) = &elem.array_size {
            match declared.get(size_name.as_str()) {
                None => diags.push(Diagnostic::error(
                    None,
                    format!(
                        "element '{place}': array size '{size_name}' is not declared before it"
                    ),
                )),
                Some(&sibling) => {
                    let sibling = &st.elements[sibling];
                    let integer = match schema.type_ref(&sibling.type_name) {
                        Some(TypeRef::Primitive(_)) => value_type_for(&sibling.type_name)
                            .is_some_and(|vt| vt.is_integer()),
                        _ => false,
                    };
                    if !integer {
                        diags.push(Diagnostic::error(
                            None,
                            format!(
                                "element '{place}': array size '{size_name}' is not an integer primitive"
                            ),
                        ));
                    }
                    if sibling.array_size != ArraySize::Fixed(1) {
                        diags.push(Diagnostic::error(
                            None,
                            format!("element '{place}': array size '{size_name}' is itself an array"),
                        ));
                    }
                }
            }
        }

        if let (Some(min), Some(max)) = (elem.min, elem.max) {
            if min > max {
                diags.push(Diagnostic::error(
                    None,
                    format!("element '{place}': min {min} above max {max}"),
                ));
            }
        }
        if let Some(default) = elem.default {
            if elem.min.is_some_and(|min| default < min)
                || elem.max.is_some_and(|max| default > max)
            {
                diags.push(Diagnostic::error(
                    None,
                    format!("element '{place}': default {default} outside min/max"),
                ));
            }
        }

        declared.insert(elem.name.as_str(), i);
    }
}

fn check_recursion(schema: &Schema, diags: &mut Vec<Diagnostic>) {
    for (i, st) in schema.structs.iter().enumerate() {
        let mut visiting = vec![i];
        if struct_recurses(schema, i, &mut visiting) {
            diags.push(Diagnostic::error(
                None,
                format!("struct '{}': recursive type reference", st.name),
            ));
        }
    }
}

fn struct_recurses(schema: &Schema, index: usize, visiting: &mut Vec<usize>) -> bool {
    for elem in &schema.structs[index].elements {
        if let Some(TypeRef::Complex(child)) = schema.type_ref(&elem.type_name) {
            if visiting.contains(&child) {
                return true;
            }
            visiting.push(child);
            if struct_recurses(schema, child, visiting) {
                return true;
            }
            visiting.pop();
        }
    }
    false
}

fn check_overlap(schema: &Schema, st: &StructType, diags: &mut Vec<Diagnostic>) {
    let Ok(plan) = layout::plan_layout(schema, &st.name) else {
        return;
    };
    let elements = plan.static_elements();
    for (i, a) in elements.iter().enumerate() {
        for b in &elements[i + 1..] {
            if a.constant.is_some() || b.constant.is_some() {
                continue;
            }
            let a_end = a.serialized.bit_offset + a.serialized.bit_size;
            let b_end = b.serialized.bit_offset + b.serialized.bit_size;
            if a.serialized.bit_offset < b_end && b.serialized.bit_offset < a_end {
                diags.push(Diagnostic::error(
                    None,
                    format!(
                        "struct '{}': elements '{}' and '{}' overlap in the serialized layout",
                        st.name, a.name, b.name
                    ),
                ));
            }
        }
    }
}
