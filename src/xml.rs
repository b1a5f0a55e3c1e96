//! Parsing and emission of DDL XML documents.
//!
//! The reader accepts a full `<adtf:ddl>`/`<ddl>` document as well as the
//! bare `<structs>` and `<struct>` fragments the codec tests feed it. Every
//! problem is collected as a located diagnostic; parsing does not stop at the
//! first bad attribute.

use std::str::FromStr;

use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};

use crate::bits::ByteOrder;
use crate::errors::{Diagnostic, SchemaError};
use crate::schema::{
    ArraySize, BaseUnit, DataType, EnumType, EnumValue, ExtDeclaration, LanguageVersion, RefUnit,
    Schema, Stream, StreamMetaType, StreamStruct, StructElement, StructType, Unit, UnitPrefix,
};

/// One element of the raw document tree.
#[derive(Debug, Clone, Default)]
struct Node {
    tag: String,
    attrs: Vec<(String, String)>,
    children: Vec<Node>,
    text: String,
    /// Byte offset of the opening tag in the document.
    pos: usize,
}

impl Node {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

fn local_name(name: &str) -> &str {
    match name.rfind(':') {
        Some(i) => &name[i + 1..],
        None => name,
    }
}

fn node_from(start: &BytesStart<'_>, pos: usize) -> Node {
    let tag = local_name(&String::from_utf8_lossy(start.name().as_ref())).to_string();
    let mut attrs = Vec::new();
    for attr in start.attributes().with_checks(false).flatten() {
        let key = local_name(&String::from_utf8_lossy(attr.key.as_ref())).to_string();
        let value = attr
            .unescape_value()
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
        attrs.push((key, value));
    }
    Node {
        tag,
        attrs,
        pos,
        ..Default::default()
    }
}

fn read_tree(text: &str) -> Result<Node, Diagnostic> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Node> = Vec::new();
    let mut root: Option<Node> = None;
    loop {
        let pos = reader.buffer_position() as usize;
        match reader.read_event() {
            Ok(Event::Start(e)) => stack.push(node_from(&e, pos)),
            Ok(Event::Empty(e)) => {
                let node = node_from(&e, pos);
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None if root.is_none() => root = Some(node),
                    None => {
                        return Err(Diagnostic::error(Some(pos), "multiple root elements"));
                    }
                }
            }
            Ok(Event::End(_)) => {
                let node = match stack.pop() {
                    Some(node) => node,
                    None => {
                        return Err(Diagnostic::error(Some(pos), "unmatched closing tag"));
                    }
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None if root.is_none() => root = Some(node),
                    None => {
                        return Err(Diagnostic::error(Some(pos), "multiple root elements"));
                    }
                }
            }
            Ok(Event::Text(t)) => {
                if let Some(parent) = stack.last_mut() {
                    match t.unescape() {
                        Ok(text) => parent.text.push_str(&text),
                        Err(_) => parent.text.push_str(&String::from_utf8_lossy(&t)),
                    }
                }
            }
            Ok(Event::CData(t)) => {
                if let Some(parent) = stack.last_mut() {
                    parent.text.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                return Err(Diagnostic::error(Some(pos), format!("malformed XML: {err}")));
            }
        }
    }
    if !stack.is_empty() {
        return Err(Diagnostic::error(None, "unexpected end of document"));
    }
    root.ok_or_else(|| Diagnostic::error(None, "empty document"))
}

/// Parses a DDL document into a schema. All structural diagnostics are
/// collected and returned together.
pub(crate) fn parse_document(text: &str) -> Result<Schema, SchemaError> {
    let root = read_tree(text).map_err(|d| SchemaError::new(vec![d]))?;

    let mut schema = Schema::new();
    let mut diags: Vec<Diagnostic> = Vec::new();

    match root.tag.as_str() {
        "ddl" => {
            for section in &root.children {
                parse_section(section, &mut schema, &mut diags);
            }
        }
        "structs" => {
            for child in &root.children {
                parse_struct_list_entry(child, &mut schema, &mut diags);
            }
        }
        "struct" => {
            if let Some(st) = parse_struct(&root, &mut diags) {
                schema.structs.push(st);
            }
        }
        other => {
            diags.push(Diagnostic::error(
                Some(root.pos),
                format!("unrecognized root element '{other}'"),
            ));
        }
    }

    if !diags.is_empty() {
        return Err(SchemaError::new(diags));
    }
    schema.reindex();
    Ok(schema)
}

fn parse_section(node: &Node, schema: &mut Schema, diags: &mut Vec<Diagnostic>) {
    match node.tag.as_str() {
        "header" => parse_header(node, schema, diags),
        "units" => parse_units(node, schema, diags),
        "datatypes" => {
            for child in &node.children {
                if child.tag == "datatype" {
                    if let Some(dt) = parse_datatype(child, diags) {
                        // a declaration may restate a predefined type
                        if !schema.data_types.iter().any(|d| d.name == dt.name) {
                            schema.data_types.push(dt);
                        }
                    }
                } else {
                    unexpected(child, "datatypes", diags);
                }
            }
        }
        "enums" => {
            for child in &node.children {
                if child.tag == "enum" {
                    if let Some(en) = parse_enum(child, diags) {
                        schema.enums.push(en);
                    }
                } else {
                    unexpected(child, "enums", diags);
                }
            }
        }
        "structs" => {
            for child in &node.children {
                parse_struct_list_entry(child, schema, diags);
            }
        }
        "streams" => {
            for child in &node.children {
                if child.tag == "stream" {
                    if let Some(stream) = parse_stream(child, diags) {
                        schema.streams.push(stream);
                    }
                } else {
                    unexpected(child, "streams", diags);
                }
            }
        }
        "streammetatypes" => {
            for child in &node.children {
                if child.tag == "streammetatype" {
                    if let Some(meta) = parse_stream_meta_type(child, diags) {
                        schema.stream_meta_types.push(meta);
                    }
                } else {
                    unexpected(child, "streammetatypes", diags);
                }
            }
        }
        other => {
            diags.push(Diagnostic::error(
                Some(node.pos),
                format!("unrecognized section '{other}'"),
            ));
        }
    }
}

fn parse_struct_list_entry(node: &Node, schema: &mut Schema, diags: &mut Vec<Diagnostic>) {
    if node.tag == "struct" {
        if let Some(st) = parse_struct(node, diags) {
            schema.structs.push(st);
        }
    } else {
        unexpected(node, "structs", diags);
    }
}

fn unexpected(node: &Node, section: &str, diags: &mut Vec<Diagnostic>) {
    diags.push(Diagnostic::error(
        Some(node.pos),
        format!("unrecognized element '{}' in <{}>", node.tag, section),
    ));
}

fn parse_header(node: &Node, schema: &mut Schema, diags: &mut Vec<Diagnostic>) {
    for child in &node.children {
        match child.tag.as_str() {
            "language_version" => match LanguageVersion::parse(&child.text) {
                Some(version) => schema.header.language_version = version,
                None => diags.push(Diagnostic::error(
                    Some(child.pos),
                    format!("unknown language version '{}'", child.text.trim()),
                )),
            },
            "author" => schema.header.author = child.text.trim().to_string(),
            "date_creation" => schema.header.date_creation = child.text.trim().to_string(),
            "date_change" => schema.header.date_change = child.text.trim().to_string(),
            "description" => schema.header.description = child.text.trim().to_string(),
            "ext_declaration" => {
                let key = child.attr("key").unwrap_or_default().to_string();
                let value = child.attr("value").unwrap_or_default().to_string();
                if key.is_empty() {
                    diags.push(Diagnostic::error(
                        Some(child.pos),
                        "ext_declaration without key",
                    ));
                } else {
                    schema.header.ext_declarations.push(ExtDeclaration { key, value });
                }
            }
            _ => unexpected(child, "header", diags),
        }
    }
}

fn parse_units(node: &Node, schema: &mut Schema, diags: &mut Vec<Diagnostic>) {
    for child in &node.children {
        match child.tag.as_str() {
            "baseunit" => {
                if let Some(name) = required(child, "name", diags) {
                    schema.base_units.push(BaseUnit {
                        name,
                        symbol: child.attr("symbol").unwrap_or_default().to_string(),
                        description: child.attr("description").unwrap_or_default().to_string(),
                    });
                }
            }
            "prefixes" => {
                if let Some(name) = required(child, "name", diags) {
                    schema.prefixes.push(UnitPrefix {
                        name,
                        symbol: child.attr("symbol").unwrap_or_default().to_string(),
                        power: number(child, "power", diags).unwrap_or(0),
                    });
                }
            }
            "unit" => {
                if let Some(unit) = parse_unit(child, diags) {
                    schema.units.push(unit);
                }
            }
            _ => unexpected(child, "units", diags),
        }
    }
}

fn parse_unit(node: &Node, diags: &mut Vec<Diagnostic>) -> Option<Unit> {
    let name = required(node, "name", diags)?;
    let mut unit = Unit {
        name,
        numerator: String::new(),
        denominator: String::new(),
        offset: String::new(),
        ref_units: Vec::new(),
    };
    for child in &node.children {
        match child.tag.as_str() {
            "numerator" => unit.numerator = child.text.trim().to_string(),
            "denominator" => unit.denominator = child.text.trim().to_string(),
            "offset" => unit.offset = child.text.trim().to_string(),
            "refUnit" => {
                let referenced = child
                    .attr("name")
                    .or_else(|| child.attr("unit"))
                    .unwrap_or_default()
                    .to_string();
                if referenced.is_empty() {
                    diags.push(Diagnostic::error(
                        Some(child.pos),
                        "refUnit without unit name",
                    ));
                } else {
                    unit.ref_units.push(RefUnit {
                        unit: referenced,
                        prefix: child.attr("prefix").unwrap_or_default().to_string(),
                        power: number(child, "power", diags).unwrap_or(1),
                    });
                }
            }
            _ => unexpected(child, "unit", diags),
        }
    }
    Some(unit)
}

fn parse_datatype(node: &Node, diags: &mut Vec<Diagnostic>) -> Option<DataType> {
    let name = node
        .attr("name")
        .or_else(|| node.attr("type"))
        .map(str::to_string);
    let Some(name) = name else {
        diags.push(Diagnostic::error(
            Some(node.pos),
            "datatype without name",
        ));
        return None;
    };
    let bit_size: Option<usize> = number(node, "size", diags);
    Some(DataType {
        name,
        bit_size: bit_size?,
        description: node.attr("description").map(str::to_string),
        unit: node.attr("unit").map(str::to_string),
        min: number(node, "min", diags),
        max: number(node, "max", diags),
        default: number(node, "default", diags),
        predefined: false,
    })
}

fn parse_enum(node: &Node, diags: &mut Vec<Diagnostic>) -> Option<EnumType> {
    let name = required(node, "name", diags)?;
    let type_name = required(node, "type", diags)?;
    let mut values = Vec::new();
    for child in &node.children {
        if child.tag != "element" {
            unexpected(child, "enum", diags);
            continue;
        }
        let Some(value_name) = required(child, "name", diags) else {
            continue;
        };
        match number::<i64>(child, "value", diags) {
            Some(value) => values.push(EnumValue { name: value_name, value }),
            None => diags.push(Diagnostic::error(
                Some(child.pos),
                format!("enum element '{value_name}' without value"),
            )),
        }
    }
    Some(EnumType { name, type_name, values })
}

fn parse_struct(node: &Node, diags: &mut Vec<Diagnostic>) -> Option<StructType> {
    let name = required(node, "name", diags)?;
    let ddl_version = match node.attr("ddlversion") {
        Some(text) => match LanguageVersion::parse(text) {
            Some(version) => Some(version),
            None => {
                diags.push(Diagnostic::error(
                    Some(node.pos),
                    format!("struct '{name}': unknown ddlversion '{text}'"),
                ));
                None
            }
        },
        None => None,
    };
    let mut st = StructType {
        name,
        version: number(node, "version", diags).unwrap_or(1),
        alignment: number(node, "alignment", diags).unwrap_or(1),
        ddl_version,
        comment: node.attr("comment").map(str::to_string),
        elements: Vec::new(),
    };
    for child in &node.children {
        if child.tag != "element" {
            unexpected(child, "struct", diags);
            continue;
        }
        if let Some(elem) = parse_element(child, &st.name, diags) {
            st.elements.push(elem);
        }
    }
    Some(st)
}

fn parse_element(node: &Node, struct_name: &str, diags: &mut Vec<Diagnostic>) -> Option<StructElement> {
    let name = required(node, "name", diags)?;
    let Some(type_name) = required(node, "type", diags) else {
        return None;
    };

    let byte_pos = match node.attr("bytepos") {
        Some(text) => match text.trim().parse::<i64>() {
            Ok(-1) => None,
            Ok(pos) if pos >= 0 => Some(pos as usize),
            _ => {
                diags.push(Diagnostic::error(
                    Some(node.pos),
                    format!("element '{struct_name}.{name}': bad bytepos '{text}'"),
                ));
                None
            }
        },
        None => None,
    };

    let bit_pos = match node.attr("bitpos") {
        Some(text) => match text.trim().parse::<u8>() {
            Ok(pos) if pos <= 7 => pos,
            _ => {
                diags.push(Diagnostic::error(
                    Some(node.pos),
                    format!("element '{struct_name}.{name}': bitpos '{text}' outside 0..=7"),
                ));
                0
            }
        },
        None => 0,
    };

    let array_size = match node.attr("arraysize") {
        Some(text) => match text.trim().parse::<usize>() {
            Ok(count) => ArraySize::Fixed(count),
            Err(_) => ArraySize::Dynamic(text.trim().to_string()),
        },
        None => ArraySize::default(),
    };

    let byte_order = match node.attr("byteorder") {
        Some("LE") | Some("Intel") | None => ByteOrder::LittleEndian,
        Some("BE") | Some("Motorola") => ByteOrder::BigEndian,
        Some(other) => {
            diags.push(Diagnostic::error(
                Some(node.pos),
                format!("element '{struct_name}.{name}': unknown byteorder '{other}'"),
            ));
            ByteOrder::LittleEndian
        }
    };

    Some(StructElement {
        name,
        type_name,
        byte_pos,
        bit_pos,
        num_bits: number(node, "numbits", diags),
        array_size,
        byte_order,
        alignment: number(node, "alignment", diags),
        unit: node.attr("unit").map(str::to_string),
        description: node.attr("description").map(str::to_string),
        value: node.attr("value").map(str::to_string),
        min: number(node, "min", diags),
        max: number(node, "max", diags),
        default: number(node, "default", diags),
        scale: number(node, "scale", diags),
        offset: number(node, "offset", diags),
    })
}

fn parse_stream(node: &Node, diags: &mut Vec<Diagnostic>) -> Option<Stream> {
    let name = required(node, "name", diags)?;
    let stream_type = required(node, "type", diags)?;
    let mut stream = Stream {
        name,
        stream_type,
        description: node.attr("description").map(str::to_string),
        structs: Vec::new(),
    };
    for child in &node.children {
        if child.tag != "struct" {
            unexpected(child, "stream", diags);
            continue;
        }
        let Some(type_name) = required(child, "type", diags) else {
            continue;
        };
        stream.structs.push(StreamStruct {
            name: child.attr("name").map(str::to_string),
            type_name,
            byte_pos: number(child, "bytepos", diags).unwrap_or(0),
        });
    }
    Some(stream)
}

fn parse_stream_meta_type(node: &Node, diags: &mut Vec<Diagnostic>) -> Option<StreamMetaType> {
    let name = required(node, "name", diags)?;
    let mut meta = StreamMetaType {
        name,
        version: node.attr("version").unwrap_or("1").to_string(),
        parent: node.attr("parent").map(str::to_string),
        properties: Vec::new(),
    };
    for child in &node.children {
        if child.tag != "property" {
            unexpected(child, "streammetatype", diags);
            continue;
        }
        if let Some(prop_name) = required(child, "name", diags) {
            meta.properties
                .push((prop_name, child.attr("type").unwrap_or_default().to_string()));
        }
    }
    Some(meta)
}

fn required(node: &Node, attr: &str, diags: &mut Vec<Diagnostic>) -> Option<String> {
    match node.attr(attr) {
        Some(value) if !value.is_empty() => Some(value.to_string()),
        _ => {
            diags.push(Diagnostic::error(
                Some(node.pos),
                format!("<{}> without required attribute '{}'", node.tag, attr),
            ));
            None
        }
    }
}

fn number<T: FromStr>(node: &Node, attr: &str, diags: &mut Vec<Diagnostic>) -> Option<T> {
    let text = node.attr(attr)?;
    match text.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            diags.push(Diagnostic::error(
                Some(node.pos),
                format!("<{}> attribute '{}': bad number '{}'", node.tag, attr, text),
            ));
            None
        }
    }
}

/// Renders a schema back into a DDL document. Predefined primitives are
/// skipped; sections appear in the canonical order.
pub(crate) fn write_document(schema: &Schema) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"iso-8859-1\" standalone=\"no\"?>\n");
    out.push_str("<adtf:ddl xmlns:adtf=\"adtf\">\n");

    out.push_str("    <header>\n");
    push_line(&mut out, 8, &format!(
        "<language_version>{}</language_version>",
        schema.header.language_version.as_str()
    ));
    push_text_tag(&mut out, "author", &schema.header.author);
    push_text_tag(&mut out, "date_creation", &schema.header.date_creation);
    push_text_tag(&mut out, "date_change", &schema.header.date_change);
    push_text_tag(&mut out, "description", &schema.header.description);
    for decl in &schema.header.ext_declarations {
        push_line(&mut out, 8, &format!(
            "<ext_declaration key=\"{}\" value=\"{}\"/>",
            escape(decl.key.as_str()),
            escape(decl.value.as_str())
        ));
    }
    out.push_str("    </header>\n");

    out.push_str("    <units>\n");
    for base in &schema.base_units {
        push_line(&mut out, 8, &format!(
            "<baseunit description=\"{}\" name=\"{}\" symbol=\"{}\"/>",
            escape(base.description.as_str()),
            escape(base.name.as_str()),
            escape(base.symbol.as_str())
        ));
    }
    for prefix in &schema.prefixes {
        push_line(&mut out, 8, &format!(
            "<prefixes name=\"{}\" power=\"{}\" symbol=\"{}\"/>",
            escape(prefix.name.as_str()),
            prefix.power,
            escape(prefix.symbol.as_str())
        ));
    }
    for unit in &schema.units {
        push_line(&mut out, 8, &format!("<unit name=\"{}\">", escape(unit.name.as_str())));
        push_line(&mut out, 12, &format!("<numerator>{}</numerator>", escape(unit.numerator.as_str())));
        push_line(&mut out, 12, &format!("<denominator>{}</denominator>", escape(unit.denominator.as_str())));
        push_line(&mut out, 12, &format!("<offset>{}</offset>", escape(unit.offset.as_str())));
        for ref_unit in &unit.ref_units {
            push_line(&mut out, 12, &format!(
                "<refUnit name=\"{}\" power=\"{}\" prefix=\"{}\"/>",
                escape(ref_unit.unit.as_str()),
                ref_unit.power,
                escape(ref_unit.prefix.as_str())
            ));
        }
        push_line(&mut out, 8, "</unit>");
    }
    out.push_str("    </units>\n");

    out.push_str("    <datatypes>\n");
    for dt in schema.data_types.iter().filter(|d| !d.predefined) {
        let mut line = format!("<datatype name=\"{}\" size=\"{}\"", escape(dt.name.as_str()), dt.bit_size);
        if let Some(description) = &dt.description {
            line.push_str(&format!(" description=\"{}\"", escape(description.as_str())));
        }
        if let Some(unit) = &dt.unit {
            line.push_str(&format!(" unit=\"{}\"", escape(unit.as_str())));
        }
        push_number_attr(&mut line, "min", dt.min);
        push_number_attr(&mut line, "max", dt.max);
        push_number_attr(&mut line, "default", dt.default);
        line.push_str("/>");
        push_line(&mut out, 8, &line);
    }
    out.push_str("    </datatypes>\n");

    out.push_str("    <enums>\n");
    for en in &schema.enums {
        push_line(&mut out, 8, &format!(
            "<enum name=\"{}\" type=\"{}\">",
            escape(en.name.as_str()),
            escape(en.type_name.as_str())
        ));
        for value in &en.values {
            push_line(&mut out, 12, &format!(
                "<element name=\"{}\" value=\"{}\"/>",
                escape(value.name.as_str()),
                value.value
            ));
        }
        push_line(&mut out, 8, "</enum>");
    }
    out.push_str("    </enums>\n");

    out.push_str("    <structs>\n");
    for st in &schema.structs {
        let mut line = format!(
            "<struct alignment=\"{}\" name=\"{}\" version=\"{}\"",
            st.alignment,
            escape(st.name.as_str()),
            st.version
        );
        if let Some(version) = st.ddl_version {
            line.push_str(&format!(" ddlversion=\"{}\"", version.as_str()));
        }
        if let Some(comment) = &st.comment {
            line.push_str(&format!(" comment=\"{}\"", escape(comment.as_str())));
        }
        line.push('>');
        push_line(&mut out, 8, &line);
        for elem in &st.elements {
            push_line(&mut out, 12, &element_line(elem));
        }
        push_line(&mut out, 8, "</struct>");
    }
    out.push_str("    </structs>\n");

    out.push_str("    <streams>\n");
    for stream in &schema.streams {
        let mut line = format!(
            "<stream name=\"{}\" type=\"{}\"",
            escape(stream.name.as_str()),
            escape(stream.stream_type.as_str())
        );
        if let Some(description) = &stream.description {
            line.push_str(&format!(" description=\"{}\"", escape(description.as_str())));
        }
        if stream.structs.is_empty() {
            line.push_str("/>");
            push_line(&mut out, 8, &line);
        } else {
            line.push('>');
            push_line(&mut out, 8, &line);
            for member in &stream.structs {
                let mut entry = format!("<struct bytepos=\"{}\" type=\"{}\"", member.byte_pos, escape(member.type_name.as_str()));
                if let Some(name) = &member.name {
                    entry.push_str(&format!(" name=\"{}\"", escape(name.as_str())));
                }
                entry.push_str("/>");
                push_line(&mut out, 12, &entry);
            }
            push_line(&mut out, 8, "</stream>");
        }
    }
    out.push_str("    </streams>\n");

    if !schema.stream_meta_types.is_empty() {
        out.push_str("    <streammetatypes>\n");
        for meta in &schema.stream_meta_types {
            let mut line = format!(
                "<streammetatype name=\"{}\" version=\"{}\"",
                escape(meta.name.as_str()),
                escape(meta.version.as_str())
            );
            if let Some(parent) = &meta.parent {
                line.push_str(&format!(" parent=\"{}\"", escape(parent.as_str())));
            }
            if meta.properties.is_empty() {
                line.push_str("/>");
                push_line(&mut out, 8, &line);
            } else {
                line.push('>');
                push_line(&mut out, 8, &line);
                for (name, prop_type) in &meta.properties {
                    push_line(&mut out, 12, &format!(
                        "<property name=\"{}\" type=\"{}\"/>",
                        escape(name.as_str()),
                        escape(prop_type.as_str())
                    ));
                }
                push_line(&mut out, 8, "</streammetatype>");
            }
        }
        out.push_str("    </streammetatypes>\n");
    }

    out.push_str("</adtf:ddl>\n");
    out
}

fn element_line(elem: &StructElement) -> String {
    let mut line = format!(
        "<element name=\"{}\" type=\"{}\"",
        escape(elem.name.as_str()),
        escape(elem.type_name.as_str())
    );
    match elem.byte_pos {
        Some(pos) => line.push_str(&format!(" bytepos=\"{pos}\"")),
        None => line.push_str(" bytepos=\"-1\""),
    }
    if elem.bit_pos != 0 {
        line.push_str(&format!(" bitpos=\"{}\"", elem.bit_pos));
    }
    if let Some(num_bits) = elem.num_bits {
        line.push_str(&format!(" numbits=\"{num_bits}\""));
    }
    line.push_str(match elem.byte_order {
        ByteOrder::LittleEndian => " byteorder=\"LE\"",
        ByteOrder::BigEndian => " byteorder=\"BE\"",
    });
    if let Some(alignment) = elem.alignment {
        line.push_str(&format!(" alignment=\"{alignment}\""));
    }
    match &elem.array_size {
        ArraySize::Fixed(1) => {}
        ArraySize::Fixed(count) => line.push_str(&format!(" arraysize=\"{count}\"")),
        ArraySize::Dynamic(name) => {
            line.push_str(&format!(" arraysize=\"{}\"", escape(name.as_str())));
        }
    }
    if let Some(value) = &elem.value {
        line.push_str(&format!(" value=\"{}\"", escape(value.as_str())));
    }
    if let Some(unit) = &elem.unit {
        line.push_str(&format!(" unit=\"{}\"", escape(unit.as_str())));
    }
    if let Some(description) = &elem.description {
        line.push_str(&format!(" description=\"{}\"", escape(description.as_str())));
    }
    push_number_attr(&mut line, "min", elem.min);
    push_number_attr(&mut line, "max", elem.max);
    push_number_attr(&mut line, "default", elem.default);
    push_number_attr(&mut line, "scale", elem.scale);
    push_number_attr(&mut line, "offset", elem.offset);
    line.push_str("/>");
    line
}

fn push_number_attr(line: &mut String, name: &str, value: Option<f64>) {
    if let Some(value) = value {
        line.push_str(&format!(" {name}=\"{value}\""));
    }
}

fn push_text_tag(out: &mut String, tag: &str, text: &str) {
    push_line(out, 8, &format!("<{tag}>{}</{tag}>", escape(text)));
}

fn push_line(out: &mut String, indent: usize, line: &str) {
    for _ in 0..indent {
        out.push(' ');
    }
    out.push_str(line);
    out.push('\n');
}
