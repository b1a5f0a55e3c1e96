//! Resolution of dotted element paths to layout indices.
//!
//! A path is a dot-separated list of element names, each optionally followed
//! by `[N]` indices, e.g. `child[1].value[2]`. Resolution compares against
//! the flattened leaf names and allocates nothing beyond the input.

use crate::errors::CodecError;
use crate::layout::LayoutElement;

/// Index of the leaf exactly matching `path`.
pub(crate) fn find_index(elements: &[LayoutElement], path: &str) -> Result<usize, CodecError> {
    let path = checked(path)?;
    elements
        .iter()
        .position(|e| e.name == path)
        .ok_or_else(|| CodecError::NotFound(format!("element '{path}'")))
}

/// Index of the first leaf inside the struct addressed by `path`.
pub(crate) fn find_struct_index(
    elements: &[LayoutElement],
    path: &str,
) -> Result<usize, CodecError> {
    let path = checked(path)?;
    elements
        .iter()
        .position(|e| {
            e.name.len() > path.len()
                && e.name.starts_with(path)
                && e.name.as_bytes()[path.len()] == b'.'
        })
        .ok_or_else(|| CodecError::NotFound(format!("struct '{path}'")))
}

/// Index of the first leaf of element 0 of the array addressed by `path`.
pub(crate) fn find_array_index(
    elements: &[LayoutElement],
    path: &str,
) -> Result<usize, CodecError> {
    let path = checked(path)?;
    elements
        .iter()
        .position(|e| {
            e.name.len() > path.len()
                && e.name.starts_with(path)
                && e.name.as_bytes()[path.len()] == b'['
        })
        .ok_or_else(|| CodecError::NotFound(format!("array '{path}'")))
}

/// All leaves belonging to the struct or array addressed by `path`, as a
/// contiguous index range.
pub(crate) fn find_block(
    elements: &[LayoutElement],
    path: &str,
) -> Result<std::ops::Range<usize>, CodecError> {
    let path = checked(path)?;
    let matches = |name: &str| {
        name == path
            || (name.len() > path.len()
                && name.starts_with(path)
                && matches!(name.as_bytes()[path.len()], b'.' | b'['))
    };
    let first = elements
        .iter()
        .position(|e| matches(&e.name))
        .ok_or_else(|| CodecError::NotFound(format!("element '{path}'")))?;
    let mut last = first;
    while last + 1 < elements.len() && matches(&elements[last + 1].name) {
        last += 1;
    }
    Ok(first..last + 1)
}

fn checked(path: &str) -> Result<&str, CodecError> {
    let path = path.trim();
    if path.is_empty() {
        return Err(CodecError::InvalidArg("empty path".to_string()));
    }
    for token in path.split('.') {
        let bracket = token.find('[').unwrap_or(token.len());
        let (ident, mut indices) = token.split_at(bracket);
        if ident.is_empty() || !ident.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(CodecError::InvalidArg(format!("bad path syntax '{path}'")));
        }
        while !indices.is_empty() {
            let rest = match indices.strip_prefix('[') {
                Some(rest) => rest,
                None => {
                    return Err(CodecError::InvalidArg(format!("bad path syntax '{path}'")));
                }
            };
            let Some(close) = rest.find(']') else {
                return Err(CodecError::InvalidArg(format!("bad path syntax '{path}'")));
            };
            let digits = &rest[..close];
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(CodecError::InvalidArg(format!("bad path syntax '{path}'")));
            }
            indices = &rest[close + 1..];
        }
    }
    Ok(path)
}
