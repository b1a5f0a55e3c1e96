//! Error types for schema handling and codec operations.

use thiserror::Error;

/// Failure codes surfaced by the codec layers.
///
/// Every fallible operation in the crate reports one of these; there is no
/// process-wide error state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// A required buffer is missing or empty.
    #[error("null or empty buffer")]
    NullPointer,
    /// A parameter is out of range or violates the call contract.
    #[error("invalid argument: {0}")]
    InvalidArg(String),
    /// No entity matches the lookup.
    #[error("not found: {0}")]
    NotFound(String),
    /// The schema references a missing type, or types reference each other.
    #[error("unknown type: {0}")]
    NoClass(String),
    /// A type was supplied where a different kind is required.
    #[error("invalid type: {0}")]
    InvalidType(String),
    /// An unrecognized schema element was encountered.
    #[error("unknown format: {0}")]
    UnknownFormat(String),
    /// Operation on an object that is not ready, e.g. an uncompleted partial schema.
    #[error("object is not initialized")]
    NotInitialized,
    /// The requested scalar type is not handled.
    #[error("not supported: {0}")]
    NotSupported(String),
    /// Generic failure when no other code applies.
    #[error("{0}")]
    Failed(String),
}

/// Classifies a [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// A hard structural or syntactic error.
    Error,
    /// A type reference that could not be resolved yet. A partial schema with
    /// only unresolved references can be completed against a base schema.
    UnresolvedReference,
}

/// A single located finding from parsing or validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Byte offset into the schema document, where known.
    pub location: Option<usize>,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn error(location: Option<usize>, message: impl Into<String>) -> Self {
        Diagnostic {
            location,
            kind: DiagnosticKind::Error,
            message: message.into(),
        }
    }

    pub fn unresolved(location: Option<usize>, message: impl Into<String>) -> Self {
        Diagnostic {
            location,
            kind: DiagnosticKind::UnresolvedReference,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.location {
            Some(offset) => write!(f, "at offset {}: {}", offset, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Aggregated result of parsing or validating a schema document.
///
/// Parsing does not stop at the first problem; all diagnostics are collected
/// and surfaced through one failing result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid schema: {}", format_diagnostics(.diagnostics))]
pub struct SchemaError {
    pub diagnostics: Vec<Diagnostic>,
}

impl SchemaError {
    pub fn new(diagnostics: Vec<Diagnostic>) -> Self {
        SchemaError { diagnostics }
    }

    pub fn single(location: Option<usize>, message: impl Into<String>) -> Self {
        SchemaError {
            diagnostics: vec![Diagnostic::error(location, message)],
        }
    }
}

impl From<SchemaError> for CodecError {
    fn from(err: SchemaError) -> Self {
        CodecError::Failed(err.to_string())
    }
}

fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    let mut out = String::new();
    for (i, diag) in diagnostics.iter().enumerate() {
        if i > 0 {
            out.push_str("; ");
        }
        out.push_str(&diag.to_string());
    }
    out
}
