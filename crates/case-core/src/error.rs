//! Error types for the document model.

use thiserror::Error;

/// Failures of dotted-path property access on an element.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PropertyError {
    /// The path does not name a property of this element kind.
    #[error("unknown property '{path}' on {kind} element")]
    UnknownPath { path: String, kind: &'static str },

    /// The value's type does not fit the property.
    #[error("property '{path}' expects {expected}, got {found}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    /// The value has the right type but is outside the allowed range.
    #[error("value for '{path}' out of range: {reason}")]
    OutOfRange { path: String, reason: String },
}

/// Failures loading or saving a case document.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("invalid case document: {0}")]
    Json(#[from] serde_json::Error),

    /// The document parsed but references an active step or category it does not contain.
    #[error("dangling activation: {0}")]
    DanglingActivation(String),
}
