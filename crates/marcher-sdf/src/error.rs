//! Error types for the primitive data model

use thiserror::Error;

/// Errors raised while building or decoding primitives and settings
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SdfError {
    /// A raw record carried a shape tag outside the known kinds
    #[error("Unknown primitive kind tag: {0}")]
    UnknownKind(u32),

    /// A primitive descriptor failed validation
    #[error("Invalid primitive: {0}")]
    InvalidPrimitive(String),

    /// Render settings failed validation
    #[error("Invalid render settings: {0}")]
    InvalidSettings(String),
}
