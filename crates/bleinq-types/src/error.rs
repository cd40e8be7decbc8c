//! Error types for data parsing in bleinq-types.

use thiserror::Error;

/// Errors that can occur when parsing advertisement or characteristic data.
///
/// This error type is platform-agnostic and does not include
/// BLE-specific errors (those belong in bleinq-core).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The payload ended before a field implied by its header.
    #[error("Malformed payload: {field} needs {needed} byte(s), {available} available")]
    MalformedPayload {
        /// The field being decoded when the payload ran out.
        field: &'static str,
        /// Bytes required by the field.
        needed: usize,
        /// Bytes left in the payload.
        available: usize,
    },

    /// Data that is well-sized but not interpretable.
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl ParseError {
    /// Shorthand for a [`ParseError::MalformedPayload`].
    pub fn malformed(field: &'static str, needed: usize, available: usize) -> Self {
        Self::MalformedPayload {
            field,
            needed,
            available,
        }
    }
}

/// Result type alias using bleinq-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
