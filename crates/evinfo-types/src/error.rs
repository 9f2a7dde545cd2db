//! Error types for response parsing in evinfo-types.

use thiserror::Error;

/// Errors that can occur when extracting payload bytes from an adapter response.
///
/// This error type is transport-agnostic and does not include
/// connection errors (those belong in evinfo-core).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The response carried fewer payload bytes than its layout requires.
    #[error("Insufficient data: expected {expected} bytes, got {actual}")]
    InsufficientData {
        /// Number of bytes the layout requires.
        expected: usize,
        /// Number of complete hex byte groups present.
        actual: usize,
    },
    /// A payload byte group was not valid hexadecimal.
    #[error("Invalid hex byte: {0:?}")]
    InvalidHex(String),
}

/// Result type alias using evinfo-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
