//! # Error Types
//!
//! Structured errors for the foundational types, built with `thiserror`.

use thiserror::Error;

/// Errors while parsing a field element from its textual encoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    /// The input string was empty.
    #[error("empty field element string")]
    Empty,

    /// The input is not a decimal or `0x`-prefixed hexadecimal integer.
    #[error("invalid field element encoding: {0:?}")]
    InvalidDigits(String),

    /// The integer is not below the BN254 scalar field modulus.
    #[error("value is not a canonical field element (>= modulus): {0}")]
    OutOfRange(String),
}

/// Top-level error type for memproof.
#[derive(Error, Debug)]
pub enum MemproofError {
    /// A field element could not be decoded.
    #[error("field encoding error: {0}")]
    Field(#[from] FieldError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
