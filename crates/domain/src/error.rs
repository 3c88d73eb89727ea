//! Error types for the domain crate.

use thiserror::Error;

/// Errors raised while decoding domain records from model replies.
#[derive(Error, Debug)]
pub enum DomainError {
    /// A `books` entry could not be decoded into a [`crate::Book`]
    #[error("Malformed book entry at index {index}: {reason}")]
    MalformedBook { index: usize, reason: String },

    /// A reply field was present but had the wrong JSON type
    #[error("Field {field} has unexpected type, expected {expected}")]
    UnexpectedType {
        field: String,
        expected: &'static str,
    },
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, DomainError>;
