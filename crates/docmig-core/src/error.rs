//! # Error Hierarchy
//!
//! Structured validation errors for docmig domain primitives, built with
//! `thiserror`. Each variant carries the offending input so that operators
//! can fix the source data without guesswork.

use thiserror::Error;

/// Validation errors for source documents and migration keys.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// ObjectId is not 24 hexadecimal digits.
    #[error("invalid ObjectId: \"{0}\" (expected 24 hexadecimal digits)")]
    InvalidObjectId(String),

    /// A top-level source document was not a JSON object.
    #[error("source document must be an object, found {0}")]
    NotAnObject(String),

    /// The migration key violates Firestore document-ID rules.
    #[error("invalid migration key \"{key}\": {reason}")]
    InvalidMigrationKey {
        /// The rejected key.
        key: String,
        /// Which rule the key broke.
        reason: &'static str,
    },

    /// The natural-key field is absent or null.
    #[error("natural key field \"{0}\" is missing or null")]
    MissingKeyField(String),

    /// The natural-key field holds a value that has no stable string form.
    #[error("natural key field \"{field}\" holds a non-scalar {kind}")]
    NonScalarKeyField {
        /// The natural-key field name.
        field: String,
        /// The kind of value found there.
        kind: &'static str,
    },
}
