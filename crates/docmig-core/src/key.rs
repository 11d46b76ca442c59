//! # Migration Keys
//!
//! A [`MigrationKey`] is the destination document ID for one source record.
//! It must be deterministic (the same record always yields the same key,
//! which is what makes re-running a migration safe) and it must be a legal
//! Firestore document ID.
//!
//! [`NaturalKey`] covers the two derivations the CLI offers: a top-level
//! field such as `email`, or the stringified source identity. Library
//! callers can pass any closure to the driver instead.

use std::fmt;

use crate::error::ValidationError;
use crate::value::{SourceRecord, ID_FIELD};

/// Firestore document IDs are limited to 1,500 bytes.
const MAX_KEY_BYTES: usize = 1500;

/// A validated destination document ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MigrationKey(String);

impl MigrationKey {
    /// Validate and wrap a key.
    ///
    /// Rejects keys that are empty or blank, contain `/`, are `.` or `..`,
    /// match `__.*__`, or exceed 1,500 bytes.
    pub fn new(raw: impl Into<String>) -> Result<Self, ValidationError> {
        let key = raw.into();
        let reason = if key.trim().is_empty() {
            Some("must not be empty")
        } else if key.contains('/') {
            Some("must not contain '/'")
        } else if key == "." || key == ".." {
            Some("must not be '.' or '..'")
        } else if key.len() >= 4 && key.starts_with("__") && key.ends_with("__") {
            Some("must not match __.*__")
        } else if key.len() > MAX_KEY_BYTES {
            Some("must not exceed 1500 bytes")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(ValidationError::InvalidMigrationKey { key, reason }),
            None => Ok(Self(key)),
        }
    }

    /// Access the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MigrationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for MigrationKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Built-in natural-key derivations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NaturalKey {
    /// The string form of a top-level scalar field.
    Field {
        /// Field name.
        name: String,
        /// Trim and lowercase the value (e-mail addresses).
        normalize: bool,
    },
    /// The stringified source identity (`_id`).
    SourceId,
}

impl NaturalKey {
    /// Key on a field, verbatim.
    pub fn field(name: impl Into<String>) -> Self {
        Self::Field {
            name: name.into(),
            normalize: false,
        }
    }

    /// Key on a field, trimmed and lowercased.
    pub fn normalized_field(name: impl Into<String>) -> Self {
        Self::Field {
            name: name.into(),
            normalize: true,
        }
    }

    /// Derive the key for `record`.
    pub fn derive(&self, record: &SourceRecord) -> Result<MigrationKey, ValidationError> {
        match self {
            Self::SourceId => record
                .identity()
                .ok_or_else(|| ValidationError::MissingKeyField(ID_FIELD.to_string()))
                .and_then(MigrationKey::new),
            Self::Field { name, normalize } => {
                let value = record
                    .get(name)
                    .filter(|v| !v.is_nullish())
                    .ok_or_else(|| ValidationError::MissingKeyField(name.clone()))?;
                let raw = value
                    .scalar_string()
                    .ok_or_else(|| ValidationError::NonScalarKeyField {
                        field: name.clone(),
                        kind: value.kind(),
                    })?;
                if *normalize {
                    MigrationKey::new(raw.trim().to_lowercase())
                } else {
                    MigrationKey::new(raw)
                }
            }
        }
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SourceId => f.write_str(ID_FIELD),
            Self::Field { name, normalize: true } => write!(f, "lower({name})"),
            Self::Field { name, .. } => f.write_str(name),
        }
    }
}
