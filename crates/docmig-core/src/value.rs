//! # Native Source Values
//!
//! The source store holds loosely-typed documents. [`SourceValue`] closes
//! that space into a fixed set of kinds so the encoder can switch on the
//! runtime type with an exhaustive `match`.
//!
//! ## Integer vs. Float
//!
//! The distinction matters: integers are written to Firestore as decimal
//! strings (`integerValue`) so that 64-bit values survive intact, while
//! floats become `doubleValue`. Extended JSON keeps the distinction through
//! `$numberLong`/`$numberInt` vs. `$numberDouble`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::error::ValidationError;

/// Name of the source store's identity field.
pub const ID_FIELD: &str = "_id";

/// Name of the source store's revision counter.
pub const VERSION_FIELD: &str = "__v";

/// A 12-byte source-store object identifier.
///
/// Always valid by construction: it can only be built from 24 hexadecimal
/// digits. [`Display`](fmt::Display) yields the canonical lowercase hex form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    /// Build an identifier from its raw bytes.
    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    /// Access the raw bytes.
    pub fn bytes(&self) -> &[u8; 12] {
        &self.0
    }

    /// Parse the canonical 24-digit hexadecimal form (either case).
    pub fn parse_hex(raw: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidObjectId(raw.to_string());
        if raw.len() != 24 || !raw.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let mut bytes = [0u8; 12];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&raw[i * 2..i * 2 + 2], 16).map_err(|_| invalid())?;
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl FromStr for ObjectId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_hex(s)
    }
}

/// A native value as held by the source store.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceValue {
    /// Explicit null.
    Null,
    /// The deprecated BSON `undefined`; treated like null.
    Undefined,
    /// Boolean.
    Bool(bool),
    /// 32- or 64-bit integer.
    Int(i64),
    /// IEEE-754 double.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Date/time, normalised to UTC.
    DateTime(DateTime<Utc>),
    /// Store-native object identifier.
    ObjectId(ObjectId),
    /// Ordered sequence.
    Array(Vec<SourceValue>),
    /// Nested document.
    Object(BTreeMap<String, SourceValue>),
    /// Any store-native type without a dedicated variant (Decimal128,
    /// Binary, Regex, ...). `repr` is its default string conversion.
    Other {
        /// Source type name, for diagnostics.
        kind: String,
        /// Default string conversion of the value.
        repr: String,
    },
}

impl SourceValue {
    /// Short name of the value's kind, for logs and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Undefined => "undefined",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "double",
            Self::String(_) => "string",
            Self::DateTime(_) => "date",
            Self::ObjectId(_) => "objectId",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
            Self::Other { .. } => "other",
        }
    }

    /// `true` for `Null` and `Undefined`.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Null | Self::Undefined)
    }

    /// Stable string form of a scalar, or `None` for null, arrays, and objects.
    pub fn scalar_string(&self) -> Option<String> {
        match self {
            Self::Bool(b) => Some(b.to_string()),
            Self::Int(n) => Some(n.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::String(s) => Some(s.clone()),
            Self::DateTime(dt) => Some(crate::temporal::format_timestamp(dt)),
            Self::ObjectId(oid) => Some(oid.to_string()),
            Self::Other { repr, .. } => Some(repr.clone()),
            Self::Null | Self::Undefined | Self::Array(_) | Self::Object(_) => None,
        }
    }
}

impl From<&str> for SourceValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for SourceValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for SourceValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for SourceValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<f64> for SourceValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<DateTime<Utc>> for SourceValue {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::DateTime(dt)
    }
}

/// A top-level source document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceRecord {
    /// Every field of the document, including `_id` and `__v`.
    pub fields: BTreeMap<String, SourceValue>,
}

impl SourceRecord {
    /// Wrap an already-decoded field map.
    pub fn new(fields: BTreeMap<String, SourceValue>) -> Self {
        Self { fields }
    }

    /// Look up a top-level field.
    pub fn get(&self, field: &str) -> Option<&SourceValue> {
        self.fields.get(field)
    }

    /// The source identity rendered as a string, when the document has one.
    pub fn identity(&self) -> Option<String> {
        self.fields.get(ID_FIELD).and_then(SourceValue::scalar_string)
    }
}
