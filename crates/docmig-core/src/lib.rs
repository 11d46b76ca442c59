#![deny(missing_docs)]

//! # docmig-core -- Foundational Types for docmig
//!
//! This crate defines the data model shared by every other crate in the
//! workspace. It performs no I/O and has no internal crate dependencies.
//! It uses only `serde`, `serde_json`, `thiserror`, and `chrono` from the ecosystem.
//!
//! ## Design Principles
//!
//! 1. **Closed value model.** Source documents are decoded once into
//!    [`SourceValue`], a sum type over every kind the source store can hold.
//!    Everything downstream matches on it exhaustively.
//!
//! 2. **[`encode()`] is total.** Every [`SourceValue`] has a Firestore
//!    representation. Unknown store-native types degrade to a string tag;
//!    the encoder never fails and never panics.
//!
//! 3. **Keys are validated newtypes.** A [`MigrationKey`] is always a legal
//!    Firestore document ID. Deriving one is the only fallible step before
//!    network I/O.
//!
//! 4. **[`ValidationError`] hierarchy.** Structured errors with `thiserror`.
//!    No `Box<dyn Error>`, no `.unwrap()` outside tests.

pub mod encode;
pub mod error;
pub mod extended_json;
pub mod key;
pub mod temporal;
pub mod value;

// Re-export primary types at crate root for ergonomic imports.
pub use encode::{
    encode, encode_fields, encode_with, fields_from_wire, EncodedValue, FieldExclusion, WireError,
};
pub use error::ValidationError;
pub use key::{MigrationKey, NaturalKey};
pub use temporal::{format_timestamp, parse_timestamp};
pub use value::{ObjectId, SourceRecord, SourceValue};
