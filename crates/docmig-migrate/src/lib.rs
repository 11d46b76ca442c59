//! # docmig-migrate -- One-Way Document Migration
//!
//! Copies source records into Firestore, one record at a time, and reports
//! what happened to each.
//!
//! ## Per-record pipeline
//!
//! ```text
//! ComputeKey ──▶ CheckExistence ──▶ Skip
//!                      │
//!                      └──────────▶ Write ──▶ Tally
//! ```
//!
//! No record moves back to an earlier state. Terminal states are
//! `migrated`, `skipped`, or `errored`. A failure in any step is recorded
//! against that record and the run continues with the next one.
//!
//! ## Crate Policy
//!
//! - Records are processed sequentially in input order. Each existence
//!   check and write is awaited before the next record starts, so the
//!   [`MigrationResult`] accumulator needs no synchronisation.
//! - The driver never retries. Re-running the whole migration is safe:
//!   already-migrated records are skipped.
//! - The destination is reached only through the [`Destination`] trait.

pub mod destination;
pub mod driver;
pub mod result;
pub mod source;
pub mod writer;

pub use destination::{Destination, DryRun};
pub use driver::{merge_defaults, migrate, migrate_with_progress, MigrationPlan, RecordOutcome};
pub use result::{render_summary, FailureStage, MigrationResult, RecordFailure};
pub use source::{ExportFileSource, RecordFilter, SourceError, SourceStore};
pub use writer::write_document;
