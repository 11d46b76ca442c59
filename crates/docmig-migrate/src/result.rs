//! # Migration Result
//!
//! The aggregate a driver run returns: three counters and the ordered list
//! of per-record failures. Created empty at the start of a run, updated
//! once per source record, reported at the end, never persisted.

use std::fmt;
use std::fmt::Write as _;

use serde::Serialize;

/// The step at which a record failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    /// Natural-key derivation.
    Key,
    /// Destination existence check.
    Exists,
    /// Destination write, including an unexpected conflict.
    Write,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key => write!(f, "key"),
            Self::Exists => write!(f, "exists"),
            Self::Write => write!(f, "write"),
        }
    }
}

/// One record that ended in the `errored` state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordFailure {
    /// Zero-based position of the record in the source sequence.
    pub index: usize,
    /// The migration key when it was derived; otherwise the record's
    /// source identity, or `#<index>` when it has none.
    pub key: String,
    /// Where the record failed.
    pub stage: FailureStage,
    /// Human-readable error.
    pub message: String,
}

/// Outcome of one driver run.
///
/// `migrated + skipped + errored == total` once the run has finished.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationResult {
    /// Number of source records visited.
    pub total: usize,
    /// Records written to the destination.
    pub migrated: usize,
    /// Records whose key already existed at the destination.
    pub skipped: usize,
    /// Records that failed at any stage.
    pub errored: usize,
    /// Per-record failures, in source order.
    pub failures: Vec<RecordFailure>,
}

impl MigrationResult {
    pub(crate) fn record_migrated(&mut self) {
        self.migrated += 1;
    }

    pub(crate) fn record_skipped(&mut self) {
        self.skipped += 1;
    }

    pub(crate) fn record_failure(&mut self, failure: RecordFailure) {
        self.errored += 1;
        self.failures.push(failure);
    }

    /// `true` when no record failed.
    pub fn is_clean(&self) -> bool {
        self.errored == 0
    }
}

/// Render the operator-facing summary printed at the end of a run.
pub fn render_summary(result: &MigrationResult, collection: &str, dry_run: bool) -> String {
    let mut out = String::new();
    let heading = if dry_run {
        "Migration summary (dry run, nothing written)"
    } else {
        "Migration summary"
    };
    let migrated_label = if dry_run { "would migrate" } else { "migrated" };

    // Writing to a String cannot fail.
    let _ = writeln!(out, "{heading}");
    let _ = writeln!(out, "  collection:     {collection}");
    let _ = writeln!(out, "  source records: {}", result.total);
    let _ = writeln!(out, "  {:<15} {}", format!("{migrated_label}:"), result.migrated);
    let _ = writeln!(out, "  skipped:        {}", result.skipped);
    let _ = writeln!(out, "  errored:        {}", result.errored);

    if !result.failures.is_empty() {
        let _ = writeln!(out, "Failures:");
        for failure in &result.failures {
            let _ = writeln!(
                out,
                "  #{:<4} {} [{}] {}",
                failure.index + 1,
                failure.key,
                failure.stage,
                failure.message
            );
        }
    }
    out
}
