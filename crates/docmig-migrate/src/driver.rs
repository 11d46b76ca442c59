//! # Migration Driver
//!
//! Walks the source records in order and takes each one through
//! ComputeKey → CheckExistence → (Skip | Write) → Tally.
//!
//! Only the two fatal classes (bad configuration, unreachable source) stop
//! a migration, and both are raised before the driver is called. Inside the
//! driver every failure is local to its record.

use std::collections::BTreeMap;
use std::fmt;

use docmig_core::{FieldExclusion, MigrationKey, SourceRecord, SourceValue};

use crate::destination::Destination;
use crate::result::{FailureStage, MigrationResult, RecordFailure};
use crate::writer::write_document;

/// What to migrate into, and how to shape each document.
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    /// Destination collection (may be a subcollection path).
    pub collection: String,
    /// Fallback values for fields a record lacks or holds as null.
    pub defaults: BTreeMap<String, SourceValue>,
    /// Field names stripped before encoding.
    pub exclusion: FieldExclusion,
}

impl MigrationPlan {
    /// A plan with no defaults and the default exclusion set.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            defaults: BTreeMap::new(),
            exclusion: FieldExclusion::default(),
        }
    }

    /// Add a default value.
    pub fn with_default(mut self, field: impl Into<String>, value: SourceValue) -> Self {
        self.defaults.insert(field.into(), value);
        self
    }

    /// Replace the exclusion set.
    pub fn with_exclusion(mut self, exclusion: FieldExclusion) -> Self {
        self.exclusion = exclusion;
        self
    }
}

/// Merge a record's fields over `defaults`.
///
/// Record fields win. A record field holding `null` or `undefined` counts
/// as absent, so the default fills it.
pub fn merge_defaults(
    record: &SourceRecord,
    defaults: &BTreeMap<String, SourceValue>,
) -> BTreeMap<String, SourceValue> {
    let mut merged = record.fields.clone();
    for (field, default) in defaults {
        let present = merged.get(field).is_some_and(|v| !v.is_nullish());
        if !present {
            merged.insert(field.clone(), default.clone());
        }
    }
    merged
}

/// What happened to one record, reported as soon as it is known.
#[derive(Debug, Clone, Copy)]
pub enum RecordOutcome<'a> {
    /// Written under this key.
    Migrated(&'a MigrationKey),
    /// The key already existed.
    Skipped(&'a MigrationKey),
    /// Failed at some stage.
    Errored(&'a RecordFailure),
}

/// Migrate `records` into `destination`, sequentially and in order.
///
/// `natural_key_of` derives the destination document ID for a record; it
/// must return the same key for the same record on every run. A record
/// whose key already exists is skipped, which makes re-running safe.
///
/// Never fails as a whole: every per-record error ends up in
/// [`MigrationResult::failures`].
pub async fn migrate<D, K, E>(
    records: &[SourceRecord],
    natural_key_of: K,
    plan: &MigrationPlan,
    destination: &D,
) -> MigrationResult
where
    D: Destination,
    K: Fn(&SourceRecord) -> Result<MigrationKey, E>,
    E: fmt::Display,
{
    migrate_with_progress(records, natural_key_of, plan, destination, |_, _| {}).await
}

/// [`migrate`], calling `on_record(index, outcome)` after each record.
pub async fn migrate_with_progress<D, K, E, P>(
    records: &[SourceRecord],
    natural_key_of: K,
    plan: &MigrationPlan,
    destination: &D,
    mut on_record: P,
) -> MigrationResult
where
    D: Destination,
    K: Fn(&SourceRecord) -> Result<MigrationKey, E>,
    E: fmt::Display,
    P: FnMut(usize, RecordOutcome<'_>),
{
    let mut result = MigrationResult::default();

    tracing::info!(
        collection = %plan.collection,
        records = records.len(),
        exclusion = %plan.exclusion,
        defaults = plan.defaults.len(),
        "starting migration"
    );

    for (index, record) in records.iter().enumerate() {
        result.total += 1;
        match migrate_one(index, record, &natural_key_of, plan, destination).await {
            Ok(Step::Migrated(key)) => {
                result.record_migrated();
                on_record(index, RecordOutcome::Migrated(&key));
            }
            Ok(Step::Skipped(key)) => {
                result.record_skipped();
                on_record(index, RecordOutcome::Skipped(&key));
            }
            Err(failure) => {
                on_record(index, RecordOutcome::Errored(&failure));
                result.record_failure(failure);
            }
        }
    }

    tracing::info!(
        collection = %plan.collection,
        total = result.total,
        migrated = result.migrated,
        skipped = result.skipped,
        errored = result.errored,
        "migration finished"
    );
    result
}

enum Step {
    Migrated(MigrationKey),
    Skipped(MigrationKey),
}

async fn migrate_one<D, K, E>(
    index: usize,
    record: &SourceRecord,
    natural_key_of: &K,
    plan: &MigrationPlan,
    destination: &D,
) -> Result<Step, RecordFailure>
where
    D: Destination,
    K: Fn(&SourceRecord) -> Result<MigrationKey, E>,
    E: fmt::Display,
{
    let collection = plan.collection.as_str();

    let key = natural_key_of(record).map_err(|e| {
        let label = record.identity().unwrap_or_else(|| format!("#{}", index + 1));
        tracing::warn!(index, record = %label, error = %e, "could not derive migration key");
        RecordFailure {
            index,
            key: label,
            stage: FailureStage::Key,
            message: e.to_string(),
        }
    })?;

    match destination.exists(collection, &key).await {
        Ok(true) => {
            tracing::debug!(index, %key, "already migrated, skipping");
            return Ok(Step::Skipped(key));
        }
        Ok(false) => {}
        Err(e) => {
            tracing::warn!(index, %key, error = %e, "existence check failed");
            return Err(failure(index, &key, FailureStage::Exists, e));
        }
    }

    let fields = merge_defaults(record, &plan.defaults);
    match write_document(destination, collection, &key, &fields, &plan.exclusion).await {
        Ok(written) => {
            tracing::info!(index, %key, document = %written.name, "migrated");
            Ok(Step::Migrated(key))
        }
        Err(e) => {
            tracing::warn!(index, %key, error = %e, "write failed");
            Err(failure(index, &key, FailureStage::Write, e))
        }
    }
}

fn failure(index: usize, key: &MigrationKey, stage: FailureStage, e: impl fmt::Display) -> RecordFailure {
    RecordFailure {
        index,
        key: key.to_string(),
        stage,
        message: e.to_string(),
    }
}
