//! # Encode Subcommand
//!
//! Prints the Firestore `fields` payload each source record would be written
//! with, one JSON object per line. Needs no credentials and makes no network
//! calls.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde_json::json;

use docmig_core::{encode_fields, FieldExclusion};
use docmig_migrate::{ExportFileSource, RecordFilter, SourceStore};

/// Arguments for `docmig encode`.
#[derive(Args, Debug, Clone)]
pub struct EncodeArgs {
    /// mongoexport output: a JSON array or one document per line.
    #[arg(long, value_name = "FILE")]
    pub source: PathBuf,

    /// Extra field to leave out, in addition to `_id` and `__v`.
    #[arg(long, value_name = "FIELD")]
    pub exclude: Vec<String>,

    /// Stop after this many records.
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,
}

/// Execute `docmig encode`, writing to `out`.
pub fn run_encode(args: &EncodeArgs, out: &mut impl Write) -> Result<u8> {
    let source = ExportFileSource::open(&args.source)?;
    let records = source.fetch_all(&RecordFilter {
        equals: Vec::new(),
        limit: args.limit,
    })?;
    let exclusion = args
        .exclude
        .iter()
        .fold(FieldExclusion::default(), |set, field| set.with(field.clone()));

    for record in &records {
        let line = json!({ "fields": encode_fields(&record.fields, &exclusion) });
        writeln!(out, "{line}").context("writing encoded record")?;
    }
    tracing::info!(records = records.len(), "encoded source records");
    Ok(0)
}
