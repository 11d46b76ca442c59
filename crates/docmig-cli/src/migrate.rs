//! # Migrate Subcommand
//!
//! Reads a `mongoexport` file and creates one Firestore document per record
//! under the record's natural key. Records whose key already exists are
//! skipped, so the command can be re-run after a partial failure.
//!
//! Exit codes: 0 when the run completes (even with per-record failures),
//! 2 for configuration or argument errors, 3 when the source cannot be read.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;

use docmig_core::{FieldExclusion, NaturalKey, SourceRecord, SourceValue};
use docmig_firestore::{FirestoreClient, FirestoreConfig};
use docmig_migrate::{
    render_summary, DryRun, ExportFileSource, MigrationPlan, MigrationResult, RecordFilter,
    RecordOutcome, SourceStore,
};

use crate::preset::Preset;

/// Arguments for `docmig migrate`.
#[derive(Args, Debug, Clone)]
pub struct MigrateArgs {
    /// mongoexport output: a JSON array or one document per line.
    #[arg(long, value_name = "FILE")]
    pub source: PathBuf,

    /// Destination collection. Defaults to the preset's collection.
    #[arg(long, value_name = "NAME")]
    pub collection: Option<String>,

    /// Use this top-level field as the document key.
    #[arg(long, value_name = "FIELD", conflicts_with = "key_source_id")]
    pub key_field: Option<String>,

    /// Trim and lowercase the key field (e-mail addresses).
    #[arg(long, requires = "key_field")]
    pub lowercase_key: bool,

    /// Use the source `_id` as the document key.
    #[arg(long)]
    pub key_source_id: bool,

    /// Apply a preset's key, collection, and defaults.
    #[arg(long, value_enum)]
    pub preset: Option<Preset>,

    /// Extra field to leave out, in addition to `_id` and `__v`.
    #[arg(long, value_name = "FIELD")]
    pub exclude: Vec<String>,

    /// Default for a missing or null field, as `FIELD=JSON`.
    /// Extended JSON such as `{"$date": "..."}` is accepted.
    #[arg(long, value_name = "FIELD=JSON")]
    pub default: Vec<String>,

    /// Fill a missing or null field with the time the run started.
    #[arg(long, value_name = "FIELD")]
    pub default_now: Vec<String>,

    /// Only migrate records whose top-level FIELD equals VALUE.
    #[arg(long = "where", value_name = "FIELD=VALUE")]
    pub filters: Vec<String>,

    /// Stop after this many matching records.
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,

    /// Check existence but write nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the result as JSON instead of the text summary.
    #[arg(long)]
    pub json: bool,
}

/// Everything a run needs, resolved from flags and preset.
#[derive(Debug, Clone)]
pub struct ResolvedMigration {
    /// Key derivation for every record.
    pub natural_key: NaturalKey,
    /// Collection, defaults, and exclusion.
    pub plan: MigrationPlan,
    /// Source-side filter.
    pub filter: RecordFilter,
}

/// Resolve flags and preset into a migration plan.
///
/// Precedence, lowest first: preset, `--default-now`, `--default`.
/// `started_at` is the single timestamp every `--default-now` field gets.
pub fn resolve(args: &MigrateArgs, started_at: DateTime<Utc>) -> Result<ResolvedMigration> {
    let natural_key = match (&args.key_field, args.key_source_id, args.preset) {
        (Some(field), _, _) if args.lowercase_key => NaturalKey::normalized_field(field.clone()),
        (Some(field), _, _) => NaturalKey::field(field.clone()),
        (None, true, _) => NaturalKey::SourceId,
        (None, false, Some(preset)) => preset.natural_key(),
        (None, false, None) => {
            bail!("no natural key: pass --key-field, --key-source-id, or --preset")
        }
    };

    let collection = match (&args.collection, args.preset) {
        (Some(name), _) => name.clone(),
        (None, Some(preset)) => preset.collection().to_string(),
        (None, None) => bail!("no destination collection: pass --collection or --preset"),
    };
    if collection.trim().is_empty() {
        bail!("--collection must not be empty");
    }

    let mut plan = MigrationPlan::new(collection);
    if let Some(preset) = args.preset {
        for (field, value) in preset.defaults() {
            plan = plan.with_default(field, value);
        }
        for field in preset.default_now_fields() {
            plan = plan.with_default(*field, SourceValue::DateTime(started_at));
        }
    }
    for field in &args.default_now {
        plan = plan.with_default(field.clone(), SourceValue::DateTime(started_at));
    }
    for raw in &args.default {
        let (field, value) = parse_default(raw)?;
        plan = plan.with_default(field, value);
    }

    let exclusion = args
        .exclude
        .iter()
        .fold(FieldExclusion::default(), |set, field| set.with(field.clone()));
    plan = plan.with_exclusion(exclusion);

    let filter = RecordFilter {
        equals: args
            .filters
            .iter()
            .map(|raw| parse_where(raw))
            .collect::<Result<_>>()?,
        limit: args.limit,
    };

    Ok(ResolvedMigration {
        natural_key,
        plan,
        filter,
    })
}

/// Parse `FIELD=JSON` into a field name and decoded value.
pub fn parse_default(raw: &str) -> Result<(String, SourceValue)> {
    let (field, json) = split_assignment(raw, "--default")?;
    let value: serde_json::Value = serde_json::from_str(json).with_context(|| {
        format!("--default {field}: value is not JSON (quote strings, e.g. {field}='\"text\"')")
    })?;
    Ok((field.to_string(), SourceValue::from_extended_json(value)))
}

/// Parse `FIELD=VALUE` into an equality constraint.
pub fn parse_where(raw: &str) -> Result<(String, String)> {
    let (field, value) = split_assignment(raw, "--where")?;
    Ok((field.to_string(), value.to_string()))
}

fn split_assignment<'a>(raw: &'a str, flag: &str) -> Result<(&'a str, &'a str)> {
    let Some((field, value)) = raw.split_once('=') else {
        bail!("{flag} expects FIELD=VALUE, got \"{raw}\"");
    };
    let field = field.trim();
    if field.is_empty() {
        bail!("{flag} has an empty field name in \"{raw}\"");
    }
    Ok((field, value))
}

#[derive(Serialize)]
struct Report<'a> {
    collection: &'a str,
    dry_run: bool,
    started_at: DateTime<Utc>,
    #[serde(flatten)]
    result: &'a MigrationResult,
}

/// Execute `docmig migrate` with configuration from the environment.
pub async fn run_migrate(args: &MigrateArgs) -> Result<u8> {
    let config = FirestoreConfig::from_env().context("loading Firestore configuration")?;
    execute(args, config, Utc::now(), &mut std::io::stdout().lock()).await
}

/// Execute a migration against `config`, writing the report to `out`.
pub async fn execute(
    args: &MigrateArgs,
    config: FirestoreConfig,
    started_at: DateTime<Utc>,
    out: &mut impl Write,
) -> Result<u8> {
    let resolved = resolve(args, started_at)?;
    tracing::debug!(?config, key = %resolved.natural_key, "resolved migration");
    let client = FirestoreClient::new(config).context("building Firestore client")?;

    let source = ExportFileSource::open(&args.source)?;
    let records = source.fetch_all(&resolved.filter)?;
    tracing::info!(
        source = %source.path().display(),
        records = records.len(),
        "loaded source records"
    );

    let natural_key = &resolved.natural_key;
    let key_of = |record: &SourceRecord| natural_key.derive(record);
    // Text mode prints one line per record ahead of the summary.
    let total = records.len();
    let width = total.to_string().len();
    let migrated_label = if args.dry_run { "would migrate" } else { "migrated" };
    let mut progress_error: Option<std::io::Error> = None;
    let progress = |index: usize, outcome: RecordOutcome<'_>| {
        if args.json || progress_error.is_some() {
            return;
        }
        let line = match outcome {
            RecordOutcome::Migrated(key) => format!("{migrated_label:<9} {key}"),
            RecordOutcome::Skipped(key) => format!("skipped   {key}"),
            RecordOutcome::Errored(f) => format!("errored   {} [{}]: {}", f.key, f.stage, f.message),
        };
        if let Err(e) = writeln!(out, "[{:>width$}/{total}] {line}", index + 1) {
            progress_error = Some(e);
        }
    };
    let result = if args.dry_run {
        let destination = DryRun::new(client);
        docmig_migrate::migrate_with_progress(&records, key_of, &resolved.plan, &destination, progress)
            .await
    } else {
        docmig_migrate::migrate_with_progress(&records, key_of, &resolved.plan, &client, progress)
            .await
    };
    if let Some(e) = progress_error {
        return Err(e).context("writing progress");
    }

    let collection = resolved.plan.collection.as_str();
    if args.json {
        let report = Report {
            collection,
            dry_run: args.dry_run,
            started_at,
            result: &result,
        };
        serde_json::to_writer_pretty(&mut *out, &report).context("writing JSON report")?;
        writeln!(out).context("writing JSON report")?;
    } else {
        write!(out, "{}", render_summary(&result, collection, args.dry_run))
            .context("writing summary")?;
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: MigrateArgs,
    }

    fn parse(argv: &[&str]) -> MigrateArgs {
        let mut full = vec!["docmig", "--source", "export.json"];
        full.extend_from_slice(argv);
        TestCli::try_parse_from(full).unwrap().args
    }

    fn started() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 0).unwrap()
    }

    #[test]
    fn subscribers_preset_fills_key_collection_and_defaults() {
        let resolved = resolve(&parse(&["--preset", "subscribers"]), started()).unwrap();
        assert_eq!(resolved.natural_key, NaturalKey::normalized_field("email"));
        assert_eq!(resolved.plan.collection, "subscribers");
        assert_eq!(
            resolved.plan.defaults["subscribedAt"],
            SourceValue::DateTime(started())
        );
        assert!(resolved.plan.defaults.contains_key("preferences"));
    }

    #[test]
    fn explicit_flags_override_preset() {
        let args = parse(&[
            "--preset",
            "posts",
            "--collection",
            "archive/2019/posts",
            "--key-field",
            "slug",
            "--default",
            "createdAt={\"$date\":\"2019-01-01T00:00:00Z\"}",
        ]);
        let resolved = resolve(&args, started()).unwrap();
        assert_eq!(resolved.natural_key, NaturalKey::field("slug"));
        assert_eq!(resolved.plan.collection, "archive/2019/posts");
        assert_eq!(
            resolved.plan.defaults["createdAt"],
            SourceValue::DateTime(Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(
            resolved.plan.defaults["updatedAt"],
            SourceValue::DateTime(started())
        );
    }

    #[test]
    fn missing_key_strategy_is_an_error() {
        let err = resolve(&parse(&["--collection", "things"]), started()).unwrap_err();
        assert!(err.to_string().contains("no natural key"));
    }

    #[test]
    fn missing_collection_is_an_error() {
        let err = resolve(&parse(&["--key-source-id"]), started()).unwrap_err();
        assert!(err.to_string().contains("no destination collection"));
    }

    #[test]
    fn key_flags_conflict() {
        let argv = [
            "docmig",
            "--source",
            "x.json",
            "--key-field",
            "email",
            "--key-source-id",
        ];
        assert!(TestCli::try_parse_from(argv).is_err());
    }

    #[test]
    fn lowercase_key_requires_key_field() {
        let argv = ["docmig", "--source", "x.json", "--lowercase-key"];
        assert!(TestCli::try_parse_from(argv).is_err());
    }

    #[test]
    fn extra_exclusions_keep_the_defaults() {
        let args = parse(&["--key-source-id", "--collection", "c", "--exclude", "password"]);
        let exclusion = resolve(&args, started()).unwrap().plan.exclusion;
        assert!(exclusion.contains("_id"));
        assert!(exclusion.contains("__v"));
        assert!(exclusion.contains("password"));
    }

    #[test]
    fn where_and_limit_build_the_filter() {
        let args = parse(&[
            "--key-source-id",
            "--collection",
            "c",
            "--where",
            "status=active",
            "--where",
            "tier=2",
            "--limit",
            "10",
        ]);
        let filter = resolve(&args, started()).unwrap().filter;
        assert_eq!(
            filter.equals,
            vec![
                ("status".to_string(), "active".to_string()),
                ("tier".to_string(), "2".to_string())
            ]
        );
        assert_eq!(filter.limit, Some(10));
    }

    #[test]
    fn default_values_are_json() {
        let (field, value) = parse_default("source=\"import\"").unwrap();
        assert_eq!(field, "source");
        assert_eq!(value, SourceValue::from("import"));

        let (_, value) = parse_default("count=3").unwrap();
        assert_eq!(value, SourceValue::Int(3));
    }

    #[test]
    fn default_rejects_bare_words_and_missing_equals() {
        assert!(parse_default("source=import").is_err());
        assert!(parse_default("source").is_err());
        assert!(parse_default("=1").is_err());
    }

    #[test]
    fn where_keeps_everything_after_the_first_equals() {
        assert_eq!(
            parse_where("query=a=b").unwrap(),
            ("query".to_string(), "a=b".to_string())
        );
    }
}
