//! # Source Store
//!
//! [`SourceStore::fetch_all`] is the bulk read the driver consumes. The
//! shipped implementation, [`ExportFileSource`], reads the output of
//! `mongoexport`: either a JSON array (`--jsonArray`) or one Extended JSON
//! document per line.
//!
//! Any failure here is fatal for the run. An export that cannot be opened
//! or parsed means the source is unavailable, not that one record is bad.

use std::path::{Path, PathBuf};

use docmig_core::{SourceRecord, ValidationError};
use serde_json::Value;

/// Errors reading the source store.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The export could not be opened or read.
    #[error("cannot read source export {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// A line (or the whole array) is not valid JSON.
    #[error("invalid JSON in {} at line {line}: {source}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        source: serde_json::Error,
    },
    /// A document is valid JSON but not an object. `position` is the line
    /// number for JSON Lines exports and the element number for arrays.
    #[error("invalid document #{position} in {}: {source}", path.display())]
    Document {
        path: PathBuf,
        position: usize,
        source: ValidationError,
    },
}

/// Equality constraints and a cap applied to a bulk read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    /// `(field, value)` pairs; a record matches when every top-level
    /// `field` has a scalar whose string form equals `value`.
    pub equals: Vec<(String, String)>,
    /// Keep at most this many matching records.
    pub limit: Option<usize>,
}

impl RecordFilter {
    /// Whether `record` satisfies every equality constraint.
    pub fn matches(&self, record: &SourceRecord) -> bool {
        self.equals.iter().all(|(field, expected)| {
            record
                .get(field)
                .and_then(|v| v.scalar_string())
                .is_some_and(|actual| actual == *expected)
        })
    }

    /// Filter and cap an already-fetched sequence, preserving order.
    pub fn apply(&self, records: Vec<SourceRecord>) -> Vec<SourceRecord> {
        let matching = records.into_iter().filter(|r| self.matches(r));
        match self.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        }
    }
}

/// Bulk read from the source collection.
pub trait SourceStore {
    /// Every record matching `filter`, in source order.
    fn fetch_all(&self, filter: &RecordFilter) -> Result<Vec<SourceRecord>, SourceError>;
}

/// A `mongoexport` file on disk.
#[derive(Debug, Clone)]
pub struct ExportFileSource {
    path: PathBuf,
}

impl ExportFileSource {
    /// Open an export file. Fails if the path is not a readable file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();
        std::fs::File::open(&path).map_err(|e| SourceError::Io {
            path: path.clone(),
            source: e,
        })?;
        Ok(Self { path })
    }

    /// The export path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse(&self, text: &str) -> Result<Vec<SourceRecord>, SourceError> {
        if text.trim_start().starts_with('[') {
            let values: Vec<Value> = serde_json::from_str(text).map_err(|e| SourceError::Parse {
                path: self.path.clone(),
                line: e.line(),
                source: e,
            })?;
            return values
                .into_iter()
                .enumerate()
                .map(|(i, v)| self.decode(v, i + 1))
                .collect();
        }

        text.lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                let value = serde_json::from_str(line).map_err(|e| SourceError::Parse {
                    path: self.path.clone(),
                    line: i + 1,
                    source: e,
                })?;
                self.decode(value, i + 1)
            })
            .collect()
    }

    fn decode(&self, value: Value, position: usize) -> Result<SourceRecord, SourceError> {
        SourceRecord::from_extended_json(value).map_err(|e| SourceError::Document {
            path: self.path.clone(),
            position,
            source: e,
        })
    }
}

impl SourceStore for ExportFileSource {
    fn fetch_all(&self, filter: &RecordFilter) -> Result<Vec<SourceRecord>, SourceError> {
        let text = std::fs::read_to_string(&self.path).map_err(|e| SourceError::Io {
            path: self.path.clone(),
            source: e,
        })?;
        let records = self.parse(&text)?;
        tracing::debug!(path = %self.path.display(), records = records.len(), "read source export");
        Ok(filter.apply(records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docmig_core::SourceValue;
    use std::io::Write;

    fn export(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn reads_json_lines_skipping_blank_lines() {
        let file = export(concat!(
            r#"{"_id":{"$oid":"65a1b2c3d4e5f60718293a4b"},"email":"a@x.com"}"#,
            "\n\n",
            r#"{"_id":{"$oid":"65a1b2c3d4e5f60718293a4c"},"email":"b@x.com"}"#,
            "\n"
        ));
        let source = ExportFileSource::open(file.path()).unwrap();
        let records = source.fetch_all(&RecordFilter::default()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].get("email"), Some(&SourceValue::from("b@x.com")));
    }

    #[test]
    fn reads_json_arrays() {
        let file = export(r#"[{"email":"a@x.com"},{"email":"b@x.com"},{"email":"c@x.com"}]"#);
        let source = ExportFileSource::open(file.path()).unwrap();
        let records = source.fetch_all(&RecordFilter::default()).unwrap();
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = ExportFileSource::open("/nonexistent/docmig/export.json").unwrap_err();
        assert!(matches!(err, SourceError::Io { .. }));
    }

    #[test]
    fn corrupt_line_reports_its_line_number() {
        let file = export("{\"email\":\"a@x.com\"}\n{not json}\n");
        let source = ExportFileSource::open(file.path()).unwrap();
        match source.fetch_all(&RecordFilter::default()).unwrap_err() {
            SourceError::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("expected Parse, got {other:?}"),
        }
    }

    #[test]
    fn non_object_document_is_rejected() {
        let file = export("[1, 2]");
        let source = ExportFileSource::open(file.path()).unwrap();
        match source.fetch_all(&RecordFilter::default()).unwrap_err() {
            SourceError::Document { position, .. } => assert_eq!(position, 1),
            other => panic!("expected Document, got {other:?}"),
        }
    }

    #[test]
    fn filter_matches_scalar_string_forms_and_limits() {
        let file = export(concat!(
            r#"{"email":"a@x.com","active":true,"tier":1}"#, "\n",
            r#"{"email":"b@x.com","active":false,"tier":1}"#, "\n",
            r#"{"email":"c@x.com","active":true,"tier":2}"#, "\n",
            r#"{"email":"d@x.com","active":true,"tier":1}"#, "\n",
        ));
        let source = ExportFileSource::open(file.path()).unwrap();
        let filter = RecordFilter {
            equals: vec![("active".into(), "true".into()), ("tier".into(), "1".into())],
            limit: Some(1),
        };
        let records = source.fetch_all(&filter).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("email"), Some(&SourceValue::from("a@x.com")));
    }

    #[test]
    fn filter_on_missing_field_matches_nothing() {
        let filter = RecordFilter {
            equals: vec![("missing".into(), "x".into())],
            limit: None,
        };
        assert!(!filter.matches(&SourceRecord::default()));
    }
}
