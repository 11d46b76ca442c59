//! # Temporal Helpers
//!
//! Firestore `timestampValue` fields are RFC 3339 strings. docmig always
//! writes them in UTC with millisecond precision and a `Z` suffix
//! (e.g. `2024-01-01T00:00:00.000Z`), which is also what the source
//! store's JavaScript tooling produces.

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a timestamp as ISO 8601, UTC, millisecond precision.
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an RFC 3339 timestamp with any offset, normalising to UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
