//! # Extended JSON Decoding
//!
//! `mongoexport` writes documents as MongoDB Extended JSON v2. Type
//! information that plain JSON cannot carry is wrapped in single-purpose
//! objects whose keys start with `$`:
//!
//! | Wrapper | Decoded as |
//! |---------|------------|
//! | `{"$oid": "<hex>"}` | [`SourceValue::ObjectId`] |
//! | `{"$date": "<iso>" \| <millis> \| {"$numberLong": "<millis>"}}` | [`SourceValue::DateTime`] |
//! | `{"$numberInt": "<n>"}`, `{"$numberLong": "<n>"}` | [`SourceValue::Int`] |
//! | `{"$numberDouble": "<f>"}` | [`SourceValue::Float`] |
//! | `{"$undefined": true}` | [`SourceValue::Undefined`] |
//! | anything else (`$numberDecimal`, `$binary`, `$regularExpression`, ...) | [`SourceValue::Other`] |
//!
//! Decoding is total. A malformed wrapper becomes [`SourceValue::Other`]
//! with the wrapper's JSON text, so it still reaches the destination as a
//! string rather than aborting the record.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::temporal::parse_timestamp;
use crate::value::{ObjectId, SourceRecord, SourceValue};

impl SourceValue {
    /// Decode a canonical or relaxed Extended JSON value.
    pub fn from_extended_json(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                // u64 above i64::MAX, or a number with a fraction/exponent.
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Self::String(s),
            Value::Array(items) => {
                Self::Array(items.into_iter().map(Self::from_extended_json).collect())
            }
            Value::Object(map) if is_type_wrapper(&map) => decode_wrapper(map),
            Value::Object(map) => Self::Object(decode_object(map)),
        }
    }
}

impl SourceRecord {
    /// Decode one exported document. The top-level value must be an object.
    pub fn from_extended_json(value: Value) -> Result<Self, ValidationError> {
        match value {
            Value::Object(map) if !is_type_wrapper(&map) => Ok(Self::new(decode_object(map))),
            other => Err(ValidationError::NotAnObject(json_kind(&other).to_string())),
        }
    }
}

fn decode_object(map: Map<String, Value>) -> BTreeMap<String, SourceValue> {
    map.into_iter()
        .map(|(k, v)| (k, SourceValue::from_extended_json(v)))
        .collect()
}

/// A non-empty object whose every key starts with `$` is a type wrapper.
fn is_type_wrapper(map: &Map<String, Value>) -> bool {
    !map.is_empty() && map.keys().all(|k| k.starts_with('$'))
}

fn decode_wrapper(map: Map<String, Value>) -> SourceValue {
    let decoded = match map.iter().next() {
        Some((tag, inner)) if map.len() == 1 => match tag.as_str() {
            "$oid" => inner
                .as_str()
                .and_then(|s| ObjectId::parse_hex(s).ok())
                .map(SourceValue::ObjectId),
            "$date" => decode_date(inner).map(SourceValue::DateTime),
            "$numberInt" | "$numberLong" => inner
                .as_str()
                .and_then(|s| s.parse::<i64>().ok())
                .map(SourceValue::Int),
            "$numberDouble" => inner.as_str().and_then(parse_double).map(SourceValue::Float),
            "$numberDecimal" | "$symbol" => inner.as_str().map(|s| SourceValue::Other {
                kind: tag.trim_start_matches('$').to_string(),
                repr: s.to_string(),
            }),
            "$undefined" => Some(SourceValue::Undefined),
            _ => None,
        },
        _ => None,
    };

    decoded.unwrap_or_else(|| {
        let kind = map
            .keys()
            .next()
            .map(|k| k.trim_start_matches('$').to_string())
            .unwrap_or_default();
        SourceValue::Other {
            kind,
            repr: Value::Object(map).to_string(),
        }
    })
}

fn decode_date(inner: &Value) -> Option<DateTime<Utc>> {
    match inner {
        Value::String(s) => parse_timestamp(s),
        Value::Number(n) => n.as_i64().and_then(DateTime::<Utc>::from_timestamp_millis),
        Value::Object(m) => m
            .get("$numberLong")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<i64>().ok())
            .and_then(DateTime::<Utc>::from_timestamp_millis),
        _ => None,
    }
}

fn parse_double(raw: &str) -> Option<f64> {
    match raw {
        "NaN" => Some(f64::NAN),
        "Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        _ => raw.parse().ok(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "type wrapper",
    }
}
