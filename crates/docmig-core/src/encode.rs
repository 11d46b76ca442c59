//! # Value Encoder
//!
//! Converts native [`SourceValue`]s into Firestore's type-tagged REST
//! representation. Every value on the Firestore wire is an object with
//! exactly one `*Value` key:
//!
//! ```json
//! {"stringValue": "Ann"}
//! {"integerValue": "9007199254740993"}
//! {"mapValue": {"fields": {"weeklyDigest": {"booleanValue": true}}}}
//! ```
//!
//! Tag selection is driven solely by the runtime kind of the source value;
//! the encoder knows nothing about any destination schema. [`encode()`] is
//! total: kinds Firestore has no tag for fall back to `stringValue`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::temporal::{format_timestamp, parse_timestamp};
use crate::value::{SourceValue, ID_FIELD, VERSION_FIELD};

/// Magnitude of the first float that no longer fits in an `i64` (2^63).
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// A Firestore `Value`: a tagged union with exactly one populated tag.
#[derive(Debug, Clone, PartialEq)]
pub enum EncodedValue {
    /// `{"nullValue": null}`
    Null,
    /// `{"booleanValue": b}`
    Boolean(bool),
    /// `{"integerValue": "<decimal>"}`. Carried as a string on the wire so
    /// that JSON parsers limited to 2^53 do not lose precision.
    Integer(i64),
    /// `{"doubleValue": f}`. Non-finite values use the strings `"NaN"`,
    /// `"Infinity"`, and `"-Infinity"`.
    Double(f64),
    /// `{"stringValue": s}`
    String(String),
    /// `{"timestampValue": "<RFC 3339, UTC, milliseconds>"}`
    Timestamp(DateTime<Utc>),
    /// `{"arrayValue": {"values": [...]}}`
    Array(Vec<EncodedValue>),
    /// `{"mapValue": {"fields": {...}}}`
    Map(BTreeMap<String, EncodedValue>),
}

impl EncodedValue {
    /// The wire name of the populated tag.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Null => "nullValue",
            Self::Boolean(_) => "booleanValue",
            Self::Integer(_) => "integerValue",
            Self::Double(_) => "doubleValue",
            Self::String(_) => "stringValue",
            Self::Timestamp(_) => "timestampValue",
            Self::Array(_) => "arrayValue",
            Self::Map(_) => "mapValue",
        }
    }

    /// Decode a Firestore `Value` object as returned by the REST API.
    pub fn from_wire(value: &Value) -> Result<Self, WireError> {
        let obj = value.as_object().ok_or(WireError::NotAnObject)?;
        let mut entries = obj.iter();
        let (tag, inner) = match (entries.next(), entries.next()) {
            (Some(entry), None) => entry,
            _ => return Err(WireError::TagCount(obj.len())),
        };
        let bad = || WireError::BadPayload(tag.clone());

        match tag.as_str() {
            "nullValue" => Ok(Self::Null),
            "booleanValue" => inner.as_bool().map(Self::Boolean).ok_or_else(bad),
            "integerValue" => match inner {
                Value::String(s) => s.parse().map(Self::Integer).map_err(|_| bad()),
                Value::Number(n) => n.as_i64().map(Self::Integer).ok_or_else(bad),
                _ => Err(bad()),
            },
            "doubleValue" => match inner {
                Value::Number(n) => n.as_f64().map(Self::Double).ok_or_else(bad),
                Value::String(s) => match s.as_str() {
                    "NaN" => Ok(Self::Double(f64::NAN)),
                    "Infinity" => Ok(Self::Double(f64::INFINITY)),
                    "-Infinity" => Ok(Self::Double(f64::NEG_INFINITY)),
                    _ => Err(bad()),
                },
                _ => Err(bad()),
            },
            "stringValue" => inner
                .as_str()
                .map(|s| Self::String(s.to_string()))
                .ok_or_else(bad),
            "timestampValue" => inner
                .as_str()
                .and_then(parse_timestamp)
                .map(Self::Timestamp)
                .ok_or_else(bad),
            "arrayValue" => match inner.get("values") {
                None => Ok(Self::Array(Vec::new())),
                Some(Value::Array(items)) => items
                    .iter()
                    .map(Self::from_wire)
                    .collect::<Result<_, _>>()
                    .map(Self::Array),
                Some(_) => Err(bad()),
            },
            "mapValue" => match inner.get("fields") {
                None => Ok(Self::Map(BTreeMap::new())),
                Some(Value::Object(fields)) => fields_from_wire(fields).map(Self::Map),
                Some(_) => Err(bad()),
            },
            other => Err(WireError::UnknownTag(other.to_string())),
        }
    }
}

/// Decode a Firestore `fields` object.
pub fn fields_from_wire(
    fields: &Map<String, Value>,
) -> Result<BTreeMap<String, EncodedValue>, WireError> {
    fields
        .iter()
        .map(|(k, v)| EncodedValue::from_wire(v).map(|ev| (k.clone(), ev)))
        .collect()
}

/// Failure to decode a Firestore `Value` object.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    /// The value was not a JSON object.
    #[error("Firestore value must be a JSON object")]
    NotAnObject,
    /// The object did not have exactly one tag.
    #[error("Firestore value must have exactly one tag, found {0}")]
    TagCount(usize),
    /// The tag is not one docmig understands.
    #[error("unsupported Firestore value tag: {0}")]
    UnknownTag(String),
    /// The tag's payload has the wrong shape.
    #[error("malformed payload for {0}")]
    BadPayload(String),
}

impl Serialize for EncodedValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            Self::Null => map.serialize_entry(self.tag(), &())?,
            Self::Boolean(b) => map.serialize_entry(self.tag(), b)?,
            Self::Integer(n) => map.serialize_entry(self.tag(), &n.to_string())?,
            Self::Double(f) if f.is_nan() => map.serialize_entry(self.tag(), "NaN")?,
            Self::Double(f) if f.is_infinite() => {
                let repr = if *f > 0.0 { "Infinity" } else { "-Infinity" };
                map.serialize_entry(self.tag(), repr)?
            }
            Self::Double(f) => map.serialize_entry(self.tag(), f)?,
            Self::String(s) => map.serialize_entry(self.tag(), s)?,
            Self::Timestamp(dt) => map.serialize_entry(self.tag(), &format_timestamp(dt))?,
            Self::Array(items) => map.serialize_entry(self.tag(), &ArrayPayload(items))?,
            Self::Map(fields) => map.serialize_entry(self.tag(), &MapPayload(fields))?,
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for EncodedValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Self::from_wire(&raw).map_err(D::Error::custom)
    }
}

/// `{"values": [...]}`, with the key omitted for an empty array the way
/// Firestore itself returns it.
struct ArrayPayload<'a>(&'a [EncodedValue]);

impl Serialize for ArrayPayload<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = usize::from(!self.0.is_empty());
        let mut map = serializer.serialize_map(Some(len))?;
        if !self.0.is_empty() {
            map.serialize_entry("values", self.0)?;
        }
        map.end()
    }
}

/// `{"fields": {...}}`, omitted for an empty map.
struct MapPayload<'a>(&'a BTreeMap<String, EncodedValue>);

impl Serialize for MapPayload<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = usize::from(!self.0.is_empty());
        let mut map = serializer.serialize_map(Some(len))?;
        if !self.0.is_empty() {
            map.serialize_entry("fields", self.0)?;
        }
        map.end()
    }
}

/// Field names stripped from every encoded map.
///
/// The default strips the source identity (`_id`) and the revision counter
/// (`__v`): both are store-internal bookkeeping, not domain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldExclusion(BTreeSet<String>);

impl FieldExclusion {
    /// An exclusion set that strips nothing.
    pub fn none() -> Self {
        Self(BTreeSet::new())
    }

    /// Add a field name to the set.
    pub fn with(mut self, field: impl Into<String>) -> Self {
        self.0.insert(field.into());
        self
    }

    /// Whether `field` is excluded.
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains(field)
    }

    /// Iterate the excluded names in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl Default for FieldExclusion {
    fn default() -> Self {
        Self::none().with(ID_FIELD).with(VERSION_FIELD)
    }
}

impl<S: Into<String>> FromIterator<S> for FieldExclusion {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for FieldExclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}

/// Encode a value, stripping the default exclusion set from nested maps.
pub fn encode(value: &SourceValue) -> EncodedValue {
    encode_with(value, &FieldExclusion::default())
}

/// Encode a value, stripping `exclude` from every nested map.
pub fn encode_with(value: &SourceValue, exclude: &FieldExclusion) -> EncodedValue {
    match value {
        SourceValue::Null | SourceValue::Undefined => EncodedValue::Null,
        SourceValue::Bool(b) => EncodedValue::Boolean(*b),
        SourceValue::Int(n) => EncodedValue::Integer(*n),
        SourceValue::Float(f) => encode_number(*f),
        SourceValue::String(s) => EncodedValue::String(s.clone()),
        SourceValue::DateTime(dt) => EncodedValue::Timestamp(*dt),
        SourceValue::ObjectId(oid) => EncodedValue::String(oid.to_string()),
        SourceValue::Array(items) => {
            EncodedValue::Array(items.iter().map(|v| encode_with(v, exclude)).collect())
        }
        SourceValue::Object(fields) => EncodedValue::Map(encode_fields(fields, exclude)),
        SourceValue::Other { repr, .. } => EncodedValue::String(repr.clone()),
    }
}

/// Encode the top-level fields of a document, skipping excluded names.
pub fn encode_fields(
    fields: &BTreeMap<String, SourceValue>,
    exclude: &FieldExclusion,
) -> BTreeMap<String, EncodedValue> {
    fields
        .iter()
        .filter(|(name, _)| !exclude.contains(name))
        .map(|(name, value)| (name.clone(), encode_with(value, exclude)))
        .collect()
}

/// Mathematical integers become `integerValue`; everything else, including
/// integral values too large for an `i64`, stays a double.
fn encode_number(f: f64) -> EncodedValue {
    if f.is_finite() && f.fract() == 0.0 && (-I64_BOUND..I64_BOUND).contains(&f) {
        EncodedValue::Integer(f as i64)
    } else {
        EncodedValue::Double(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ObjectId;
    use chrono::TimeZone;
    use serde_json::json;

    fn wire(v: &EncodedValue) -> Value {
        serde_json::to_value(v).unwrap()
    }

    #[test]
    fn null_and_undefined_encode_to_null_tag() {
        assert_eq!(encode(&SourceValue::Null), EncodedValue::Null);
        assert_eq!(encode(&SourceValue::Undefined), EncodedValue::Null);
        assert_eq!(wire(&EncodedValue::Null), json!({"nullValue": null}));
    }

    #[test]
    fn integers_are_decimal_strings_on_the_wire() {
        let big = 9_007_199_254_740_993i64; // 2^53 + 1
        let ev = encode(&SourceValue::Int(big));
        assert_eq!(ev, EncodedValue::Integer(big));
        assert_eq!(wire(&ev), json!({"integerValue": "9007199254740993"}));
    }

    #[test]
    fn integral_floats_become_integers() {
        assert_eq!(encode(&SourceValue::Float(42.0)), EncodedValue::Integer(42));
        assert_eq!(encode(&SourceValue::Float(-0.0)), EncodedValue::Integer(0));
    }

    #[test]
    fn floats_outside_i64_stay_double() {
        assert_eq!(encode(&SourceValue::Float(1e20)), EncodedValue::Double(1e20));
        assert_eq!(encode(&SourceValue::Float(I64_BOUND)), EncodedValue::Double(I64_BOUND));
        assert_eq!(
            encode(&SourceValue::Float(-I64_BOUND)),
            EncodedValue::Integer(i64::MIN)
        );
    }

    #[test]
    fn fractional_floats_are_doubles() {
        let ev = encode(&SourceValue::Float(2.5));
        assert_eq!(ev, EncodedValue::Double(2.5));
        assert_eq!(wire(&ev), json!({"doubleValue": 2.5}));
    }

    #[test]
    fn non_finite_doubles_use_string_forms() {
        assert_eq!(
            wire(&encode(&SourceValue::Float(f64::NAN))),
            json!({"doubleValue": "NaN"})
        );
        assert_eq!(
            wire(&encode(&SourceValue::Float(f64::NEG_INFINITY))),
            json!({"doubleValue": "-Infinity"})
        );
    }

    #[test]
    fn dates_encode_as_millisecond_utc_timestamps() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            wire(&encode(&SourceValue::DateTime(dt))),
            json!({"timestampValue": "2024-01-01T00:00:00.000Z"})
        );
    }

    #[test]
    fn object_ids_encode_as_hex_strings() {
        let oid = ObjectId::parse_hex("65a1b2c3d4e5f60718293a4b").unwrap();
        assert_eq!(
            encode(&SourceValue::ObjectId(oid)),
            EncodedValue::String("65a1b2c3d4e5f60718293a4b".into())
        );
    }

    #[test]
    fn unknown_kinds_fall_back_to_string() {
        let v = SourceValue::Other {
            kind: "numberDecimal".into(),
            repr: "10.50".into(),
        };
        assert_eq!(encode(&v), EncodedValue::String("10.50".into()));
    }

    #[test]
    fn empty_array_is_an_array_not_null() {
        let ev = encode(&SourceValue::Array(vec![]));
        assert_eq!(ev, EncodedValue::Array(vec![]));
        assert_eq!(wire(&ev), json!({"arrayValue": {}}));
    }

    #[test]
    fn array_order_is_preserved() {
        let v = SourceValue::Array(vec!["c".into(), SourceValue::Int(1), true.into()]);
        assert_eq!(
            wire(&encode(&v)),
            json!({"arrayValue": {"values": [
                {"stringValue": "c"},
                {"integerValue": "1"},
                {"booleanValue": true}
            ]}})
        );
    }

    #[test]
    fn exclusion_strips_identity_and_revision() {
        let fields = BTreeMap::from([
            ("id".to_string(), SourceValue::from("x")),
            ("rev".to_string(), SourceValue::Int(3)),
            ("name".to_string(), SourceValue::from("Ann")),
        ]);
        let exclude: FieldExclusion = ["id", "rev"].into_iter().collect();
        let encoded = encode_fields(&fields, &exclude);
        assert_eq!(encoded.len(), 1);
        assert_eq!(encoded["name"], EncodedValue::String("Ann".into()));
    }

    #[test]
    fn default_exclusion_applies_to_nested_maps() {
        let nested = SourceValue::Object(BTreeMap::from([
            ("_id".to_string(), SourceValue::from("sub")),
            ("__v".to_string(), SourceValue::Int(0)),
            ("title".to_string(), SourceValue::from("Hello")),
        ]));
        assert_eq!(
            wire(&encode(&nested)),
            json!({"mapValue": {"fields": {"title": {"stringValue": "Hello"}}}})
        );
    }

    #[test]
    fn empty_map_serialises_without_fields_key() {
        assert_eq!(
            wire(&EncodedValue::Map(BTreeMap::new())),
            json!({"mapValue": {}})
        );
    }

    #[test]
    fn wire_decoding_accepts_firestore_documents() {
        let raw = json!({"mapValue": {"fields": {
            "n": {"integerValue": "12"},
            "d": {"doubleValue": 1.5},
            "t": {"timestampValue": "2024-01-01T00:00:00Z"},
            "e": {"arrayValue": {}},
            "z": {"nullValue": null}
        }}});
        let ev = EncodedValue::from_wire(&raw).unwrap();
        let EncodedValue::Map(fields) = ev else {
            panic!("expected map");
        };
        assert_eq!(fields["n"], EncodedValue::Integer(12));
        assert_eq!(fields["d"], EncodedValue::Double(1.5));
        assert_eq!(fields["e"], EncodedValue::Array(vec![]));
        assert_eq!(fields["z"], EncodedValue::Null);
        assert_eq!(fields["t"].tag(), "timestampValue");
    }

    #[test]
    fn wire_decoding_rejects_multiple_tags() {
        let raw = json!({"stringValue": "a", "booleanValue": true});
        assert_eq!(EncodedValue::from_wire(&raw), Err(WireError::TagCount(2)));
    }

    #[test]
    fn wire_decoding_rejects_unknown_tags() {
        let raw = json!({"geoPointValue": {"latitude": 1.0, "longitude": 2.0}});
        assert!(matches!(
            EncodedValue::from_wire(&raw),
            Err(WireError::UnknownTag(_))
        ));
    }

    #[test]
    fn exclusion_display_lists_names() {
        assert_eq!(FieldExclusion::default().to_string(), "{__v, _id}");
    }
}
