//! # Document Writer
//!
//! Encodes a record's fields and creates the destination document under a
//! caller-chosen key. A key that already exists is an error here, not a
//! success: the driver checks existence first, so a conflict means another
//! writer got there in between.

use std::collections::BTreeMap;

use docmig_core::{encode_fields, FieldExclusion, MigrationKey, SourceValue};
use docmig_firestore::WriteResult;

use crate::destination::Destination;

/// Encode every field not in `exclude` and create `collection/key`.
pub async fn write_document<D: Destination>(
    destination: &D,
    collection: &str,
    key: &MigrationKey,
    fields: &BTreeMap<String, SourceValue>,
    exclude: &FieldExclusion,
) -> Result<WriteResult, D::Error> {
    let encoded = encode_fields(fields, exclude);
    tracing::trace!(collection, %key, field_count = encoded.len(), "writing document");
    destination.create(collection, key, encoded).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use docmig_core::EncodedValue;
    use std::sync::Mutex;

    #[derive(Debug, thiserror::Error)]
    #[error("unused")]
    struct Never;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(String, BTreeMap<String, EncodedValue>)>>);

    impl Destination for Recorder {
        type Error = Never;

        async fn exists(&self, _: &str, _: &MigrationKey) -> Result<bool, Never> {
            Ok(false)
        }

        async fn create(
            &self,
            collection: &str,
            key: &MigrationKey,
            fields: BTreeMap<String, EncodedValue>,
        ) -> Result<WriteResult, Never> {
            let name = format!("{collection}/{key}");
            self.0.lock().unwrap().push((name.clone(), fields));
            Ok(WriteResult {
                name,
                create_time: None,
            })
        }
    }

    #[tokio::test]
    async fn writes_encoded_fields_without_excluded_names() {
        let recorder = Recorder::default();
        let fields = BTreeMap::from([
            ("_id".to_string(), SourceValue::from("65a1")),
            ("__v".to_string(), SourceValue::Int(2)),
            ("title".to_string(), SourceValue::from("Hello")),
            ("views".to_string(), SourceValue::Float(10.0)),
        ]);
        let key = MigrationKey::new("hello").unwrap();

        let written = write_document(&recorder, "posts", &key, &fields, &FieldExclusion::default())
            .await
            .unwrap();

        assert_eq!(written.name, "posts/hello");
        let calls = recorder.0.lock().unwrap();
        let (_, sent) = &calls[0];
        assert_eq!(
            sent,
            &BTreeMap::from([
                ("title".to_string(), EncodedValue::String("Hello".into())),
                ("views".to_string(), EncodedValue::Integer(10)),
            ])
        );
    }
}
