//! # Destination Seam
//!
//! [`Destination`] is the only way the driver reaches the destination store.
//! It covers the two operations the migration needs: a point lookup by key
//! (the existence check) and a create-with-explicit-key (the write).
//!
//! [`FirestoreClient`] is the production implementation. [`DryRun`] wraps
//! any destination and turns writes into log lines.

use std::collections::BTreeMap;
use std::future::Future;

use docmig_core::{EncodedValue, MigrationKey};
use docmig_firestore::{FirestoreClient, FirestoreError, WriteResult};

/// A document store that can answer "does this key exist?" and create a
/// document under a caller-chosen key.
///
/// `create` must not overwrite: when the key is already taken it fails.
pub trait Destination {
    /// Error reported by this destination.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Point lookup. `Ok(false)` means "definitely not there"; transport
    /// or server failures are errors, never `false`.
    fn exists(
        &self,
        collection: &str,
        key: &MigrationKey,
    ) -> impl Future<Output = Result<bool, Self::Error>> + Send;

    /// Create a document with an explicit key.
    fn create(
        &self,
        collection: &str,
        key: &MigrationKey,
        fields: BTreeMap<String, EncodedValue>,
    ) -> impl Future<Output = Result<WriteResult, Self::Error>> + Send;
}

impl Destination for FirestoreClient {
    type Error = FirestoreError;

    async fn exists(&self, collection: &str, key: &MigrationKey) -> Result<bool, FirestoreError> {
        self.documents().exists(collection, key).await
    }

    async fn create(
        &self,
        collection: &str,
        key: &MigrationKey,
        fields: BTreeMap<String, EncodedValue>,
    ) -> Result<WriteResult, FirestoreError> {
        self.documents().create(collection, key, &fields).await
    }
}

/// Reads through to the wrapped destination, but never writes.
///
/// Existence checks still hit the real destination, so a dry run reports
/// exactly which records a real run would migrate and which it would skip.
#[derive(Debug, Clone)]
pub struct DryRun<D> {
    inner: D,
}

impl<D> DryRun<D> {
    /// Wrap a destination.
    pub fn new(inner: D) -> Self {
        Self { inner }
    }

    /// Unwrap the destination.
    pub fn into_inner(self) -> D {
        self.inner
    }
}

impl<D: Destination + Sync> Destination for DryRun<D> {
    type Error = D::Error;

    async fn exists(&self, collection: &str, key: &MigrationKey) -> Result<bool, D::Error> {
        self.inner.exists(collection, key).await
    }

    async fn create(
        &self,
        collection: &str,
        key: &MigrationKey,
        fields: BTreeMap<String, EncodedValue>,
    ) -> Result<WriteResult, D::Error> {
        tracing::info!(
            collection,
            %key,
            field_count = fields.len(),
            "dry run: would create document"
        );
        Ok(WriteResult {
            name: format!("{collection}/{key}"),
            create_time: None,
        })
    }
}
