//! # docmig-firestore -- Typed Rust client for the Firestore REST API
//!
//! Provides the two destination operations the migrator needs:
//! - **Point lookup** (`GET .../documents/{collection}/{key}`), which backs
//!   the existence check,
//! - **Create with explicit key** (`POST .../documents/{collection}?documentId={key}`),
//!   which backs the document writer.
//!
//! ## Authentication
//!
//! Requests carry the project's Web API key as the `key` query parameter.
//! The key is held in [`zeroize::Zeroizing`] and redacted from `Debug`.
//!
//! ## API Path Convention
//!
//! `{base_url}/v1/projects/{project}/databases/{database}/documents/{collection}[/{key}]`.
//! For example: `https://firestore.googleapis.com/v1/projects/site/databases/(default)/documents/subscribers/a@x.com`.

pub mod config;
pub mod documents;
pub mod error;
pub mod retry;

pub use config::{ConfigError, FirestoreConfig};
pub use documents::{DocumentClient, FirestoreDocument, WriteResult};
pub use error::FirestoreError;
pub use retry::RetryPolicy;

use std::time::Duration;

/// Top-level Firestore client.
#[derive(Debug, Clone)]
pub struct FirestoreClient {
    documents: documents::DocumentClient,
}

impl FirestoreClient {
    /// Create a new Firestore client from configuration.
    pub fn new(config: FirestoreConfig) -> Result<Self, FirestoreError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers({
                let mut headers = reqwest::header::HeaderMap::new();
                headers.insert(
                    reqwest::header::ACCEPT,
                    reqwest::header::HeaderValue::from_static("application/json"),
                );
                headers
            })
            .build()
            .map_err(|e| FirestoreError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;

        let documents_url = config.documents_url()?;
        Ok(Self {
            documents: documents::DocumentClient::new(http, documents_url, config.api_key, config.retry),
        })
    }

    /// Access the documents client.
    pub fn documents(&self) -> &documents::DocumentClient {
        &self.documents
    }
}
