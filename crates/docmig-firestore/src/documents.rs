//! Typed client for the Firestore `documents` resource.
//!
//! ## REST Paths (relative to `/v1/projects/{project}/databases/{database}`)
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | GET    | `/documents/{collection}/{key}` | Point lookup |
//! | POST   | `/documents/{collection}?documentId={key}` | Create with explicit key |
//!
//! A create against an existing ID fails with `409 ALREADY_EXISTS`; it
//! never overwrites.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use docmig_core::{EncodedValue, MigrationKey};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;
use zeroize::Zeroizing;

use crate::config::ConfigError;
use crate::error::FirestoreError;
use crate::retry::RetryPolicy;

// -- Request/Response types matching the Firestore REST schema ----------------

/// A document as returned by Firestore.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirestoreDocument {
    /// Full resource name:
    /// `projects/{p}/databases/{d}/documents/{collection}/{key}`.
    pub name: String,
    #[serde(default)]
    pub fields: BTreeMap<String, EncodedValue>,
    #[serde(default)]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub update_time: Option<DateTime<Utc>>,
}

impl FirestoreDocument {
    /// The final path segment of the resource name.
    pub fn id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

/// Outcome of a successful create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteResult {
    /// Full resource name of the created document.
    pub name: String,
    /// Server-assigned creation time, when reported.
    pub create_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct CreateDocumentRequest<'a> {
    fields: &'a BTreeMap<String, EncodedValue>,
}

/// The part of a found document an existence check needs.
#[derive(Debug, Deserialize)]
struct DocumentName {
    name: String,
}

/// Google API error envelope: `{"error": {"code", "message", "status"}}`.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

// -- Client -------------------------------------------------------------------

/// Client for the Firestore documents API.
#[derive(Clone)]
pub struct DocumentClient {
    http: reqwest::Client,
    documents_url: Url,
    api_key: Zeroizing<String>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for DocumentClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentClient")
            .field("documents_url", &self.documents_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl DocumentClient {
    pub(crate) fn new(
        http: reqwest::Client,
        documents_url: Url,
        api_key: Zeroizing<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            http,
            documents_url,
            api_key,
            retry,
        }
    }

    /// Fetch a document by collection and key.
    ///
    /// Calls `GET {documents}/{collection}/{key}`. Returns `Ok(None)` on 404.
    /// Transport failures and transient statuses are retried per the
    /// client's [`RetryPolicy`]; the lookup is idempotent. Every field must
    /// decode into an [`EncodedValue`].
    pub async fn get(
        &self,
        collection: &str,
        key: &MigrationKey,
    ) -> Result<Option<FirestoreDocument>, FirestoreError> {
        self.lookup(collection, key).await
    }

    /// Whether a document exists at `collection/key`.
    ///
    /// Only the resource name of a found document is read, so fields of
    /// any Firestore type (references, geo points, bytes) count as present.
    pub async fn exists(&self, collection: &str, key: &MigrationKey) -> Result<bool, FirestoreError> {
        let found = self.lookup::<DocumentName>(collection, key).await?;
        if let Some(doc) = &found {
            tracing::trace!(document = %doc.name, "document exists");
        }
        Ok(found.is_some())
    }

    async fn lookup<T: DeserializeOwned>(
        &self,
        collection: &str,
        key: &MigrationKey,
    ) -> Result<Option<T>, FirestoreError> {
        let endpoint = format!("GET /documents/{collection}/{key}");
        let url = self.resource_url(collection, Some(key))?;

        tracing::debug!(%endpoint, "Firestore point lookup");
        let resp = self
            .retry
            .send(|| {
                self.http
                    .get(url.clone())
                    .query(&[("key", self.api_key.as_str())])
                    .send()
            })
            .await
            .map_err(|e| FirestoreError::Http {
                endpoint: endpoint.clone(),
                source: e,
            })?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !resp.status().is_success() {
            let (status, body) = read_error(resp).await;
            return Err(FirestoreError::Api {
                endpoint,
                status,
                message: body.message,
            });
        }

        resp.json()
            .await
            .map(Some)
            .map_err(|e| FirestoreError::Deserialization {
                endpoint,
                source: e,
            })
    }

    /// Create a document with a caller-chosen key.
    ///
    /// Calls `POST {documents}/{collection}?documentId={key}`. An existing
    /// document yields [`FirestoreError::Conflict`]. Not retried.
    pub async fn create(
        &self,
        collection: &str,
        key: &MigrationKey,
        fields: &BTreeMap<String, EncodedValue>,
    ) -> Result<WriteResult, FirestoreError> {
        let endpoint = format!("POST /documents/{collection}?documentId={key}");
        let url = self.resource_url(collection, None)?;

        tracing::debug!(%endpoint, field_count = fields.len(), "Firestore create");
        let resp = self
            .http
            .post(url)
            .query(&[("documentId", key.as_str()), ("key", self.api_key.as_str())])
            .json(&CreateDocumentRequest { fields })
            .send()
            .await
            .map_err(|e| FirestoreError::Http {
                endpoint: endpoint.clone(),
                source: e,
            })?;

        if !resp.status().is_success() {
            let (status, body) = read_error(resp).await;
            if status == reqwest::StatusCode::CONFLICT.as_u16()
                || body.status.as_deref() == Some("ALREADY_EXISTS")
            {
                return Err(FirestoreError::Conflict {
                    collection: collection.to_string(),
                    key: key.to_string(),
                });
            }
            return Err(FirestoreError::Api {
                endpoint,
                status,
                message: body.message,
            });
        }

        let doc: FirestoreDocument = resp.json().await.map_err(|e| FirestoreError::Deserialization {
            endpoint,
            source: e,
        })?;
        Ok(WriteResult {
            name: doc.name,
            create_time: doc.create_time,
        })
    }

    /// `{documents}/{collection...}[/{key}]`. A collection path such as
    /// `users/u1/posts` addresses a subcollection.
    fn resource_url(&self, collection: &str, key: Option<&MigrationKey>) -> Result<Url, FirestoreError> {
        let mut url = self.documents_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                ConfigError::InvalidUrl(self.documents_url.to_string(), "URL cannot be a base".into())
            })?;
            segments.extend(collection.split('/').filter(|s| !s.is_empty()));
            if let Some(key) = key {
                segments.push(key.as_str());
            }
        }
        Ok(url)
    }
}

/// Drain an error response into its status and the best available message.
async fn read_error(resp: reqwest::Response) -> (u16, ErrorBody) {
    let status = resp.status().as_u16();
    let raw = resp.text().await.unwrap_or_default();
    let body = match serde_json::from_str::<ErrorEnvelope>(&raw) {
        Ok(envelope) if !envelope.error.message.is_empty() => envelope.error,
        Ok(envelope) => ErrorBody {
            message: raw,
            status: envelope.error.status,
        },
        Err(_) => ErrorBody {
            message: if raw.is_empty() {
                format!("HTTP {status} with empty body")
            } else {
                raw
            },
            status: None,
        },
    };
    (status, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> DocumentClient {
        let url = Url::parse("http://127.0.0.1:9/v1/projects/p/databases/(default)/documents").unwrap();
        DocumentClient::new(
            reqwest::Client::new(),
            url,
            Zeroizing::new("k".into()),
            RetryPolicy::default(),
        )
    }

    #[test]
    fn resource_url_percent_encodes_keys() {
        let key = MigrationKey::new("a b@x.com").unwrap();
        let url = client().resource_url("subscribers", Some(&key)).unwrap();
        assert!(url.as_str().ends_with("/documents/subscribers/a%20b@x.com"));
    }

    #[test]
    fn resource_url_supports_subcollections() {
        let url = client().resource_url("users/u1/posts", None).unwrap();
        assert!(url.as_str().ends_with("/documents/users/u1/posts"));
    }

    #[test]
    fn document_id_is_last_segment() {
        let doc = FirestoreDocument {
            name: "projects/p/databases/(default)/documents/subscribers/a@x.com".into(),
            fields: BTreeMap::new(),
            create_time: None,
            update_time: None,
        };
        assert_eq!(doc.id(), "a@x.com");
    }

    #[test]
    fn debug_redacts_api_key() {
        let rendered = format!("{:?}", client());
        assert!(rendered.contains("[REDACTED]"));
    }
}
