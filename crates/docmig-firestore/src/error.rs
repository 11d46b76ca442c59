//! Firestore client error types.

/// Errors from Firestore REST calls.
#[derive(Debug, thiserror::Error)]
pub enum FirestoreError {
    /// HTTP transport error (connection refused, timeout, TLS).
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },
    /// Firestore returned a non-2xx status. `message` is Google's
    /// `error.message` when the body carries one, otherwise the raw body.
    #[error("Firestore {endpoint} returned {status}: {message}")]
    Api {
        endpoint: String,
        status: u16,
        message: String,
    },
    /// A create-with-key found the document already present.
    #[error("document {collection}/{key} already exists")]
    Conflict { collection: String, key: String },
    /// Response deserialization failed.
    #[error("failed to deserialize response from {endpoint}: {source}")]
    Deserialization {
        endpoint: String,
        source: reqwest::Error,
    },
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),
}

impl FirestoreError {
    /// Whether the failure happened below HTTP (no response was received).
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Http { .. })
    }
}
