//! Firestore client configuration.
//!
//! Defaults point to the production Firestore endpoint and the `(default)`
//! database. Override via environment variables or explicit construction
//! for the emulator or for tests.

use std::time::Duration;

use url::Url;
use zeroize::Zeroizing;

use crate::retry::RetryPolicy;

/// Configuration for connecting to the Firestore REST API.
///
/// Custom `Debug` implementation redacts the `api_key` field
/// to prevent credential leakage in log output.
#[derive(Clone)]
pub struct FirestoreConfig {
    /// Base URL of the REST API.
    /// Default: <https://firestore.googleapis.com>
    pub base_url: Url,
    /// Google Cloud project identifier.
    pub project_id: String,
    /// Database identifier. Default: `(default)`.
    pub database_id: String,
    /// Web API key, sent as the `key` query parameter.
    pub api_key: Zeroizing<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Backoff for point lookups.
    pub retry: RetryPolicy,
}

impl std::fmt::Debug for FirestoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirestoreConfig")
            .field("base_url", &self.base_url)
            .field("project_id", &self.project_id)
            .field("database_id", &self.database_id)
            .field("api_key", &"[REDACTED]")
            .field("timeout_secs", &self.timeout_secs)
            .field("retry", &self.retry)
            .finish()
    }
}

impl FirestoreConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `FIRESTORE_PROJECT_ID` (required)
    /// - `FIRESTORE_API_KEY` (required)
    /// - `FIRESTORE_DATABASE` (default: `(default)`)
    /// - `FIRESTORE_BASE_URL` (default: `https://firestore.googleapis.com`)
    /// - `FIRESTORE_TIMEOUT_SECS` (default: 30, must be positive)
    /// - `FIRESTORE_MAX_RETRIES` (default: 3)
    pub fn from_env() -> Result<Self, ConfigError> {
        let project_id = required_var("FIRESTORE_PROJECT_ID")?;
        let api_key = Zeroizing::new(required_var("FIRESTORE_API_KEY")?);

        Ok(Self {
            base_url: env_url("FIRESTORE_BASE_URL", "https://firestore.googleapis.com")?,
            project_id,
            database_id: std::env::var("FIRESTORE_DATABASE")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "(default)".to_string()),
            api_key,
            timeout_secs: env_positive("FIRESTORE_TIMEOUT_SECS")?.unwrap_or(30),
            retry: RetryPolicy {
                max_retries: env_parse("FIRESTORE_MAX_RETRIES")?
                    .unwrap_or(RetryPolicy::default().max_retries),
                ..RetryPolicy::default()
            },
        })
    }

    /// Create a configuration pointing to a local mock server (for testing).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidUrl` if `base_url` cannot be parsed.
    pub fn local_mock(base_url: &str, project_id: &str, api_key: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: Url::parse(base_url)
                .map_err(|e| ConfigError::InvalidUrl(base_url.to_string(), e.to_string()))?,
            project_id: project_id.to_string(),
            database_id: "(default)".to_string(),
            api_key: Zeroizing::new(api_key.to_string()),
            timeout_secs: 5,
            retry: RetryPolicy {
                max_retries: 3,
                base_delay: Duration::from_millis(10),
            },
        })
    }

    /// URL of the `documents` root for the configured project and database.
    ///
    /// Path segments are percent-encoded, so the project and database IDs
    /// are taken literally.
    pub fn documents_url(&self) -> Result<Url, ConfigError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                ConfigError::InvalidUrl(self.base_url.to_string(), "URL cannot be a base".into())
            })?
            .pop_if_empty()
            .extend([
                "v1",
                "projects",
                self.project_id.as_str(),
                "databases",
                self.database_id.as_str(),
                "documents",
            ]);
        Ok(url)
    }
}

fn required_var(var: &'static str) -> Result<String, ConfigError> {
    std::env::var(var)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .ok_or(ConfigError::MissingVar(var))
}

fn env_parse<T: std::str::FromStr>(var: &'static str) -> Result<Option<T>, ConfigError> {
    match std::env::var(var) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber(var, raw)),
        _ => Ok(None),
    }
}

fn env_positive(var: &'static str) -> Result<Option<u64>, ConfigError> {
    match env_parse::<u64>(var)? {
        Some(0) => Err(ConfigError::NotPositive(var)),
        other => Ok(other),
    }
}

fn env_url(var: &str, default: &str) -> Result<Url, ConfigError> {
    let raw = std::env::var(var).unwrap_or_else(|_| default.to_string());
    Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string()))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    MissingVar(&'static str),
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("{0} must be a non-negative integer, got \"{1}\"")]
    InvalidNumber(&'static str, String),
    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_mock_builds_valid_config() {
        let cfg = FirestoreConfig::local_mock("http://127.0.0.1:9000", "site", "k").unwrap();
        assert_eq!(cfg.api_key.as_str(), "k");
        assert_eq!(cfg.timeout_secs, 5);
        assert_eq!(cfg.database_id, "(default)");
    }

    #[test]
    fn documents_url_appends_project_path() {
        let cfg = FirestoreConfig::local_mock("http://127.0.0.1:9000", "my-site", "k").unwrap();
        assert_eq!(
            cfg.documents_url().unwrap().as_str(),
            "http://127.0.0.1:9000/v1/projects/my-site/databases/(default)/documents"
        );
    }

    #[test]
    fn documents_url_keeps_base_path_prefix() {
        let cfg = FirestoreConfig::local_mock("http://127.0.0.1:9000/proxy/", "p", "k").unwrap();
        assert_eq!(
            cfg.documents_url().unwrap().as_str(),
            "http://127.0.0.1:9000/proxy/v1/projects/p/databases/(default)/documents"
        );
    }

    #[test]
    fn debug_redacts_api_key() {
        let cfg = FirestoreConfig::local_mock("http://127.0.0.1:9000", "p", "super-secret").unwrap();
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn env_url_uses_default_when_var_absent() {
        let url = env_url("NONEXISTENT_VAR_DOCMIG_12345", "https://example.com").unwrap();
        assert_eq!(url.as_str(), "https://example.com/");
    }

    #[test]
    fn env_url_rejects_invalid_url() {
        std::env::set_var("TEST_BAD_URL_DOCMIG", "not a url");
        let result = env_url("TEST_BAD_URL_DOCMIG", "https://example.com");
        std::env::remove_var("TEST_BAD_URL_DOCMIG");
        assert!(result.is_err());
    }

    #[test]
    fn env_parse_rejects_garbage() {
        std::env::set_var("TEST_BAD_NUMBER_DOCMIG", "three");
        let result = env_parse::<u32>("TEST_BAD_NUMBER_DOCMIG");
        std::env::remove_var("TEST_BAD_NUMBER_DOCMIG");
        assert!(matches!(result, Err(ConfigError::InvalidNumber(_, raw)) if raw == "three"));
        assert_eq!(env_parse::<u32>("NONEXISTENT_VAR_DOCMIG_12345").unwrap(), None);
    }

    #[test]
    fn timeout_must_be_a_positive_number() {
        std::env::set_var("TEST_TIMEOUT_ZERO_DOCMIG", "0");
        std::env::set_var("TEST_TIMEOUT_WORDS_DOCMIG", "thirty");
        std::env::set_var("TEST_TIMEOUT_OK_DOCMIG", " 45 ");
        let zero = env_positive("TEST_TIMEOUT_ZERO_DOCMIG");
        let words = env_positive("TEST_TIMEOUT_WORDS_DOCMIG");
        let ok = env_positive("TEST_TIMEOUT_OK_DOCMIG");
        std::env::remove_var("TEST_TIMEOUT_ZERO_DOCMIG");
        std::env::remove_var("TEST_TIMEOUT_WORDS_DOCMIG");
        std::env::remove_var("TEST_TIMEOUT_OK_DOCMIG");

        assert!(matches!(zero, Err(ConfigError::NotPositive("TEST_TIMEOUT_ZERO_DOCMIG"))));
        assert!(matches!(words, Err(ConfigError::InvalidNumber(_, raw)) if raw == "thirty"));
        assert_eq!(ok.unwrap(), Some(45));
        assert_eq!(env_positive("NONEXISTENT_VAR_DOCMIG_12345").unwrap(), None);
    }

    #[test]
    fn required_var_rejects_blank_values() {
        std::env::set_var("TEST_BLANK_VAR_DOCMIG", "  ");
        let result = required_var("TEST_BLANK_VAR_DOCMIG");
        std::env::remove_var("TEST_BLANK_VAR_DOCMIG");
        assert!(matches!(result, Err(ConfigError::MissingVar("TEST_BLANK_VAR_DOCMIG"))));
    }
}
