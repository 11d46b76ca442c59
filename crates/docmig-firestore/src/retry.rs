//! Backoff for idempotent Firestore calls.
//!
//! A lookup is retried when no response arrives (connect failure, timeout)
//! and when Firestore answers with a status it documents as transient.
//! Creates never go through here: a retried create could observe its own
//! first attempt and report a spurious conflict.

use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;

/// How often and how patiently a lookup is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one. Zero disables retrying.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each one after.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    /// Three retries at 200ms, 400ms, 800ms.
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (zero-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Send with backoff. The last outcome is returned as-is, so a request
    /// that keeps answering 503 yields that 503 response.
    pub(crate) async fn send<F, Fut>(&self, f: F) -> Result<reqwest::Response, reqwest::Error>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
    {
        let mut attempt = 0;
        loop {
            let outcome = f().await;
            let reason = match &outcome {
                Ok(resp) if is_transient(resp.status()) => Some(resp.status().to_string()),
                Ok(_) => None,
                Err(e) => Some(e.to_string()),
            };
            let Some(reason) = reason else {
                return outcome;
            };
            if attempt >= self.max_retries {
                return outcome;
            }
            let delay = self.delay(attempt);
            attempt += 1;
            tracing::warn!(
                attempt,
                max_retries = self.max_retries,
                "Firestore lookup failed ({reason}), retrying in {delay:?}"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// `ABORTED`, `RESOURCE_EXHAUSTED`, `INTERNAL`, `UNAVAILABLE`, and gateway
/// timeouts.
fn is_transient(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::CONFLICT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}
