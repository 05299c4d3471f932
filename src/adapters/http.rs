//! Shared plumbing for HTTP provider adapters.

use std::time::Duration;

use crate::domain::errors::{RagError, RagResult};

/// Build a client with a per-request timeout.
pub fn build_client(timeout_secs: u64) -> RagResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| RagError::Config(format!("failed to build HTTP client: {e}")))
}

/// Map a transport failure: timeouts become `UpstreamTimeout`, everything
/// else the provider-specific unavailable error.
pub fn transport_error(
    err: &reqwest::Error,
    operation: &'static str,
    unavailable: fn(String) -> RagError,
) -> RagError {
    if err.is_timeout() {
        RagError::UpstreamTimeout { operation }
    } else {
        unavailable(format!("{operation} request failed: {err}"))
    }
}

/// Turn a non-success response into the provider's unavailable error.
pub async fn status_error(
    response: reqwest::Response,
    operation: &'static str,
    unavailable: fn(String) -> RagError,
) -> RagError {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "unable to read response body".to_string());
    unavailable(format!("{operation} API returned {status}: {body}"))
}

/// Resolve an API key from config, then from `env_var`.
pub fn api_key(configured: Option<&String>, env_var: &str) -> Option<String> {
    configured
        .cloned()
        .filter(|k| !k.is_empty())
        .or_else(|| std::env::var(env_var).ok().filter(|k| !k.is_empty()))
}
