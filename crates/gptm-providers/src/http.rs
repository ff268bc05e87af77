//! Shared HTTP plumbing: client construction, error mapping, body decoding.

use std::time::Duration;

use gptm_core::error::{ProviderError, Result};
use serde::de::DeserializeOwned;

/// Build a client whose every request is bounded by `timeout`.
pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ProviderError::Config(format!("failed to build HTTP client: {e}")))
}

/// Classify a reqwest failure as a timeout or a generic transport error.
pub(crate) fn transport_error(err: reqwest::Error, timeout: Duration) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(timeout)
    } else {
        ProviderError::Transport(err.to_string())
    }
}

/// Read the whole body, failing with `Status` on any non-2xx response.
///
/// The body is always drained, so the connection is released on every path.
pub(crate) async fn read_success_body(
    response: reqwest::Response,
    timeout: Duration,
) -> Result<Vec<u8>> {
    let status = response.status();
    let body = response
        .bytes()
        .await
        .map_err(|e| transport_error(e, timeout))?;

    if !status.is_success() {
        return Err(ProviderError::Status {
            status: status.as_u16(),
            body: String::from_utf8_lossy(&body).into_owned(),
        });
    }
    Ok(body.to_vec())
}

/// Decode a JSON body, mapping parse failures to `Decode`.
pub(crate) fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| ProviderError::Decode(e.to_string()))
}
