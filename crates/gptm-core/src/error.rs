//! Provider error taxonomy.
//!
//! Every backend reports failures through [`ProviderError`]. The variants keep
//! enough structure (status code, timeout, wrapped cause) for a retry loop to
//! decide between "try again" and "give up now".

use std::time::Duration;

use thiserror::Error;

/// Result type for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Errors produced by backends, the rate limiter, and provider construction.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Connection refused, DNS failure, broken body stream.
    #[error("transport error: {0}")]
    Transport(String),

    /// The per-call deadline expired before a response arrived.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Non-2xx response.
    #[error("request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    /// A 2xx body that could not be parsed.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// A 2xx body carrying an `error` object.
    #[error("API returned error: {0}")]
    Api(String),

    /// A 2xx body with no choices.
    #[error("no response content generated")]
    EmptyResponse,

    /// The outgoing request could not be encoded.
    #[error("failed to serialize request: {0}")]
    Serialization(String),

    /// Rejected before any I/O.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A required configuration value is missing.
    #[error("configuration error: {0}")]
    Config(String),

    /// Rejected by the admission gate.
    #[error("rate limit of {limit} requests exceeded, resets at {reset_at}")]
    RateLimited {
        limit: u32,
        reset_at: chrono::DateTime<chrono::Utc>,
    },

    /// Every attempt failed; `source` is the last recorded cause.
    #[error("all {attempts} attempts failed: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<ProviderError>,
    },
}

impl ProviderError {
    /// Whether this is a 4xx response.
    pub fn is_client_error(&self) -> bool {
        matches!(self, ProviderError::Status { status, .. } if (400..500).contains(status))
    }

    /// Whether a later attempt with the same input might succeed.
    ///
    /// Network, server and malformed-body failures are retryable. Client
    /// errors and anything raised before I/O are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Transport(_)
            | ProviderError::Timeout(_)
            | ProviderError::Decode(_)
            | ProviderError::Api(_)
            | ProviderError::EmptyResponse => true,
            ProviderError::Status { .. } => !self.is_client_error(),
            ProviderError::Serialization(_)
            | ProviderError::InvalidRequest(_)
            | ProviderError::Config(_)
            | ProviderError::RateLimited { .. }
            | ProviderError::RetriesExhausted { .. } => false,
        }
    }

    /// HTTP status carried by this error, looking through a retry wrapper.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Status { status, .. } => Some(*status),
            ProviderError::RetriesExhausted { source, .. } => source.status(),
            _ => None,
        }
    }
}
