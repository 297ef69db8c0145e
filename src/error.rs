//! Error types
//!
//! Store and provider failures. Routing failures stay `anyhow` and are
//! answered with an apology at the top of the router.

use thiserror::Error;

/// Persistent store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database could not be opened or its schema created
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A single read/write failed after startup
    #[error("Store operation failed: {0}")]
    OperationFailed(#[from] rusqlite::Error),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Language-model provider errors
///
/// Never leaves the assistant component; only selects the fallback reply.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Provider error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Invalid response: {0}")]
    Decode(String),
}

impl ProviderError {
    /// Classify a transport-level reqwest failure
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }

    /// Classify a non-success HTTP status
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => Self::Authentication(body),
            429 => Self::RateLimited,
            _ => Self::Api { status, body },
        }
    }

    /// Worth one more attempt at the client layer
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout | Self::RateLimited => true,
            Self::Api { status, .. } => *status >= 500,
            Self::Authentication(_) | Self::Decode(_) => false,
        }
    }
}
