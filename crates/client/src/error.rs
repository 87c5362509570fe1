//! Error types for the KV client.

use thiserror::Error;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur during KV client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    /// A required parameter is missing or malformed. Never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response from the remote API.
    #[error("API error ({status}) at {url}: {message}")]
    Api {
        status: u16,
        url: String,
        message: String,
    },

    /// HTTP 2xx carrying an envelope with `success == false`.
    #[error("failed to {operation}: {message}")]
    EnvelopeFailure {
        operation: &'static str,
        message: String,
    },

    /// Response body did not match the expected shape.
    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    /// Maximum retries exceeded for a rate-limited request.
    #[error("Maximum retries exceeded ({attempts} attempts): {source}")]
    MaxRetriesExceeded {
        attempts: usize,
        #[source]
        source: Box<ClientError>,
    },

    /// Invalid base URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Named resource does not exist.
    #[error("Resource not found: {0}")]
    NotFound(String),
}

impl ClientError {
    /// Whether a retry budget may reasonably be spent on this error.
    ///
    /// Transport failures, 5xx responses and exhausted rate limits are
    /// transient; validation and envelope failures are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Api { status, .. } => *status == 429 || (500..=599).contains(status),
            Self::MaxRetriesExceeded { .. } => true,
            _ => false,
        }
    }

    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::MaxRetriesExceeded { source, .. } => source.status(),
            _ => None,
        }
    }
}
