//! Error types for the orchestration engine.

use thiserror::Error;

use kvbulk_client::ClientError;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Why an orchestration was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelCause {
    /// The per-operation deadline elapsed.
    DeadlineExceeded,
    /// The caller cancelled through the shared token.
    CallerRequested,
}

impl std::fmt::Display for CancelCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DeadlineExceeded => write!(f, "deadline exceeded"),
            Self::CallerRequested => write!(f, "cancelled by caller"),
        }
    }
}

/// Errors that can occur during engine orchestrations.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Error from the underlying HTTP client.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// The operation was cancelled before completion.
    #[error("operation cancelled: {cause}")]
    Cancelled { cause: CancelCause },

    /// A worker task failed outside its unit of work (panic or runtime error).
    #[error("worker task failed: {0}")]
    Worker(String),

    /// A streaming callback asked the enumeration to stop.
    #[error("stream consumer stopped: {0}")]
    ConsumerStopped(String),
}

impl EngineError {
    /// Convenience constructor for caller-initiated cancellation.
    pub fn cancelled() -> Self {
        Self::Cancelled {
            cause: CancelCause::CallerRequested,
        }
    }

    /// Whether this error is a cancellation, and if so, why.
    pub fn cancel_cause(&self) -> Option<CancelCause> {
        match self {
            Self::Cancelled { cause } => Some(*cause),
            _ => None,
        }
    }
}
