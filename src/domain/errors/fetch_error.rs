//! Transport error types.

use thiserror::Error;

/// Failure to obtain a response body from the network.
#[derive(Debug, Clone, Error)]
#[allow(missing_docs)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("HTTP {status}: {reason}")]
    Status { status: u16, reason: String },

    #[error("failed to read body: {0}")]
    Body(String),
}

impl FetchError {
    /// Creates a status error from a numeric code.
    #[must_use]
    pub fn status(status: u16, reason: impl Into<String>) -> Self {
        Self::Status {
            status,
            reason: reason.into(),
        }
    }
}
