//! Cache error types.

use std::path::PathBuf;

use thiserror::Error;

use super::{FetchError, TransformError};

/// Result type for cache operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Errors that can occur during cache operations.
///
/// None of these reach UI collaborators: the facade absorbs them, counts
/// them, and leaves the fallback in place.
#[derive(Debug, Clone, Error)]
#[allow(missing_docs)]
pub enum CacheError {
    #[error("invalid image url: {url:?}")]
    InvalidUrl { url: String },

    #[error("transport failure: {0}")]
    Transport(#[from] FetchError),

    #[error("invalid image payload: {0}")]
    InvalidImagePayload(#[from] TransformError),

    #[error("failed to write cache file {}: {message}", path.display())]
    DiskWrite { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(String),

    #[error("runtime error: {0}")]
    Runtime(String),

    #[error("fetch was abandoned before completing")]
    Abandoned,
}

impl CacheError {
    /// Creates an invalid url error.
    #[must_use]
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a disk write error.
    #[must_use]
    pub fn disk_write(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        Self::DiskWrite {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Returns whether the failure happened in the network transport.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Returns whether the payload was rejected by the decoder.
    #[must_use]
    pub const fn is_invalid_payload(&self) -> bool {
        matches!(self, Self::InvalidImagePayload(_))
    }
}
