//! Decode error types.

use thiserror::Error;

/// Reasons a byte buffer could not become a thumbnail.
#[derive(Debug, Clone, Error)]
#[allow(missing_docs)]
pub enum TransformError {
    #[error("empty input")]
    EmptyInput,

    #[error("unrecognised image format")]
    UnknownFormat,

    #[error("image has zero dimensions ({width}x{height})")]
    ZeroDimensions { width: u32, height: u32 },

    #[error("image exceeds decode limits: {0}")]
    TooLarge(String),

    #[error("decode failed: {0}")]
    Decode(String),
}

impl TransformError {
    /// Whether the bytes themselves are bad. A source that is merely too
    /// large for the decode limits is still a valid image.
    #[must_use]
    pub const fn is_corrupt(&self) -> bool {
        !matches!(self, Self::TooLarge(_))
    }
}

impl From<image::ImageError> for TransformError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::Unsupported(_) => Self::UnknownFormat,
            image::ImageError::Limits(limit) => Self::TooLarge(limit.to_string()),
            other => Self::Decode(other.to_string()),
        }
    }
}
