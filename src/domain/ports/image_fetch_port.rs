//! Port definition for fetching image bytes.

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::errors::FetchError;

/// Port for retrieving the raw bytes behind an image URL.
///
/// Implementations apply their own timeout; the cache never imposes one.
#[async_trait]
pub trait ImageFetchPort: Send + Sync {
    /// Performs a GET and returns the full response body.
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError>;
}
