//! Port definition for the image cache as seen by UI collaborators.

use std::sync::Arc;

use async_trait::async_trait;

use super::WeakHandle;
use crate::domain::entities::{CachedBitmap, LoadedImage, MetricsSnapshot};
use crate::domain::errors::CacheResult;

/// Operations UI code uses to obtain thumbnails.
///
/// Invalid URLs are silent no-ops everywhere except [`ImageCachePort::load`],
/// which reports them to its caller.
#[async_trait]
pub trait ImageCachePort: Send + Sync {
    /// Warms the caches for `url` without any UI attached.
    fn prefetch(&self, url: &str);

    /// Returns a cached bitmap without touching the network.
    fn try_load_cached(&self, url: &str) -> Option<Arc<CachedBitmap>>;

    /// Resolves `url` and applies the result to `target`, hiding `fallback`
    /// on success. Never blocks.
    fn download_async(&self, url: &str, target: WeakHandle, fallback: WeakHandle);

    /// Resolves `url` through every tier and returns the bitmap.
    async fn load(&self, url: &str) -> CacheResult<LoadedImage>;

    /// Returns the current counters.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}
