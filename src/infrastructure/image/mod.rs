//! Image handling infrastructure.
//!
//! This module provides:
//! - Memory caching with LRU eviction
//! - Disk caching for persistence
//! - Cover-crop thumbnail decoding
//! - A bounded fetch pipeline behind the [`ImageCache`] facade

pub mod disk_cache;
pub mod fetch_limiter;
pub mod http_fetcher;
pub mod loader;
pub mod memory_cache;
pub mod metrics;
pub mod transform;

#[cfg(test)]
mod test_support;

pub use disk_cache::{DiskImageCache, default_cache_dir};
pub use fetch_limiter::{Admission, DEFAULT_MAX_CONCURRENT_FETCHES, Drain, FetchLimiter};
pub use http_fetcher::{DEFAULT_TIMEOUT_SECS, HttpImageFetcher};
pub use loader::{CacheStatus, DEFAULT_METRICS_INTERVAL, ImageCache, ImageCacheConfig};
pub use memory_cache::{DEFAULT_CACHE_CAPACITY, MemoryImageCache};
pub use metrics::{CacheMetrics, Counter};
pub use transform::{DEFAULT_DECODE_SIZE, MAX_DECODE_SIZE, MIN_DECODE_SIZE};
