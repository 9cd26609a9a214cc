//! Infrastructure layer with external service adapters.

/// Application configuration.
pub mod config;
/// Image handling (caching, decoding, fetching).
pub mod image;

pub use config::{CacheConfig, CliArgs, ConfigError, ConfigStore, LogLevel};
pub use image::{
    CacheMetrics, CacheStatus, DiskImageCache, HttpImageFetcher, ImageCache, ImageCacheConfig,
    MemoryImageCache,
};
