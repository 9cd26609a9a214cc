//! Domain layer with core cache entities, errors, and port definitions.

/// Entity definitions.
pub mod entities;
/// Error types.
pub mod errors;
/// Port definitions.
pub mod ports;

pub use entities::{CacheKey, CachedBitmap, ImageSource, LoadedImage, MetricsSnapshot};
pub use errors::{CacheError, CacheResult, FetchError, TransformError};
pub use ports::{ImageCachePort, ImageFetchPort, ImageSlot, WeakHandle};
