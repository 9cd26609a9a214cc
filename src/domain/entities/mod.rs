//! Domain entity definitions.

mod image;
mod metrics;

pub use image::{CacheKey, CachedBitmap, ImageSource, LoadedImage, is_http_url};
pub use metrics::MetricsSnapshot;
