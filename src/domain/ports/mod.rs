mod image_cache_port;
mod image_fetch_port;
mod image_slot_port;

pub use image_cache_port::ImageCachePort;
pub use image_fetch_port::ImageFetchPort;
pub use image_slot_port::{ImageSlot, WeakHandle};

#[cfg(test)]
pub mod mocks {
    pub use super::image_fetch_port::mock::MockImageFetcher;
    pub use super::image_slot_port::mock::MockSlot;
}
