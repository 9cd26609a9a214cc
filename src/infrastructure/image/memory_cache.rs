//! In-memory LRU image cache implementation.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::domain::entities::{CacheKey, CachedBitmap};

/// Default maximum number of bitmaps resident in memory.
pub const DEFAULT_CACHE_CAPACITY: usize = 200;

/// Strict LRU map from URL to decoded bitmap.
///
/// Reads promote the entry to most-recently-used. Capacity is enforced after
/// each insertion by dropping least-recently-used entries.
pub struct MemoryImageCache {
    cache: Mutex<LruCache<CacheKey, Arc<CachedBitmap>>>,
}

impl MemoryImageCache {
    /// Creates a new cache with the specified capacity (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(cap)),
        }
    }

    /// Returns the bitmap for `key`, touching it on a hit.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<CachedBitmap>> {
        let mut cache = self.cache.lock();
        let hit = cache.get(key).cloned();
        trace!(url = %key, hit = hit.is_some(), "Memory cache lookup");
        hit
    }

    /// Marks `key` as most recently used. Returns whether it was resident.
    pub fn touch(&self, key: &CacheKey) -> bool {
        self.cache.lock().get(key).is_some()
    }

    /// Inserts or replaces `key` as most recently used.
    ///
    /// Returns the key evicted to make room, if any. Replacing an existing
    /// key never evicts.
    pub fn put(&self, key: CacheKey, bitmap: Arc<CachedBitmap>) -> Option<CacheKey> {
        let mut cache = self.cache.lock();
        match cache.push(key.clone(), bitmap) {
            Some((evicted, _)) if evicted != key => {
                debug!(url = %evicted, "Evicted image from memory cache");
                Some(evicted)
            }
            _ => {
                trace!(url = %key, "Stored image in memory cache");
                None
            }
        }
    }

    /// Number of resident bitmaps.
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    /// Returns true if nothing is resident.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of resident bitmaps.
    pub fn capacity(&self) -> usize {
        self.cache.lock().cap().get()
    }

    /// Resident keys from least to most recently used.
    pub fn resident_keys(&self) -> Vec<CacheKey> {
        let cache = self.cache.lock();
        let mut keys: Vec<CacheKey> = cache.iter().map(|(key, _)| key.clone()).collect();
        keys.reverse();
        keys
    }
}

impl std::fmt::Debug for MemoryImageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryImageCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}
