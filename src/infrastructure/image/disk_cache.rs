//! Disk-based image cache for persistence across sessions.
//!
//! A flat directory of files named by the SHA-256 fingerprint of the source
//! URL, each holding the raw bytes last fetched for it. There is no size cap
//! and no expiry; entries are only removed when found corrupt.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, trace, warn};

use crate::domain::entities::CacheKey;
use crate::domain::errors::{CacheError, CacheResult};

/// Disk-based cache that persists raw image bytes.
#[derive(Debug)]
pub struct DiskImageCache {
    cache_dir: PathBuf,
    reads: AtomicU64,
}

impl DiskImageCache {
    /// Opens a cache rooted at `cache_dir`, creating the directory if needed.
    ///
    /// # Errors
    /// Returns error if the cache directory cannot be created.
    pub fn open(cache_dir: PathBuf) -> CacheResult<Self> {
        fs::create_dir_all(&cache_dir)
            .map_err(|e| CacheError::Io(format!("Failed to create cache dir: {e}")))?;
        debug!(path = %cache_dir.display(), "Using disk image cache");
        Ok(Self {
            cache_dir,
            reads: AtomicU64::new(0),
        })
    }

    /// Opens a cache in the default location (`~/.cache/thumbcache/images/`).
    ///
    /// # Errors
    /// Returns error if cache directory cannot be created.
    pub fn default_location() -> CacheResult<Self> {
        Self::open(default_cache_dir())
    }

    /// Returns the cache directory.
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Returns the file that holds (or would hold) the bytes for `key`.
    #[must_use]
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.cache_dir.join(key.fingerprint())
    }

    /// Reads the raw bytes for `key`. A missing entry is a miss, not an error.
    pub fn read(&self, key: &CacheKey) -> Option<Vec<u8>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let path = self.path_for(key);
        if !path.is_file() {
            trace!(url = %key, path = %path.display(), "Disk cache miss");
            return None;
        }
        match fs::read(&path) {
            Ok(bytes) => {
                trace!(url = %key, path = %path.display(), len = bytes.len(), "Disk cache hit");
                Some(bytes)
            }
            Err(e) => {
                warn!(url = %key, path = %path.display(), error = %e, "Failed to read cache file");
                None
            }
        }
    }

    /// Stores raw bytes for `key`, replacing any previous entry.
    ///
    /// Bytes go to a temporary file in the cache directory that is then
    /// renamed over the target, so readers never observe a partial file.
    ///
    /// # Errors
    /// Returns [`CacheError::DiskWrite`] if the file cannot be written.
    pub fn write(&self, key: &CacheKey, bytes: &[u8]) -> CacheResult<()> {
        let path = self.path_for(key);

        let mut temp_file = tempfile::NamedTempFile::new_in(&self.cache_dir)
            .map_err(|e| CacheError::disk_write(&path, e))?;
        temp_file
            .write_all(bytes)
            .map_err(|e| CacheError::disk_write(&path, e))?;
        temp_file
            .persist(&path)
            .map_err(|e| CacheError::disk_write(&path, e.error))?;

        debug!(url = %key, path = %path.display(), size = bytes.len(), "Stored image in disk cache");
        Ok(())
    }

    /// Removes the entry for `key`. Returns whether a file was deleted.
    pub fn delete(&self, key: &CacheKey) -> bool {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(url = %key, path = %path.display(), "Deleted disk cache entry");
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!(url = %key, path = %path.display(), error = %e, "Failed to delete cache file");
                false
            }
        }
    }

    /// Checks if an entry exists for `key`.
    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.path_for(key).is_file()
    }

    /// Number of read attempts served so far.
    #[must_use]
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }
}

/// Returns the default cache directory path.
#[must_use]
pub fn default_cache_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "thumbcache", "thumbcache").map_or_else(
        || std::env::temp_dir().join("thumbcache").join("images"),
        |dirs| dirs.cache_dir().join("images"),
    )
}
