//! Domain types for cached images.

use std::borrow::Borrow;
use std::sync::Arc;

use image::DynamicImage;
use sha2::{Digest, Sha256};

use crate::domain::errors::{CacheError, CacheResult};

const HTTP_SCHEMES: [&str; 2] = ["http://", "https://"];

/// Key of a cached image: the source URL, kept verbatim.
///
/// Only `http://` and `https://` URLs with something after the scheme are
/// accepted, so every key that reaches a cache tier is fetchable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Validates a URL and wraps it as a key.
    ///
    /// # Errors
    /// Returns [`CacheError::InvalidUrl`] for empty or non-http(s) input.
    pub fn parse(url: &str) -> CacheResult<Self> {
        if is_http_url(url) {
            Ok(Self(url.to_owned()))
        } else {
            Err(CacheError::invalid_url(url))
        }
    }

    /// Returns the URL.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercase hex SHA-256 of the URL, used as the on-disk file name.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.0.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for CacheKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for CacheKey {
    type Error = CacheError;

    fn try_from(url: &str) -> Result<Self, Self::Error> {
        Self::parse(url)
    }
}

/// Returns true for a non-empty `http://` or `https://` URL.
#[must_use]
pub fn is_http_url(url: &str) -> bool {
    HTTP_SCHEMES
        .iter()
        .any(|scheme| url.strip_prefix(scheme).is_some_and(|rest| !rest.is_empty()))
}

/// A decoded square thumbnail.
///
/// Only the image transform constructs these; once built they are never
/// mutated and are shared through `Arc` between the memory cache and callers.
#[derive(Clone)]
pub struct CachedBitmap {
    image: DynamicImage,
}

impl CachedBitmap {
    pub(crate) const fn new(image: DynamicImage) -> Self {
        Self { image }
    }

    /// Edge length in pixels.
    #[must_use]
    pub fn size(&self) -> u32 {
        self.image.width()
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Whether the decoded source carried an alpha channel.
    #[must_use]
    pub fn has_alpha(&self) -> bool {
        self.image.color().has_alpha()
    }

    /// Borrows the underlying image.
    #[must_use]
    pub const fn as_image(&self) -> &DynamicImage {
        &self.image
    }

    /// Copies the pixels out as RGBA8.
    #[must_use]
    pub fn to_rgba8(&self) -> image::RgbaImage {
        self.image.to_rgba8()
    }
}

impl std::fmt::Debug for CachedBitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedBitmap")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("has_alpha", &self.has_alpha())
            .finish()
    }
}

/// Where an image was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    /// Loaded from in-memory LRU cache.
    MemoryCache,
    /// Loaded from disk cache.
    DiskCache,
    /// Downloaded from network.
    Network,
}

impl std::fmt::Display for ImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MemoryCache => write!(f, "memory"),
            Self::DiskCache => write!(f, "disk"),
            Self::Network => write!(f, "network"),
        }
    }
}

/// A resolved image together with where it came from.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    /// The cache key.
    pub key: CacheKey,
    /// The decoded bitmap.
    pub image: Arc<CachedBitmap>,
    /// The tier that produced it.
    pub source: ImageSource,
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_parse_accepts_http_and_https() {
        assert!(CacheKey::parse("https://example.com/a.png").is_ok());
        assert!(CacheKey::parse("http://example.com/a.png").is_ok());
    }

    #[test_case("" ; "empty")]
    #[test_case("http://" ; "http_without_rest")]
    #[test_case("https://" ; "https_without_rest")]
    #[test_case("ftp://example.com/a.png" ; "ftp_scheme")]
    #[test_case("example.com/a.png" ; "no_scheme")]
    #[test_case("file:///tmp/x" ; "file_scheme")]
    fn test_parse_rejects(url: &str) {
        assert!(matches!(
            CacheKey::parse(url),
            Err(CacheError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_fingerprint_is_full_sha256_hex() {
        let key = CacheKey::parse("https://example.com/image.png").unwrap();
        let fp = key.fingerprint();
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_fingerprint_consistency() {
        let a = CacheKey::parse("https://example.com/image.png").unwrap();
        let b = CacheKey::parse("https://example.com/image.png").unwrap();
        let c = CacheKey::parse("https://example.com/other.png").unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn test_fingerprint_known_vector() {
        let key = CacheKey::parse("https://a").unwrap();
        let mut hasher = Sha256::new();
        hasher.update(b"https://a");
        assert_eq!(key.fingerprint(), hex::encode(hasher.finalize()));
    }
}
