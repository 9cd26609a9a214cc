//! Image cache facade.
//!
//! Implements a two-tier cache in front of the network: Memory -> Disk -> Network.
//! Network work goes through a [`FetchLimiter`]; results reach UI slots only
//! through [`WeakHandle`]s that are checked right before each update.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::{Notify, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::domain::entities::{CacheKey, CachedBitmap, ImageSource, LoadedImage, MetricsSnapshot};
use crate::domain::errors::{CacheError, CacheResult};
use crate::domain::ports::{ImageCachePort, ImageFetchPort, WeakHandle};

use super::disk_cache::DiskImageCache;
use super::fetch_limiter::{Admission, DEFAULT_MAX_CONCURRENT_FETCHES, FetchLimiter};
use super::http_fetcher::{DEFAULT_TIMEOUT_SECS, HttpImageFetcher};
use super::memory_cache::{DEFAULT_CACHE_CAPACITY, MemoryImageCache};
use super::metrics::{CacheMetrics, Counter};
use super::transform::{self, DEFAULT_DECODE_SIZE};

/// Default interval between diagnostic log lines.
pub const DEFAULT_METRICS_INTERVAL: Duration = Duration::from_secs(60);

/// Resolved settings for one cache instance. Read once at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageCacheConfig {
    /// Maximum bitmaps resident in memory.
    pub memory_capacity: usize,
    /// Thumbnail edge length in pixels, clamped to 32..=512.
    pub decode_size: u32,
    /// Maximum simultaneous network fetches.
    pub max_concurrent_fetches: usize,
    /// HTTP request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ImageCacheConfig {
    fn default() -> Self {
        Self {
            memory_capacity: DEFAULT_CACHE_CAPACITY,
            decode_size: DEFAULT_DECODE_SIZE,
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ImageCacheConfig {
    /// Brings every field into its accepted range.
    #[must_use]
    pub fn normalized(self) -> Self {
        let decode_size = transform::clamp_decode_size(self.decode_size);
        if decode_size != self.decode_size {
            warn!(
                requested = self.decode_size,
                used = decode_size,
                "Decode size out of range, clamping"
            );
        }
        Self {
            memory_capacity: self.memory_capacity.max(1),
            decode_size,
            max_concurrent_fetches: self.max_concurrent_fetches.max(1),
            timeout_secs: self.timeout_secs,
        }
    }
}

/// Gauges describing the cache at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStatus {
    /// Bitmaps resident in memory.
    pub memory_len: usize,
    /// Memory capacity.
    pub memory_capacity: usize,
    /// Thumbnail edge length.
    pub decode_size: u32,
    /// Fetches holding a slot.
    pub active_fetches: usize,
    /// Fetches waiting for a slot.
    pub pending_fetches: usize,
    /// Slot count.
    pub max_concurrent_fetches: usize,
}

impl std::fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "mem={} cap={} size={}px active_fetches={} pending={} max={}",
            self.memory_len,
            self.memory_capacity,
            self.decode_size,
            self.active_fetches,
            self.pending_fetches,
            self.max_concurrent_fetches
        )
    }
}

/// Where a finished fetch delivers its result.
enum Completion {
    /// Update UI slots, if they still exist.
    Display {
        target: WeakHandle,
        fallback: WeakHandle,
    },
    /// Hand the result to an awaiting caller.
    Caller(oneshot::Sender<CacheResult<LoadedImage>>),
}

/// A fetch waiting for, or holding, a limiter slot.
struct PendingFetchRequest {
    key: CacheKey,
    completion: Completion,
}

impl PendingFetchRequest {
    const fn display(key: CacheKey, target: WeakHandle, fallback: WeakHandle) -> Self {
        Self {
            key,
            completion: Completion::Display { target, fallback },
        }
    }
}

/// Two-tier thumbnail cache with a bounded fetch pipeline.
///
/// Cheap to clone; clones share the same caches, limiter and counters.
#[derive(Clone)]
pub struct ImageCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    config: ImageCacheConfig,
    memory: MemoryImageCache,
    disk: DiskImageCache,
    fetcher: Arc<dyn ImageFetchPort>,
    limiter: FetchLimiter<PendingFetchRequest>,
    metrics: CacheMetrics,
    idle: Notify,
    runtime: Handle,
}

/// Holds one limiter slot; releasing it drains the queue.
struct SlotGuard(Arc<CacheInner>);

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.0.finish_fetch();
    }
}

impl std::fmt::Debug for ImageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageCache")
            .field("config", &self.inner.config)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl ImageCache {
    /// Creates a cache over `disk` that fetches through `fetcher`.
    ///
    /// Must be called from within a tokio runtime; fetches are spawned on it.
    ///
    /// # Errors
    /// Returns error if no tokio runtime is available.
    pub fn new(
        config: ImageCacheConfig,
        disk: DiskImageCache,
        fetcher: Arc<dyn ImageFetchPort>,
    ) -> CacheResult<Self> {
        let runtime = Handle::try_current().map_err(|e| CacheError::Runtime(e.to_string()))?;
        let config = config.normalized();

        info!(
            cap = config.memory_capacity,
            size = config.decode_size,
            max_fetches = config.max_concurrent_fetches,
            dir = %disk.cache_dir().display(),
            "Image cache configured"
        );

        Ok(Self {
            inner: Arc::new(CacheInner {
                memory: MemoryImageCache::new(config.memory_capacity),
                limiter: FetchLimiter::new(config.max_concurrent_fetches),
                disk,
                fetcher,
                metrics: CacheMetrics::new(),
                idle: Notify::new(),
                runtime,
                config,
            }),
        })
    }

    /// Creates a cache that fetches over HTTP.
    ///
    /// # Errors
    /// Returns error if the HTTP client or runtime handle cannot be obtained.
    pub fn with_http(config: ImageCacheConfig, disk: DiskImageCache) -> CacheResult<Self> {
        let fetcher = HttpImageFetcher::new(Duration::from_secs(config.timeout_secs))?;
        Self::new(config, disk, Arc::new(fetcher))
    }

    /// Warms the caches for `url` with no UI attached.
    ///
    /// Memory hits are touched, disk hits promoted, and misses fetched through
    /// the limiter. Invalid URLs are ignored.
    pub fn prefetch(&self, url: &str) {
        let Ok(key) = CacheKey::parse(url) else {
            debug!(url = %url, "Ignoring prefetch for invalid url");
            return;
        };
        self.inner.metrics.incr(Counter::Request);

        if self.inner.memory.touch(&key) {
            self.inner.metrics.incr(Counter::MemoryHit);
            trace!(url = %key, "Prefetch touched memory entry");
            return;
        }
        self.inner.metrics.incr(Counter::MemoryMiss);

        if self.inner.promote_from_disk(&key).is_some() {
            return;
        }

        self.inner.request_fetch(PendingFetchRequest::display(
            key,
            WeakHandle::none(),
            WeakHandle::none(),
        ));
    }

    /// Returns a cached bitmap without any network I/O.
    ///
    /// A disk entry that fails to decode is deleted and reported as a miss.
    #[must_use]
    pub fn try_load_cached(&self, url: &str) -> Option<Arc<CachedBitmap>> {
        let key = CacheKey::parse(url).ok()?;
        self.inner.lookup_cached(&key).map(|(bitmap, _)| bitmap)
    }

    /// Resolves `url` and shows it in `target`, hiding `fallback` on success.
    ///
    /// Cache hits are applied before this returns. Misses are fetched in the
    /// background; the fetch always completes and fills the caches, but UI
    /// slots that were dropped meanwhile are skipped.
    pub fn download_async(&self, url: &str, target: WeakHandle, fallback: WeakHandle) {
        let Ok(key) = CacheKey::parse(url) else {
            debug!(url = %url, "Ignoring download for invalid url");
            return;
        };
        self.inner.metrics.incr(Counter::Request);

        if let Some((bitmap, source)) = self.inner.lookup_cached(&key) {
            trace!(url = %key, %source, "Serving download from cache");
            self.inner.apply_bitmap(&key, &bitmap, &target, &fallback);
            return;
        }

        self.inner
            .request_fetch(PendingFetchRequest::display(key, target, fallback));
    }

    /// Resolves `url` through every tier and returns the bitmap.
    ///
    /// Dropping the returned future does not cancel a started fetch.
    ///
    /// # Errors
    /// Returns [`CacheError::InvalidUrl`], [`CacheError::Transport`] or
    /// [`CacheError::InvalidImagePayload`] when no image can be produced.
    pub async fn load(&self, url: &str) -> CacheResult<LoadedImage> {
        let key = CacheKey::parse(url)?;
        self.inner.metrics.incr(Counter::Request);

        if let Some((image, source)) = self.inner.lookup_cached(&key) {
            return Ok(LoadedImage { key, image, source });
        }

        let (reply, response) = oneshot::channel();
        self.inner.request_fetch(PendingFetchRequest {
            key,
            completion: Completion::Caller(reply),
        });
        response.await.map_err(|_| CacheError::Abandoned)?
    }

    /// Returns the current counters.
    #[must_use]
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Returns the current gauges.
    #[must_use]
    pub fn status(&self) -> CacheStatus {
        self.inner.status()
    }

    /// Number of bitmaps resident in memory.
    #[must_use]
    pub fn cache_size(&self) -> usize {
        self.inner.memory.len()
    }

    /// Resident keys from least to most recently used.
    #[must_use]
    pub fn resident_keys(&self) -> Vec<CacheKey> {
        self.inner.memory.resident_keys()
    }

    /// The settings this cache was built with.
    #[must_use]
    pub fn config(&self) -> &ImageCacheConfig {
        &self.inner.config
    }

    /// The disk tier.
    #[must_use]
    pub fn disk(&self) -> &DiskImageCache {
        &self.inner.disk
    }

    /// Waits until no fetch is active or queued.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.inner.limiter.is_idle() {
                return;
            }
            notified.await;
        }
    }

    /// Logs status and counters every `period` until the cache is dropped.
    pub fn spawn_metrics_logger(&self, period: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        let period = period.max(Duration::from_millis(1));
        self.inner.runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                info!(status = %inner.status(), "Image cache status");
                inner.metrics.log();
            }
            debug!("Image cache dropped, metrics logger stopping");
        })
    }
}

impl CacheInner {
    fn status(&self) -> CacheStatus {
        CacheStatus {
            memory_len: self.memory.len(),
            memory_capacity: self.memory.capacity(),
            decode_size: self.config.decode_size,
            active_fetches: self.limiter.active(),
            pending_fetches: self.limiter.pending(),
            max_concurrent_fetches: self.limiter.capacity(),
        }
    }

    /// Memory first, then disk with promotion into memory.
    fn lookup_cached(&self, key: &CacheKey) -> Option<(Arc<CachedBitmap>, ImageSource)> {
        if let Some(bitmap) = self.memory.get(key) {
            self.metrics.incr(Counter::MemoryHit);
            return Some((bitmap, ImageSource::MemoryCache));
        }
        self.metrics.incr(Counter::MemoryMiss);

        self.promote_from_disk(key)
            .map(|bitmap| (bitmap, ImageSource::DiskCache))
    }

    fn promote_from_disk(&self, key: &CacheKey) -> Option<Arc<CachedBitmap>> {
        let bitmap = self.load_from_disk(key)?;
        self.store_in_memory(key.clone(), Arc::clone(&bitmap));
        debug!(url = %key, "Promoted disk -> memory");
        Some(bitmap)
    }

    fn load_from_disk(&self, key: &CacheKey) -> Option<Arc<CachedBitmap>> {
        self.metrics.incr(Counter::DiskRead);
        let bytes = self.disk.read(key)?;
        match transform::decode(&bytes, self.config.decode_size) {
            Ok(bitmap) => {
                self.metrics.incr(Counter::DiskHit);
                Some(Arc::new(bitmap))
            }
            Err(e) if !e.is_corrupt() => {
                self.metrics.incr(Counter::OversizedPayload);
                warn!(url = %key, error = %e, "Cached image exceeds decode limits, keeping entry");
                None
            }
            Err(e) => {
                self.metrics.incr(Counter::InvalidPayload);
                warn!(url = %key, error = %e, "Invalid cached file, deleting corrupt entry");
                if self.disk.delete(key) {
                    self.metrics.incr(Counter::CorruptEntryRemoved);
                }
                None
            }
        }
    }

    fn store_in_memory(&self, key: CacheKey, bitmap: Arc<CachedBitmap>) {
        if let Some(evicted) = self.memory.put(key, bitmap) {
            self.metrics.incr(Counter::MemoryEviction);
            trace!(url = %evicted, "Memory cache at capacity");
        }
    }

    fn request_fetch(self: &Arc<Self>, request: PendingFetchRequest) {
        let url = request.key.clone();
        match self.limiter.enqueue(request) {
            Admission::Started(request) => self.spawn_fetch(request),
            Admission::Queued { position } => {
                debug!(url = %url, position, "Image fetch queued");
            }
        }
    }

    fn spawn_fetch(self: &Arc<Self>, request: PendingFetchRequest) {
        self.metrics.incr(Counter::FetchStarted);
        debug!(url = %request.key, "Starting image fetch");

        let guard = SlotGuard(Arc::clone(self));
        self.runtime.spawn(async move {
            Arc::clone(&guard.0).run_fetch(request).await;
            drop(guard);
        });
    }

    fn finish_fetch(self: &Arc<Self>) {
        let drain = self.limiter.release_slot_and_drain();
        for request in drain.started {
            self.spawn_fetch(request);
        }
        if drain.idle {
            self.idle.notify_waiters();
        }
    }

    async fn run_fetch(self: Arc<Self>, request: PendingFetchRequest) {
        let PendingFetchRequest { key, completion } = request;
        let result = self.fetch_and_decode(&key).await;
        if let Ok(bitmap) = &result {
            self.store_in_memory(key.clone(), Arc::clone(bitmap));
        }
        self.complete(key, completion, result);
    }

    async fn fetch_and_decode(self: &Arc<Self>, key: &CacheKey) -> CacheResult<Arc<CachedBitmap>> {
        let bytes = match self.fetcher.fetch(key.as_str()).await {
            Ok(bytes) => {
                self.metrics.incr(Counter::FetchSucceeded);
                debug!(url = %key, len = bytes.len(), "Fetched image");
                bytes
            }
            Err(e) => {
                self.metrics.incr(Counter::FetchFailed);
                debug!(url = %key, error = %e, "Image fetch failed");
                return Err(e.into());
            }
        };

        let inner = Arc::clone(self);
        let key = key.clone();
        self.runtime
            .spawn_blocking(move || inner.decode_and_persist(&key, &bytes))
            .await
            .map_err(|e| CacheError::Runtime(format!("Decode task failed: {e}")))?
    }

    /// Validates the payload by decoding it, and only then persists the raw
    /// bytes. A failed disk write still yields the bitmap.
    fn decode_and_persist(&self, key: &CacheKey, bytes: &Bytes) -> CacheResult<Arc<CachedBitmap>> {
        let bitmap = transform::decode(bytes, self.config.decode_size).map_err(|e| {
            if e.is_corrupt() {
                self.metrics.incr(Counter::InvalidPayload);
                warn!(url = %key, error = %e, len = bytes.len(), "Invalid image data (likely an error page)");
            } else {
                self.metrics.incr(Counter::OversizedPayload);
                warn!(url = %key, error = %e, len = bytes.len(), "Image exceeds decode limits");
            }
            CacheError::from(e)
        })?;

        if let Err(e) = self.disk.write(key, bytes) {
            self.metrics.incr(Counter::DiskWriteFailure);
            warn!(url = %key, error = %e, "Failed to cache to disk");
        }

        Ok(Arc::new(bitmap))
    }

    fn complete(&self, key: CacheKey, completion: Completion, result: CacheResult<Arc<CachedBitmap>>) {
        match completion {
            Completion::Display { target, fallback } => match result {
                Ok(bitmap) => self.apply_bitmap(&key, &bitmap, &target, &fallback),
                Err(e) => self.show_fallback(&key, &fallback, &e),
            },
            Completion::Caller(reply) => {
                let loaded = result.map(|image| LoadedImage {
                    key,
                    image,
                    source: ImageSource::Network,
                });
                if reply.send(loaded).is_err() {
                    trace!("Load caller went away before completion");
                }
            }
        }
    }

    fn apply_bitmap(
        &self,
        key: &CacheKey,
        bitmap: &Arc<CachedBitmap>,
        target: &WeakHandle,
        fallback: &WeakHandle,
    ) {
        if let Some(slot) = target.upgrade() {
            slot.set_image(Arc::clone(bitmap));
            slot.set_visible(true);
        } else if target.is_attached() {
            debug!(url = %key, "Target was dropped, skipping UI update");
        }

        if let Some(slot) = fallback.upgrade() {
            slot.set_visible(false);
        }
    }

    fn show_fallback(&self, key: &CacheKey, fallback: &WeakHandle, error: &CacheError) {
        debug!(url = %key, error = %error, "Leaving fallback in place");
        if let Some(slot) = fallback.upgrade() {
            slot.set_visible(true);
            self.metrics.incr(Counter::FallbackShown);
        }
    }
}

#[async_trait::async_trait]
impl ImageCachePort for ImageCache {
    fn prefetch(&self, url: &str) {
        Self::prefetch(self, url);
    }

    fn try_load_cached(&self, url: &str) -> Option<Arc<CachedBitmap>> {
        Self::try_load_cached(self, url)
    }

    fn download_async(&self, url: &str, target: WeakHandle, fallback: WeakHandle) {
        Self::download_async(self, url, target, fallback);
    }

    async fn load(&self, url: &str) -> CacheResult<LoadedImage> {
        Self::load(self, url).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        Self::metrics_snapshot(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::FetchError;
    use crate::domain::ports::mocks::{MockImageFetcher, MockSlot};
    use crate::infrastructure::image::test_support::solid_png;
    use tempfile::TempDir;

    struct Harness {
        cache: ImageCache,
        fetcher: Arc<MockImageFetcher>,
        _temp: TempDir,
    }

    fn harness_with(config: ImageCacheConfig, fetcher: MockImageFetcher) -> Harness {
        let temp = TempDir::new().unwrap();
        let disk = DiskImageCache::open(temp.path().join("images")).unwrap();
        let fetcher = Arc::new(fetcher);
        let cache = ImageCache::new(config, disk, fetcher.clone()).unwrap();
        Harness {
            cache,
            fetcher,
            _temp: temp,
        }
    }

    fn harness() -> Harness {
        harness_with(ImageCacheConfig::default(), MockImageFetcher::new())
    }

    fn url(name: &str) -> String {
        format!("https://cdn.example.com/{name}.png")
    }

    fn key(name: &str) -> CacheKey {
        CacheKey::parse(&url(name)).unwrap()
    }

    fn png() -> Bytes {
        Bytes::from(solid_png(120, 80, [10, 200, 30, 255]))
    }

    async fn settle(cache: &ImageCache) {
        tokio::time::timeout(Duration::from_secs(5), cache.wait_idle())
            .await
            .expect("cache did not go idle");
    }

    #[tokio::test]
    async fn test_download_miss_fetches_and_applies() {
        let h = harness();
        h.fetcher.respond(&url("a"), Ok(png()));
        let target = MockSlot::shared();
        let fallback = MockSlot::shared();

        h.cache
            .download_async(&url("a"), WeakHandle::new(&target), WeakHandle::new(&fallback));
        settle(&h.cache).await;

        let image = target.image().expect("target updated");
        assert_eq!(image.size(), 96);
        assert_eq!(target.visible(), Some(true));
        assert_eq!(fallback.visible(), Some(false));
        assert!(h.cache.disk().contains(&key("a")));
        assert_eq!(h.cache.resident_keys(), vec![key("a")]);

        let metrics = h.cache.metrics_snapshot();
        assert_eq!(metrics.requests_total, 1);
        assert_eq!(metrics.fetches_started, 1);
        assert_eq!(metrics.fetches_succeeded, 1);
    }

    #[tokio::test]
    async fn test_download_memory_hit_applies_immediately() {
        let h = harness();
        h.fetcher.respond(&url("a"), Ok(png()));
        h.cache
            .download_async(&url("a"), WeakHandle::none(), WeakHandle::none());
        settle(&h.cache).await;

        let target = MockSlot::shared();
        let fallback = MockSlot::shared();
        h.cache
            .download_async(&url("a"), WeakHandle::new(&target), WeakHandle::new(&fallback));

        assert!(target.image().is_some());
        assert_eq!(fallback.visible(), Some(false));
        assert_eq!(h.fetcher.calls_for(&url("a")), 1);
        assert_eq!(h.cache.metrics_snapshot().memory_hits, 1);
        assert_eq!(h.cache.status().active_fetches, 0);
    }

    #[tokio::test]
    async fn test_capacity_two_scenario() {
        let config = ImageCacheConfig {
            memory_capacity: 2,
            decode_size: 96,
            ..ImageCacheConfig::default()
        };
        let h = harness_with(config, MockImageFetcher::new());

        for name in ["a", "b", "c"] {
            h.fetcher.respond(&url(name), Ok(png()));
            let target = MockSlot::shared();
            h.cache
                .download_async(&url(name), WeakHandle::new(&target), WeakHandle::none());
            settle(&h.cache).await;
            assert!(target.image().is_some());
        }
        assert_eq!(h.cache.resident_keys(), vec![key("b"), key("c")]);

        let reloaded = h.cache.try_load_cached(&url("a")).expect("disk hit");
        assert_eq!(reloaded.size(), 96);
        assert_eq!(h.cache.resident_keys(), vec![key("c"), key("a")]);

        let metrics = h.cache.metrics_snapshot();
        assert_eq!(metrics.disk_hits, 1);
        assert_eq!(metrics.memory_evictions, 2);
        assert_eq!(h.fetcher.total_calls(), 3);
    }

    #[tokio::test]
    async fn test_try_load_cached_promotes_once() {
        let h = harness();
        h.cache.disk().write(&key("a"), &png()).unwrap();

        let reads_before = h.cache.disk().read_count();
        assert!(h.cache.try_load_cached(&url("a")).is_some());
        assert_eq!(h.cache.disk().read_count(), reads_before + 1);

        assert!(h.cache.try_load_cached(&url("a")).is_some());
        assert_eq!(h.cache.disk().read_count(), reads_before + 1);

        let metrics = h.cache.metrics_snapshot();
        assert_eq!(metrics.disk_hits, 1);
        assert_eq!(metrics.disk_reads, 1);
        assert_eq!(metrics.memory_hits, 1);
        assert_eq!(h.cache.cache_size(), 1);
        assert_eq!(h.fetcher.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_try_load_cached_miss_never_fetches() {
        let h = harness();
        assert!(h.cache.try_load_cached(&url("a")).is_none());
        assert_eq!(h.cache.status().active_fetches, 0);
        assert_eq!(h.fetcher.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_disk_entry_self_heals() {
        let h = harness();
        h.cache
            .disk()
            .write(&key("a"), b"<html><body>404</body></html>")
            .unwrap();

        assert!(h.cache.try_load_cached(&url("a")).is_none());
        assert!(!h.cache.disk().contains(&key("a")));
        let metrics = h.cache.metrics_snapshot();
        assert_eq!(metrics.invalid_payloads, 1);
        assert_eq!(metrics.corrupt_entries_removed, 1);

        h.fetcher.respond(&url("a"), Ok(png()));
        let target = MockSlot::shared();
        let fallback = MockSlot::shared();
        h.cache
            .download_async(&url("a"), WeakHandle::new(&target), WeakHandle::new(&fallback));
        settle(&h.cache).await;

        assert_eq!(h.fetcher.calls_for(&url("a")), 1);
        assert!(target.image().is_some());
        assert_eq!(fallback.visible(), Some(false));
        assert!(h.cache.disk().contains(&key("a")));
    }

    #[tokio::test]
    async fn test_concurrency_bound_under_burst() {
        let h = harness_with(ImageCacheConfig::default(), MockImageFetcher::gated());
        let targets: Vec<_> = (0..30)
            .map(|n| {
                let u = url(&format!("img{n}"));
                h.fetcher.respond(&u, Ok(png()));
                let target = MockSlot::shared();
                h.cache
                    .download_async(&u, WeakHandle::new(&target), WeakHandle::none());
                target
            })
            .collect();

        let status = h.cache.status();
        assert_eq!(status.active_fetches, DEFAULT_MAX_CONCURRENT_FETCHES);
        assert_eq!(status.pending_fetches, 30 - DEFAULT_MAX_CONCURRENT_FETCHES);

        tokio::time::timeout(Duration::from_secs(5), async {
            while h.fetcher.in_flight() < DEFAULT_MAX_CONCURRENT_FETCHES {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("fetches parked at the gate");

        h.fetcher.release(30);
        settle(&h.cache).await;

        assert_eq!(h.fetcher.max_in_flight(), DEFAULT_MAX_CONCURRENT_FETCHES);
        assert_eq!(h.fetcher.total_calls(), 30);
        assert!(targets.iter().all(|t| t.image().is_some()));
        assert_eq!(h.cache.metrics_snapshot().fetches_started, 30);
    }

    #[tokio::test]
    async fn test_queued_requests_start_in_fifo_order() {
        let config = ImageCacheConfig {
            max_concurrent_fetches: 1,
            ..ImageCacheConfig::default()
        };
        let h = harness_with(config, MockImageFetcher::gated());
        let names = ["a", "b", "c", "d"];
        for name in names {
            h.fetcher.respond(&url(name), Ok(png()));
            h.cache
                .download_async(&url(name), WeakHandle::none(), WeakHandle::none());
        }
        assert_eq!(h.cache.status().pending_fetches, 3);

        h.fetcher.release(names.len());
        settle(&h.cache).await;

        let expected: Vec<String> = names.iter().map(|n| url(n)).collect();
        assert_eq!(h.fetcher.call_order(), expected);
    }

    #[tokio::test]
    async fn test_dropped_target_still_populates_cache() {
        let h = harness_with(ImageCacheConfig::default(), MockImageFetcher::gated());
        h.fetcher.respond(&url("a"), Ok(png()));
        let target = MockSlot::shared();
        let fallback = MockSlot::shared();
        let probe = WeakHandle::new(&target);

        h.cache
            .download_async(&url("a"), WeakHandle::new(&target), WeakHandle::new(&fallback));
        drop(target);
        assert!(!probe.is_alive(), "cache must not keep the target alive");

        h.fetcher.release(1);
        settle(&h.cache).await;

        assert_eq!(h.cache.resident_keys(), vec![key("a")]);
        assert!(h.cache.disk().contains(&key("a")));
        assert_eq!(fallback.visible(), Some(false));
    }

    #[tokio::test]
    async fn test_transport_failure_shows_fallback() {
        let h = harness();
        h.fetcher
            .respond(&url("a"), Err(FetchError::Request("connection reset".into())));
        let target = MockSlot::shared();
        let fallback = MockSlot::shared();

        h.cache
            .download_async(&url("a"), WeakHandle::new(&target), WeakHandle::new(&fallback));
        settle(&h.cache).await;

        assert!(target.image().is_none());
        assert_eq!(target.update_count(), 0);
        assert_eq!(fallback.visible(), Some(true));
        assert!(h.cache.resident_keys().is_empty());
        assert!(!h.cache.disk().contains(&key("a")));

        let metrics = h.cache.metrics_snapshot();
        assert_eq!(metrics.fetches_failed, 1);
        assert_eq!(metrics.fallback_shown, 1);
        assert_eq!(metrics.invalid_payloads, 0);
    }

    #[tokio::test]
    async fn test_invalid_payload_not_cached() {
        let h = harness();
        h.fetcher.respond(
            &url("a"),
            Ok(Bytes::from_static(b"<!DOCTYPE html><html>rate limited</html>")),
        );
        let target = MockSlot::shared();
        let fallback = MockSlot::shared();

        h.cache
            .download_async(&url("a"), WeakHandle::new(&target), WeakHandle::new(&fallback));
        settle(&h.cache).await;

        assert!(target.image().is_none());
        assert_eq!(fallback.visible(), Some(true));
        assert!(h.cache.resident_keys().is_empty());
        assert!(!h.cache.disk().contains(&key("a")));

        let metrics = h.cache.metrics_snapshot();
        assert_eq!(metrics.invalid_payloads, 1);
        assert_eq!(metrics.fetches_failed, 0);
        assert_eq!(metrics.fetches_succeeded, 1);
    }

    #[tokio::test]
    async fn test_disk_write_failure_still_caches_in_memory() {
        let h = harness();
        let dir = h.cache.disk().cache_dir().to_path_buf();
        std::fs::remove_dir_all(&dir).unwrap();
        std::fs::write(&dir, b"not a directory").unwrap();

        h.fetcher.respond(&url("a"), Ok(png()));
        let target = MockSlot::shared();
        h.cache
            .download_async(&url("a"), WeakHandle::new(&target), WeakHandle::none());
        settle(&h.cache).await;

        assert!(target.image().is_some());
        assert_eq!(h.cache.resident_keys(), vec![key("a")]);
        assert_eq!(h.cache.metrics_snapshot().disk_write_failures, 1);
    }

    #[tokio::test]
    async fn test_invalid_urls_are_noops() {
        let h = harness();
        let target = MockSlot::shared();

        h.cache
            .download_async("", WeakHandle::new(&target), WeakHandle::none());
        h.cache
            .download_async("ftp://example.com/a.png", WeakHandle::new(&target), WeakHandle::none());
        h.cache.prefetch("javascript:alert(1)");
        assert!(h.cache.try_load_cached("not a url").is_none());
        assert!(matches!(
            h.cache.load("").await,
            Err(CacheError::InvalidUrl { .. })
        ));

        assert_eq!(target.update_count(), 0);
        assert_eq!(h.fetcher.total_calls(), 0);
        assert_eq!(h.cache.metrics_snapshot(), MetricsSnapshot::default());
    }

    #[tokio::test]
    async fn test_prefetch_warms_caches_once() {
        let h = harness();
        h.fetcher.respond(&url("a"), Ok(png()));

        h.cache.prefetch(&url("a"));
        settle(&h.cache).await;
        assert_eq!(h.cache.resident_keys(), vec![key("a")]);
        assert!(h.cache.disk().contains(&key("a")));

        h.cache.prefetch(&url("a"));
        settle(&h.cache).await;
        assert_eq!(h.fetcher.calls_for(&url("a")), 1);
    }

    #[tokio::test]
    async fn test_prefetch_promotes_disk_entry() {
        let h = harness();
        h.cache.disk().write(&key("a"), &png()).unwrap();

        h.cache.prefetch(&url("a"));

        assert_eq!(h.cache.resident_keys(), vec![key("a")]);
        assert_eq!(h.cache.status().active_fetches, 0);
        assert_eq!(h.fetcher.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_prefetch_touch_protects_memory_entry() {
        let config = ImageCacheConfig {
            memory_capacity: 2,
            ..ImageCacheConfig::default()
        };
        let h = harness_with(config, MockImageFetcher::new());
        for name in ["a", "b", "c"] {
            h.cache.disk().write(&key(name), &png()).unwrap();
        }

        h.cache.prefetch(&url("a"));
        h.cache.prefetch(&url("b"));
        h.cache.prefetch(&url("a"));
        h.cache.prefetch(&url("c"));

        assert_eq!(h.cache.resident_keys(), vec![key("a"), key("c")]);
        let metrics = h.cache.metrics_snapshot();
        assert_eq!(metrics.memory_hits, 1);
        assert_eq!(metrics.disk_hits, 3);
        assert_eq!(h.fetcher.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_oversized_disk_entry_is_kept() {
        let h = harness();
        let oversized = solid_png(transform::MAX_SOURCE_DIMENSION + 1, 1, [0, 0, 0, 255]);
        h.cache.disk().write(&key("a"), &oversized).unwrap();

        assert!(h.cache.try_load_cached(&url("a")).is_none());
        assert!(h.cache.disk().contains(&key("a")));

        let metrics = h.cache.metrics_snapshot();
        assert_eq!(metrics.oversized_payloads, 1);
        assert_eq!(metrics.invalid_payloads, 0);
        assert_eq!(metrics.corrupt_entries_removed, 0);
    }

    #[tokio::test]
    async fn test_oversized_download_shows_fallback() {
        let h = harness();
        let oversized = solid_png(transform::MAX_SOURCE_DIMENSION + 1, 1, [0, 0, 0, 255]);
        h.fetcher.respond(&url("a"), Ok(Bytes::from(oversized)));
        let fallback = MockSlot::shared();

        h.cache
            .download_async(&url("a"), WeakHandle::none(), WeakHandle::new(&fallback));
        settle(&h.cache).await;

        assert_eq!(fallback.visible(), Some(true));
        assert!(!h.cache.disk().contains(&key("a")));
        let metrics = h.cache.metrics_snapshot();
        assert_eq!(metrics.oversized_payloads, 1);
        assert_eq!(metrics.invalid_payloads, 0);
    }

    #[tokio::test]
    async fn test_load_reports_source() {
        let h = harness();
        h.fetcher.respond(&url("a"), Ok(png()));

        let first = h.cache.load(&url("a")).await.unwrap();
        assert_eq!(first.source, ImageSource::Network);
        assert_eq!(first.image.size(), 96);

        let second = h.cache.load(&url("a")).await.unwrap();
        assert_eq!(second.source, ImageSource::MemoryCache);
        assert!(Arc::ptr_eq(&first.image, &second.image));
    }

    #[tokio::test]
    async fn test_load_surfaces_typed_errors() {
        let h = harness();
        h.fetcher
            .respond(&url("bad"), Ok(Bytes::from_static(b"definitely not an image")));

        let missing = h.cache.load(&url("missing")).await.unwrap_err();
        assert!(missing.is_transport());

        let bad = h.cache.load(&url("bad")).await.unwrap_err();
        assert!(bad.is_invalid_payload());
    }

    #[tokio::test]
    async fn test_same_url_fetches_are_not_coalesced() {
        let h = harness_with(ImageCacheConfig::default(), MockImageFetcher::gated());
        h.fetcher.respond(&url("a"), Ok(png()));
        let first = MockSlot::shared();
        let second = MockSlot::shared();

        h.cache
            .download_async(&url("a"), WeakHandle::new(&first), WeakHandle::none());
        h.cache
            .download_async(&url("a"), WeakHandle::new(&second), WeakHandle::none());
        h.fetcher.release(2);
        settle(&h.cache).await;

        assert_eq!(h.fetcher.calls_for(&url("a")), 2);
        assert!(first.image().is_some());
        assert!(second.image().is_some());
        assert_eq!(h.cache.cache_size(), 1);
    }

    #[tokio::test]
    async fn test_usable_through_port() {
        let h = harness();
        h.fetcher.respond(&url("a"), Ok(png()));
        let port: Arc<dyn ImageCachePort> = Arc::new(h.cache.clone());

        port.prefetch(&url("a"));
        settle(&h.cache).await;

        assert!(port.try_load_cached(&url("a")).is_some());
        assert_eq!(port.metrics_snapshot().memory_hits, 1);
    }

    #[tokio::test]
    async fn test_decode_size_is_clamped() {
        let config = ImageCacheConfig {
            decode_size: 4,
            ..ImageCacheConfig::default()
        };
        let h = harness_with(config, MockImageFetcher::new());
        assert_eq!(h.cache.config().decode_size, transform::MIN_DECODE_SIZE);
    }

    #[tokio::test]
    async fn test_metrics_logger_stops_when_cache_dropped() {
        let h = harness();
        let logger = h.cache.spawn_metrics_logger(Duration::from_millis(5));
        drop(h);

        tokio::time::timeout(Duration::from_secs(2), logger)
            .await
            .expect("logger stopped")
            .unwrap();
    }

    #[test]
    fn test_new_requires_runtime() {
        let temp = TempDir::new().unwrap();
        let disk = DiskImageCache::open(temp.path().to_path_buf()).unwrap();
        let result = ImageCache::new(
            ImageCacheConfig::default(),
            disk,
            Arc::new(MockImageFetcher::new()),
        );
        assert!(matches!(result, Err(CacheError::Runtime(_))));
    }
}
