//! Process-lifetime counters for the image cache.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::info;

use crate::domain::entities::MetricsSnapshot;

/// Individual counters tracked by [`CacheMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    /// A valid request entered the facade.
    Request,
    /// Memory tier answered a lookup.
    MemoryHit,
    /// Memory tier missed a lookup.
    MemoryMiss,
    /// The disk tier was consulted.
    DiskRead,
    /// A disk entry decoded and was promoted.
    DiskHit,
    /// A bitmap was evicted by capacity pressure.
    MemoryEviction,
    /// A fetch obtained a slot and started.
    FetchStarted,
    /// A fetch returned a body.
    FetchSucceeded,
    /// A fetch failed in transport.
    FetchFailed,
    /// A payload did not decode as an image.
    InvalidPayload,
    /// A payload exceeded the decode limits.
    OversizedPayload,
    /// A corrupt disk entry was deleted.
    CorruptEntryRemoved,
    /// A fallback handle was made visible.
    FallbackShown,
    /// A disk write failed.
    DiskWriteFailure,
}

/// Monotonic counters, safe to bump from any task.
#[derive(Debug, Default)]
pub struct CacheMetrics {
    requests_total: AtomicU64,
    memory_hits: AtomicU64,
    memory_misses: AtomicU64,
    disk_reads: AtomicU64,
    disk_hits: AtomicU64,
    memory_evictions: AtomicU64,
    fetches_started: AtomicU64,
    fetches_succeeded: AtomicU64,
    fetches_failed: AtomicU64,
    invalid_payloads: AtomicU64,
    oversized_payloads: AtomicU64,
    corrupt_entries_removed: AtomicU64,
    fallback_shown: AtomicU64,
    disk_write_failures: AtomicU64,
}

impl CacheMetrics {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments one counter.
    pub fn incr(&self, counter: Counter) {
        self.slot(counter).fetch_add(1, Ordering::Relaxed);
    }

    /// Reads one counter.
    #[must_use]
    pub fn get(&self, counter: Counter) -> u64 {
        self.slot(counter).load(Ordering::Relaxed)
    }

    const fn slot(&self, counter: Counter) -> &AtomicU64 {
        match counter {
            Counter::Request => &self.requests_total,
            Counter::MemoryHit => &self.memory_hits,
            Counter::MemoryMiss => &self.memory_misses,
            Counter::DiskRead => &self.disk_reads,
            Counter::DiskHit => &self.disk_hits,
            Counter::MemoryEviction => &self.memory_evictions,
            Counter::FetchStarted => &self.fetches_started,
            Counter::FetchSucceeded => &self.fetches_succeeded,
            Counter::FetchFailed => &self.fetches_failed,
            Counter::InvalidPayload => &self.invalid_payloads,
            Counter::OversizedPayload => &self.oversized_payloads,
            Counter::CorruptEntryRemoved => &self.corrupt_entries_removed,
            Counter::FallbackShown => &self.fallback_shown,
            Counter::DiskWriteFailure => &self.disk_write_failures,
        }
    }

    /// Copies every counter.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_total: self.get(Counter::Request),
            memory_hits: self.get(Counter::MemoryHit),
            memory_misses: self.get(Counter::MemoryMiss),
            disk_reads: self.get(Counter::DiskRead),
            disk_hits: self.get(Counter::DiskHit),
            memory_evictions: self.get(Counter::MemoryEviction),
            fetches_started: self.get(Counter::FetchStarted),
            fetches_succeeded: self.get(Counter::FetchSucceeded),
            fetches_failed: self.get(Counter::FetchFailed),
            invalid_payloads: self.get(Counter::InvalidPayload),
            oversized_payloads: self.get(Counter::OversizedPayload),
            corrupt_entries_removed: self.get(Counter::CorruptEntryRemoved),
            fallback_shown: self.get(Counter::FallbackShown),
            disk_write_failures: self.get(Counter::DiskWriteFailure),
        }
    }

    /// Logs the current counters at info level.
    pub fn log(&self) {
        let snapshot = self.snapshot();
        info!(
            requests = snapshot.requests_total,
            mem_hits = snapshot.memory_hits,
            disk_reads = snapshot.disk_reads,
            disk_hits = snapshot.disk_hits,
            http_start = snapshot.fetches_started,
            http_ok = snapshot.fetches_succeeded,
            http_err = snapshot.fetches_failed,
            invalid = snapshot.invalid_payloads,
            oversized = snapshot.oversized_payloads,
            fallback = snapshot.fallback_shown,
            write_err = snapshot.disk_write_failures,
            "Image cache metrics"
        );
    }
}
