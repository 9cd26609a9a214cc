//! Point-in-time view of the cache counters.

use serde::Serialize;

/// Counter values captured at one instant.
///
/// Every field only grows for the lifetime of the cache instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Valid requests received by `prefetch`, `download_async` and `load`.
    pub requests_total: u64,
    /// Lookups answered by the memory tier.
    pub memory_hits: u64,
    /// Lookups the memory tier could not answer.
    pub memory_misses: u64,
    /// Times the disk tier was consulted.
    pub disk_reads: u64,
    /// Lookups answered by decoding a disk entry.
    pub disk_hits: u64,
    /// Bitmaps pushed out of the memory tier by capacity pressure.
    pub memory_evictions: u64,
    /// Network fetches that obtained a slot and started.
    pub fetches_started: u64,
    /// Network fetches that returned a body.
    pub fetches_succeeded: u64,
    /// Network fetches that failed in transport.
    pub fetches_failed: u64,
    /// Payloads (network or disk) that did not decode as an image.
    pub invalid_payloads: u64,
    /// Payloads that exceeded the decode limits. Not treated as corrupt.
    pub oversized_payloads: u64,
    /// Corrupt disk entries deleted during lookup.
    pub corrupt_entries_removed: u64,
    /// Times a fallback handle was made visible after a failed download.
    pub fallback_shown: u64,
    /// Fetched payloads that could not be persisted to disk.
    pub disk_write_failures: u64,
}

impl MetricsSnapshot {
    /// Share of lookups served without touching the network, in percent.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let hits = self.memory_hits + self.disk_hits;
        let total = self.memory_hits + self.memory_misses;
        if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        }
    }
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "requests={} mem_hits={} disk_reads={} disk_hits={} evictions={} http_start={} \
             http_ok={} http_err={} invalid={} oversized={} corrupt_removed={} fallback={} \
             write_err={} ({:.1}% hit rate)",
            self.requests_total,
            self.memory_hits,
            self.disk_reads,
            self.disk_hits,
            self.memory_evictions,
            self.fetches_started,
            self.fetches_succeeded,
            self.fetches_failed,
            self.invalid_payloads,
            self.oversized_payloads,
            self.corrupt_entries_removed,
            self.fallback_shown,
            self.disk_write_failures,
            self.hit_rate()
        )
    }
}
