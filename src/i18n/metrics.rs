//! Translation cache metrics.
//!
//! Counters for cache hits and misses, cache writes and invalidations, and
//! storage reads that failed soft. Each cache layer owns its own instance,
//! so independent services never share counters.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct TranslationMetrics {
    /// Number of lookups served from the cache
    cache_hits: AtomicUsize,

    /// Number of lookups that had to reach the store
    cache_misses: AtomicUsize,

    /// Number of values written into the cache
    cache_writes: AtomicUsize,

    /// Number of keys forgotten by the write path
    invalidations: AtomicUsize,

    /// Number of storage failures downgraded to "no translation"
    storage_failures: AtomicUsize,
}

impl TranslationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_write(&self) {
        self.cache_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalidations(&self, count: usize) {
        self.invalidations.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_storage_failure(&self) {
        self.storage_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_hits(&self) -> usize {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> usize {
        self.cache_misses.load(Ordering::Relaxed)
    }

    pub fn cache_writes(&self) -> usize {
        self.cache_writes.load(Ordering::Relaxed)
    }

    pub fn invalidations(&self) -> usize {
        self.invalidations.load(Ordering::Relaxed)
    }

    pub fn storage_failures(&self) -> usize {
        self.storage_failures.load(Ordering::Relaxed)
    }

    /// Generate a metrics report.
    pub fn report(&self) -> MetricsReport {
        let hits = self.cache_hits();
        let misses = self.cache_misses();
        let total_cache_queries = hits + misses;
        let cache_hit_rate = if total_cache_queries > 0 {
            (hits as f64 / total_cache_queries as f64) * 100.0
        } else {
            0.0
        };

        MetricsReport {
            cache_hits: hits,
            cache_misses: misses,
            cache_hit_rate,
            cache_writes: self.cache_writes(),
            invalidations: self.invalidations(),
            storage_failures: self.storage_failures(),
        }
    }
}

/// Metrics report containing current cache statistics.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub cache_hits: usize,
    pub cache_misses: usize,

    /// Cache hit rate as a percentage (0-100)
    pub cache_hit_rate: f64,

    pub cache_writes: usize,
    pub invalidations: usize,
    pub storage_failures: usize,
}
