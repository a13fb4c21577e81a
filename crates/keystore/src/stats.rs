//! Cache statistics and metrics tracking
//!
//! This module provides types for tracking cache performance metrics
//! including hit rates, loader activity, and eviction counts.

use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics for cache performance monitoring
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Current number of entries
    pub size: usize,

    /// Maximum allowed entries
    pub capacity: usize,

    /// Lookups answered from the cache. A miss later satisfied by an entry
    /// another caller loaded counts here too, so `hits + misses` can exceed
    /// the number of `get` calls.
    pub hits: u64,

    /// Lookups that did not find the key on the fast path
    pub misses: u64,

    /// Successful loader invocations
    pub loads: u64,

    /// Failed loader invocations
    pub load_failures: u64,

    /// Entries evicted to make room for a new entry
    pub evictions: u64,

    /// Misses resolved by another caller's load instead of their own, in
    /// either coordination mode. While every load succeeds and nothing is
    /// evicted mid-wait, `misses == loads + coalesced`.
    pub coalesced: u64,
}

impl CacheStats {
    /// Calculate hit rate (hits / total accesses)
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.total_accesses();
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Calculate miss rate (misses / total accesses)
    #[must_use]
    pub fn miss_rate(&self) -> f64 {
        if self.total_accesses() == 0 {
            0.0
        } else {
            1.0 - self.hit_rate()
        }
    }

    /// Calculate fill percentage (size / capacity)
    #[must_use]
    pub fn fill_percentage(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            self.size as f64 / self.capacity as f64
        }
    }

    /// Total number of access operations (hits + misses)
    #[must_use]
    pub fn total_accesses(&self) -> u64 {
        self.hits + self.misses
    }

    /// Total number of loader invocations, successful or not
    #[must_use]
    pub fn total_loads(&self) -> u64 {
        self.loads + self.load_failures
    }
}

/// Thread-safe metrics collector for cache operations
///
/// Uses relaxed atomics so recording never takes the cache lock.
#[derive(Debug, Default)]
pub(crate) struct MetricsCollector {
    enabled: bool,
    hits: AtomicU64,
    misses: AtomicU64,
    loads: AtomicU64,
    load_failures: AtomicU64,
    evictions: AtomicU64,
    coalesced: AtomicU64,
}

impl MetricsCollector {
    /// Create a new metrics collector; a disabled collector records nothing
    pub(crate) fn new(enabled: bool) -> Self {
        Self { enabled, ..Self::default() }
    }

    fn bump(&self, counter: &AtomicU64) {
        if self.enabled {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_hit(&self) {
        self.bump(&self.hits);
    }

    pub(crate) fn record_miss(&self) {
        self.bump(&self.misses);
    }

    pub(crate) fn record_load(&self) {
        self.bump(&self.loads);
    }

    pub(crate) fn record_load_failure(&self) {
        self.bump(&self.load_failures);
    }

    pub(crate) fn record_eviction(&self) {
        self.bump(&self.evictions);
    }

    pub(crate) fn record_coalesced(&self) {
        self.bump(&self.coalesced);
    }

    /// Get current statistics snapshot
    pub(crate) fn snapshot(&self, size: usize, capacity: usize) -> CacheStats {
        CacheStats {
            size,
            capacity,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            load_failures: self.load_failures.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
        }
    }

    /// Reset all metrics to zero
    pub(crate) fn reset(&self) {
        for counter in [
            &self.hits,
            &self.misses,
            &self.loads,
            &self.load_failures,
            &self.evictions,
            &self.coalesced,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
