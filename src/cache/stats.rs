//! Cache Statistics Module
//!
//! Counters maintained under the cache lock and handed out as copies.

use serde::Serialize;

// == Cache Stats ==
/// Snapshot of a cache's counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups that found their key
    pub hits: u64,
    /// Lookups for a key that was not present
    pub misses: u64,
    /// New keys admitted
    pub insertions: u64,
    /// Writes to a key that was already present
    pub updates: u64,
    /// Entries evicted because the cache was full
    pub evictions: u64,
    /// Entries removed by the expiry sweep
    pub expirations: u64,
    /// Entries removed by an explicit delete
    pub removals: u64,
    /// Entries currently held
    pub total_entries: usize,
}

impl CacheStats {
    /// Creates a zeroed set of counters.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Fraction of lookups that were hits, 0.0 when nothing was looked up.
    pub fn hit_rate(&self) -> f64 {
        match self.lookups() {
            0 => 0.0,
            total => self.hits as f64 / total as f64,
        }
    }

    /// Total number of lookups.
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }

    pub(crate) fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub(crate) fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub(crate) fn record_insertion(&mut self) {
        self.insertions += 1;
    }

    pub(crate) fn record_update(&mut self) {
        self.updates += 1;
    }

    pub(crate) fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub(crate) fn record_removal(&mut self) {
        self.removals += 1;
    }

    pub(crate) fn record_expirations(&mut self, count: u64) {
        self.expirations += count;
    }

    pub(crate) fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}
