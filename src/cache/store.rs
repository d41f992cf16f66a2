//! Cache Store Module
//!
//! The cache engine: an [`OrderedIndex`] bounded by a fixed capacity, an
//! optional [`ExpiryTable`], and a single mutex that makes every operation
//! one atomic critical section.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::cache::{current_timestamp_ms, CacheStats, ExpiryTable, OrderedIndex};
use crate::config::Config;
use crate::tasks::{spawn_expiry_task, ExpiryTask};

/// Interval between expiry sweeps when none is configured.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_millis(100);

// == Locked State ==
/// Everything that can change the list/map structure lives behind one lock.
#[derive(Debug)]
struct State<V> {
    index: OrderedIndex<V>,
    expiry: ExpiryTable,
    stats: CacheStats,
}

// == Memcache ==
/// Concurrency-safe, capacity-bounded LRU cache with optional per-key expiry.
///
/// `size` mirrors the index length so [`Memcache::size`] never takes the lock;
/// it is only written while the lock is held.
pub struct Memcache<V> {
    /// Maximum number of entries, fixed at construction
    cap: usize,
    /// Whether `set_expire` registers deadlines
    expiry_enabled: bool,
    /// Current entry count
    size: AtomicUsize,
    /// Index, expiry table and counters
    state: Mutex<State<V>>,
    /// Background sweep, when one was spawned for this instance
    sweeper: Mutex<Option<ExpiryTask>>,
}

impl<V> fmt::Debug for Memcache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memcache")
            .field("cap", &self.cap)
            .field("size", &self.size())
            .field("expiry_enabled", &self.expiry_enabled)
            .finish()
    }
}

impl<V: Send + 'static> Memcache<V> {
    // == With Capacity ==
    /// Creates a shared cache holding at most `cap` entries.
    ///
    /// With `expiry_enabled`, a sweep runs every [`DEFAULT_SWEEP_INTERVAL`]
    /// on the current Tokio runtime. Outside a runtime no sweep is spawned and
    /// [`Memcache::sweep_expired`] has to be driven by the caller.
    ///
    /// # Panics
    /// Panics if `cap` is 0.
    pub fn with_capacity(cap: usize, expiry_enabled: bool) -> Arc<Self> {
        Self::with_options(cap, expiry_enabled, DEFAULT_SWEEP_INTERVAL)
    }

    /// Like [`Memcache::with_capacity`], with an explicit sweep interval.
    pub fn with_options(cap: usize, expiry_enabled: bool, sweep_interval: Duration) -> Arc<Self> {
        let cache = Arc::new(Self::new(cap, expiry_enabled));
        if expiry_enabled {
            start_sweeper(&cache, sweep_interval);
        }
        cache
    }

    /// Creates a shared cache from loaded configuration.
    pub fn from_config(config: &Config) -> Arc<Self> {
        Self::with_options(
            config.capacity,
            config.expiry_enabled,
            Duration::from_millis(config.sweep_interval_ms),
        )
    }

    /// Creates a shared cache whose recency order is exactly `nodes`, first
    /// node at the head. Keys must be distinct and `nodes.len() <= cap`.
    pub(crate) fn from_ordered(
        cap: usize,
        expiry_enabled: bool,
        sweep_interval: Duration,
        nodes: Vec<(String, V)>,
    ) -> Arc<Self> {
        let cache = Self::new(cap, expiry_enabled);
        {
            let mut state = cache.state.lock();
            for (key, value) in nodes.into_iter().rev() {
                state.index.insert_at_head(key, value);
            }
            cache.sync_size(&mut state);
        }

        let cache = Arc::new(cache);
        if expiry_enabled {
            start_sweeper(&cache, sweep_interval);
        }
        cache
    }
}

impl<V> Memcache<V> {
    // == Constructor ==
    /// Creates a cache without spawning any background sweep.
    ///
    /// # Panics
    /// Panics if `cap` is 0.
    pub fn new(cap: usize, expiry_enabled: bool) -> Self {
        assert!(cap > 0, "Memcache capacity must be > 0");
        Self {
            cap,
            expiry_enabled,
            size: AtomicUsize::new(0),
            state: Mutex::new(State {
                index: OrderedIndex::with_capacity(cap.min(1024)),
                expiry: ExpiryTable::new(),
                stats: CacheStats::new(),
            }),
            sweeper: Mutex::new(None),
        }
    }

    // == Set ==
    /// Inserts or overwrites `key`, making it the most recently used entry.
    ///
    /// Admitting a new key into a full cache evicts the least recently used
    /// entry. Overwriting counts as an access even if the value is unchanged.
    pub fn set(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        let mut state = self.state.lock();
        self.set_locked(&mut state, key, value);
    }

    // == Set Expire ==
    /// Stores `key` like [`Memcache::set`] and schedules it to be removed
    /// `ttl_seconds` from now.
    ///
    /// Does nothing when the cache was built with expiry disabled. Earlier
    /// deadlines for the same key stay registered; whichever fires first
    /// removes the entry.
    pub fn set_expire(&self, key: impl Into<String>, value: V, ttl_seconds: i64) {
        if !self.expiry_enabled {
            return;
        }
        let key = key.into();
        let ttl_ms = (ttl_seconds.max(0) as u64).saturating_mul(1000);
        let deadline = current_timestamp_ms().saturating_add(ttl_ms);

        let mut state = self.state.lock();
        state.expiry.schedule(&key, deadline);
        self.set_locked(&mut state, key, value);
    }

    // == Get ==
    /// Returns a copy of the value for `key`, promoting it to most recently used.
    pub fn get(&self, key: &str) -> Option<V>
    where
        V: Clone,
    {
        let mut state = self.state.lock();
        match state.index.lookup(key) {
            Some(slot) => {
                state.index.promote(slot);
                state.stats.record_hit();
                Some(state.index.entry(slot).value().clone())
            }
            None => {
                state.stats.record_miss();
                None
            }
        }
    }

    // == Contains ==
    /// Returns true if `key` is present. Does not change recency.
    pub fn contains(&self, key: &str) -> bool {
        self.state.lock().index.lookup(key).is_some()
    }

    // == Delete ==
    /// Removes `key` and any pending expiry for it, returning the old value.
    pub fn delete(&self, key: &str) -> Option<V> {
        let mut state = self.state.lock();
        let removed = self.delete_locked(&mut state, key);
        if removed.is_some() {
            state.stats.record_removal();
        }
        removed
    }

    // == Clear ==
    /// Drops every entry and every pending expiry in one critical section.
    ///
    /// Counters other than `total_entries` are kept.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        let dropped = state.index.len();
        state.index.clear();
        state.expiry.clear();
        self.sync_size(&mut state);
        debug!(dropped, "cache cleared");
    }

    // == Size / Cap ==
    /// Returns the current number of entries without taking the lock.
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    /// Returns the maximum number of entries.
    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Returns true if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Returns true if `set_expire` is honored by this instance.
    pub fn is_expiry_enabled(&self) -> bool {
        self.expiry_enabled
    }

    // == Expiry Sweep ==
    /// Removes every key whose deadline has passed. Returns the number of
    /// cache entries removed.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(current_timestamp_ms())
    }

    /// Runs one expiry sweep as if the current time were `now_ms`.
    ///
    /// Deadlines for keys that are already gone are discarded silently.
    pub fn sweep_expired_at(&self, now_ms: u64) -> usize {
        if !self.expiry_enabled {
            return 0;
        }
        let mut state = self.state.lock();
        let due = state.expiry.take_due(now_ms);
        if due.is_empty() {
            return 0;
        }

        let mut removed = 0usize;
        for key in &due {
            if self.delete_locked(&mut state, key).is_some() {
                removed += 1;
            }
        }
        state.stats.record_expirations(removed as u64);
        debug!(due = due.len(), removed, "expiry deadlines processed");
        removed
    }

    /// Returns the number of pending (key, deadline) registrations.
    pub fn pending_expirations(&self) -> usize {
        self.state.lock().expiry.len()
    }

    // == Shutdown ==
    /// Signals the background sweep, if any, to stop. Idempotent.
    pub fn shutdown(&self) {
        if let Some(task) = self.sweeper.lock().take() {
            task.cancel();
        }
    }

    /// Returns true if a background sweep is attached to this instance.
    pub fn has_sweeper(&self) -> bool {
        self.sweeper.lock().is_some()
    }

    // == Stats ==
    /// Returns a copy of the current counters.
    pub fn stats(&self) -> CacheStats {
        self.state.lock().stats.clone()
    }

    // == Introspection ==
    /// Keys from most to least recently used.
    pub fn keys(&self) -> Vec<String> {
        self.with_index(|index| index.iter().map(|(k, _)| k.to_string()).collect())
    }

    /// Key/value pairs from most to least recently used.
    pub fn entries(&self) -> Vec<(String, V)>
    where
        V: Clone,
    {
        self.with_index(|index| {
            index
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect()
        })
    }

    /// Key/value pairs from least to most recently used.
    pub fn entries_rev(&self) -> Vec<(String, V)>
    where
        V: Clone,
    {
        self.with_index(|index| {
            index
                .iter_rev()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect()
        })
    }

    /// Most recently used key.
    pub fn head_key(&self) -> Option<String> {
        self.with_index(|index| index.head().map(|e| e.key().to_string()))
    }

    /// Least recently used key.
    pub fn tail_key(&self) -> Option<String> {
        self.with_index(|index| index.tail().map(|e| e.key().to_string()))
    }

    /// Verifies the map/list bijection and the size counter under the lock.
    pub fn check_consistency(&self) -> Result<(), String> {
        let state = self.state.lock();
        state.index.check_consistency()?;
        let size = self.size();
        if size != state.index.len() {
            return Err(format!(
                "size counter {} disagrees with index length {}",
                size,
                state.index.len()
            ));
        }
        if size > self.cap {
            return Err(format!("size {} exceeds capacity {}", size, self.cap));
        }
        Ok(())
    }

    /// Runs `f` against the index while holding the lock.
    pub(crate) fn with_index<R>(&self, f: impl FnOnce(&OrderedIndex<V>) -> R) -> R {
        let state = self.state.lock();
        f(&state.index)
    }

    // --- Locked helpers ---

    fn set_locked(&self, state: &mut MutexGuard<'_, State<V>>, key: String, value: V) {
        if let Some(slot) = state.index.lookup(&key) {
            *state.index.value_mut(slot) = value;
            state.index.promote(slot);
            state.stats.record_update();
            return;
        }

        state.index.insert_at_head(key, value);
        state.stats.record_insertion();
        if state.index.len() > self.cap {
            if let Some(evicted) = state.index.evict_tail() {
                state.expiry.cancel(evicted.key());
                state.stats.record_eviction();
                debug!(key = evicted.key(), "evicted least recently used entry");
            }
        }
        self.sync_size(state);
    }

    fn delete_locked(&self, state: &mut MutexGuard<'_, State<V>>, key: &str) -> Option<V> {
        let entry = state.index.remove(key)?;
        state.expiry.cancel(key);
        self.sync_size(state);
        let (_, value) = entry.into_parts();
        Some(value)
    }

    fn sync_size(&self, state: &mut MutexGuard<'_, State<V>>) {
        let len = state.index.len();
        debug_assert!(len <= self.cap, "index length {} exceeds cap {}", len, self.cap);
        debug_assert_eq!(len == 0, state.index.head().is_none());
        state.stats.set_total_entries(len);
        self.size.store(len, Ordering::Release);
    }
}

impl<V> Drop for Memcache<V> {
    fn drop(&mut self) {
        if let Some(task) = self.sweeper.get_mut().take() {
            task.cancel();
        }
    }
}

/// Attaches a background sweep to `cache` if a Tokio runtime is available.
fn start_sweeper<V: Send + 'static>(cache: &Arc<Memcache<V>>, interval: Duration) {
    match tokio::runtime::Handle::try_current() {
        Ok(_) => {
            let weak: Weak<Memcache<V>> = Arc::downgrade(cache);
            let task = spawn_expiry_task(weak, interval);
            *cache.sweeper.lock() = Some(task);
        }
        Err(_) => {
            warn!("expiry enabled outside a Tokio runtime; no background sweep was started");
        }
    }
}
