//! Expiry Table Module
//!
//! Time-bucketed schedule of keys waiting to expire. Buckets are keyed by an
//! absolute deadline in Unix milliseconds.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

// == Expiry Table ==
/// Deadline buckets plus a reverse index from key to its pending deadlines.
///
/// Guarded by the same lock as the cache index it belongs to.
#[derive(Debug, Default)]
pub struct ExpiryTable {
    /// Deadline (ms) to keys scheduled at that deadline
    buckets: BTreeMap<u64, HashSet<String>>,
    /// Key to every deadline it is currently registered under
    deadlines: HashMap<String, BTreeSet<u64>>,
}

impl ExpiryTable {
    // == Constructor ==
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    // == Schedule ==
    /// Registers `key` to expire at `deadline_ms`.
    ///
    /// Earlier registrations for the same key are kept.
    pub fn schedule(&mut self, key: &str, deadline_ms: u64) {
        self.buckets
            .entry(deadline_ms)
            .or_default()
            .insert(key.to_string());
        self.deadlines
            .entry(key.to_string())
            .or_default()
            .insert(deadline_ms);
    }

    // == Cancel ==
    /// Drops every pending deadline for `key`. Returns how many were dropped.
    pub fn cancel(&mut self, key: &str) -> usize {
        let Some(deadlines) = self.deadlines.remove(key) else {
            return 0;
        };

        for deadline in &deadlines {
            if let Some(bucket) = self.buckets.get_mut(deadline) {
                bucket.remove(key);
                if bucket.is_empty() {
                    self.buckets.remove(deadline);
                }
            }
        }
        deadlines.len()
    }

    // == Take Due ==
    /// Removes every bucket with a deadline at or before `now_ms` and returns
    /// the keys they held, earliest bucket first.
    ///
    /// A key registered in several due buckets is returned once.
    pub fn take_due(&mut self, now_ms: u64) -> Vec<String> {
        let later = match now_ms.checked_add(1) {
            Some(bound) => self.buckets.split_off(&bound),
            None => BTreeMap::new(),
        };
        let due = std::mem::replace(&mut self.buckets, later);

        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        for (deadline, bucket) in due {
            for key in bucket {
                if let Some(pending) = self.deadlines.get_mut(&key) {
                    pending.remove(&deadline);
                    if pending.is_empty() {
                        self.deadlines.remove(&key);
                    }
                }
                if seen.insert(key.clone()) {
                    keys.push(key);
                }
            }
        }
        keys
    }

    // == Next Deadline ==
    /// Returns the earliest pending deadline, if any.
    #[cfg(test)]
    pub(crate) fn next_deadline(&self) -> Option<u64> {
        self.buckets.keys().next().copied()
    }

    /// Returns true if `key` has at least one pending deadline.
    #[cfg(test)]
    pub(crate) fn is_scheduled(&self, key: &str) -> bool {
        self.deadlines.contains_key(key)
    }

    /// Returns the number of pending (key, deadline) registrations.
    pub fn len(&self) -> usize {
        self.buckets.values().map(HashSet::len).sum()
    }

    /// Returns true if nothing is scheduled.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    // == Clear ==
    /// Forgets every scheduled deadline.
    pub fn clear(&mut self) {
        self.buckets.clear();
        self.deadlines.clear();
    }
}
