//! Cache Entry Module
//!
//! Defines the node stored for each key, linked into the recency list by slot index.

use std::time::{SystemTime, UNIX_EPOCH};

// == Entry ==
/// One stored key/value pair plus its position in the recency list.
///
/// `prev` points towards the head (more recently used), `next` towards the
/// tail (less recently used). Both are slot indices into the owning
/// [`OrderedIndex`](super::OrderedIndex) arena, never owning references.
#[derive(Debug, Clone)]
pub struct Entry<V> {
    /// The key, immutable once the entry is created
    pub(crate) key: String,
    /// The stored value, opaque to the cache
    pub(crate) value: V,
    /// Slot of the neighbor closer to the head
    pub(crate) prev: Option<usize>,
    /// Slot of the neighbor closer to the tail
    pub(crate) next: Option<usize>,
}

impl<V> Entry<V> {
    // == Constructor ==
    /// Creates an unlinked entry.
    pub fn new(key: String, value: V) -> Self {
        Self {
            key,
            value,
            prev: None,
            next: None,
        }
    }

    /// Returns the entry's key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the stored value.
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Consumes the entry, returning its key and value.
    pub fn into_parts(self) -> (String, V) {
        (self.key, self.value)
    }

    // == Is Linked ==
    /// True if the entry has at least one neighbor in the list.
    #[cfg(test)]
    pub(crate) fn is_linked(&self) -> bool {
        self.prev.is_some() || self.next.is_some()
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
///
/// A clock set before the epoch yields 0 rather than panicking.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
