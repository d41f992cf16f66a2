//! Ordered Index Module
//!
//! A hashmap from key to arena slot, paired with a doubly linked list threaded
//! through the arena that orders entries from most recently used (head) to
//! least recently used (tail).
//!
//! None of these operations lock; the owning [`Memcache`](super::Memcache)
//! holds its mutex around every call.

use std::collections::HashMap;

use crate::cache::Entry;

// == Ordered Index ==
/// O(1) lookup, promote-to-head, insert-at-head and evict-at-tail.
///
/// Entries live in `slots`; vacated slots are recycled through `free`.
/// The map is the authoritative owner of a slot, the list links are
/// structural only.
#[derive(Debug)]
pub struct OrderedIndex<V> {
    /// Key to slot mapping
    map: HashMap<String, usize>,
    /// Entry arena
    slots: Vec<Option<Entry<V>>>,
    /// Vacated slots available for reuse
    free: Vec<usize>,
    /// Most recently used slot
    head: Option<usize>,
    /// Least recently used slot
    tail: Option<usize>,
}

impl<V> Default for OrderedIndex<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> OrderedIndex<V> {
    // == Constructor ==
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty index with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            map: HashMap::with_capacity(capacity),
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            head: None,
            tail: None,
        }
    }

    // == Length ==
    /// Returns the number of indexed entries.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns true if the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    // == Lookup ==
    /// Returns the slot holding `key`, without touching recency.
    pub fn lookup(&self, key: &str) -> Option<usize> {
        self.map.get(key).copied()
    }

    /// Returns the entry stored in `slot`.
    pub fn entry(&self, slot: usize) -> &Entry<V> {
        self.node(slot)
    }

    /// Returns a mutable reference to the value stored in `slot`.
    pub fn value_mut(&mut self, slot: usize) -> &mut V {
        &mut self.node_mut(slot).value
    }

    /// Returns the most recently used entry.
    pub fn head(&self) -> Option<&Entry<V>> {
        self.head.map(|slot| self.node(slot))
    }

    /// Returns the least recently used entry.
    pub fn tail(&self) -> Option<&Entry<V>> {
        self.tail.map(|slot| self.node(slot))
    }

    /// True if `slot` is the current head.
    pub fn is_head(&self, slot: usize) -> bool {
        self.head == Some(slot)
    }

    // == Promote ==
    /// Moves the entry in `slot` to the head of the list.
    ///
    /// Already-head entries are left untouched. The tail is repaired when the
    /// promoted entry was the tail.
    pub fn promote(&mut self, slot: usize) {
        if self.is_head(slot) {
            return;
        }
        self.unlink(slot);
        self.push_head(slot);
    }

    // == Insert At Head ==
    /// Allocates an entry for `key` and makes it the new head.
    ///
    /// The key must not already be present.
    pub fn insert_at_head(&mut self, key: String, value: V) -> usize {
        debug_assert!(
            !self.map.contains_key(&key),
            "insert_at_head called for a key that is already indexed"
        );
        let slot = self.alloc(Entry::new(key.clone(), value));
        self.map.insert(key, slot);
        self.push_head(slot);
        slot
    }

    // == Evict Tail ==
    /// Removes the least recently used entry from both the map and the list.
    pub fn evict_tail(&mut self) -> Option<Entry<V>> {
        let slot = self.tail?;
        self.unlink(slot);
        let entry = self.release(slot);
        self.map.remove(&entry.key);
        Some(entry)
    }

    // == Remove ==
    /// Removes `key` from the map and the list, repairing head and tail.
    pub fn remove(&mut self, key: &str) -> Option<Entry<V>> {
        let slot = self.map.remove(key)?;
        self.unlink(slot);
        Some(self.release(slot))
    }

    // == Clear ==
    /// Drops every entry and resets the list pointers.
    pub fn clear(&mut self) {
        self.map.clear();
        self.slots.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
    }

    // == Iteration ==
    /// Iterates entries from head (most recent) to tail.
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            index: self,
            cursor: self.head,
            remaining: self.len(),
            forward: true,
        }
    }

    /// Iterates entries from tail (least recent) to head.
    pub fn iter_rev(&self) -> Iter<'_, V> {
        Iter {
            index: self,
            cursor: self.tail,
            remaining: self.len(),
            forward: false,
        }
    }

    // == Consistency Check ==
    /// Walks the whole list and verifies the map/list bijection.
    ///
    /// Checks that the forward walk visits exactly `len()` entries, that every
    /// back link mirrors its forward link, that the walk ends at `tail`, and
    /// that every visited key maps back to the visited slot.
    pub fn check_consistency(&self) -> Result<(), String> {
        if self.map.is_empty() {
            if self.head.is_some() || self.tail.is_some() {
                return Err("empty index with dangling head or tail".to_string());
            }
            return Ok(());
        }

        let mut visited = 0usize;
        let mut previous: Option<usize> = None;
        let mut cursor = self.head;

        while let Some(slot) = cursor {
            if visited == self.map.len() {
                return Err(format!(
                    "list is longer than the map ({} entries), possible cycle",
                    self.map.len()
                ));
            }
            let entry = match self.slots.get(slot).and_then(Option::as_ref) {
                Some(entry) => entry,
                None => return Err(format!("list links vacant slot {}", slot)),
            };
            if entry.prev != previous {
                return Err(format!(
                    "broken back link at key {:?}: expected {:?}, found {:?}",
                    entry.key, previous, entry.prev
                ));
            }
            if self.map.get(&entry.key) != Some(&slot) {
                return Err(format!("key {:?} is not mapped to its slot", entry.key));
            }
            visited += 1;
            previous = Some(slot);
            cursor = entry.next;
        }

        if visited != self.map.len() {
            return Err(format!(
                "list has {} entries but map has {}",
                visited,
                self.map.len()
            ));
        }
        if previous != self.tail {
            return Err("walk did not end at tail".to_string());
        }
        Ok(())
    }

    // --- Internal list plumbing ---

    fn node(&self, slot: usize) -> &Entry<V> {
        match self.slots.get(slot) {
            Some(Some(entry)) => entry,
            _ => unreachable!("recency list references vacant slot {}", slot),
        }
    }

    fn node_mut(&mut self, slot: usize) -> &mut Entry<V> {
        match self.slots.get_mut(slot) {
            Some(Some(entry)) => entry,
            _ => unreachable!("recency list references vacant slot {}", slot),
        }
    }

    fn alloc(&mut self, entry: Entry<V>) -> usize {
        match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(entry);
                slot
            }
            None => {
                self.slots.push(Some(entry));
                self.slots.len() - 1
            }
        }
    }

    fn release(&mut self, slot: usize) -> Entry<V> {
        match self.slots.get_mut(slot).and_then(Option::take) {
            Some(entry) => {
                self.free.push(slot);
                entry
            }
            None => unreachable!("released vacant slot {}", slot),
        }
    }

    /// Detaches `slot` from its neighbors. Does not free the slot.
    fn unlink(&mut self, slot: usize) {
        let (prev, next) = {
            let entry = self.node(slot);
            (entry.prev, entry.next)
        };

        match prev {
            Some(p) => self.node_mut(p).next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.node_mut(n).prev = prev,
            None => self.tail = prev,
        }

        let entry = self.node_mut(slot);
        entry.prev = None;
        entry.next = None;
    }

    fn push_head(&mut self, slot: usize) {
        let old_head = self.head;
        {
            let entry = self.node_mut(slot);
            entry.prev = None;
            entry.next = old_head;
        }
        match old_head {
            Some(h) => self.node_mut(h).prev = Some(slot),
            None => self.tail = Some(slot),
        }
        self.head = Some(slot);
    }
}

// == Iterator ==
/// Walks the recency list in one direction, yielding `(key, value)`.
pub struct Iter<'a, V> {
    index: &'a OrderedIndex<V>,
    cursor: Option<usize>,
    remaining: usize,
    forward: bool,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (&'a str, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.cursor?;
        let entry = self.index.node(slot);
        self.cursor = if self.forward { entry.next } else { entry.prev };
        self.remaining = self.remaining.saturating_sub(1);
        Some((entry.key.as_str(), &entry.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<V> ExactSizeIterator for Iter<'_, V> {}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn keys(index: &OrderedIndex<u32>) -> Vec<String> {
        index.iter().map(|(k, _)| k.to_string()).collect()
    }

    fn keys_rev(index: &OrderedIndex<u32>) -> Vec<String> {
        index.iter_rev().map(|(k, _)| k.to_string()).collect()
    }

    fn filled(n: u32) -> OrderedIndex<u32> {
        let mut index = OrderedIndex::new();
        for i in 0..n {
            index.insert_at_head(i.to_string(), i);
        }
        index
    }

    #[test]
    fn test_index_new_is_empty() {
        let index: OrderedIndex<u32> = OrderedIndex::new();
        assert!(index.is_empty());
        assert!(index.head().is_none());
        assert!(index.tail().is_none());
        assert!(index.check_consistency().is_ok());
    }

    #[test]
    fn test_insert_single_is_head_and_tail() {
        let index = filled(1);
        assert_eq!(index.head().map(|e| e.key()), Some("0"));
        assert_eq!(index.tail().map(|e| e.key()), Some("0"));
        assert!(index.check_consistency().is_ok());
    }

    #[test]
    fn test_insert_orders_newest_first() {
        let index = filled(4);
        assert_eq!(keys(&index), vec!["3", "2", "1", "0"]);
        assert_eq!(keys_rev(&index), vec!["0", "1", "2", "3"]);
        assert!(index.check_consistency().is_ok());
    }

    #[test]
    fn test_promote_tail_repairs_tail() {
        let mut index = filled(3);
        let slot = index.lookup("0").unwrap();

        index.promote(slot);

        assert_eq!(keys(&index), vec!["0", "2", "1"]);
        assert_eq!(index.tail().map(|e| e.key()), Some("1"));
        assert!(index.check_consistency().is_ok());
    }

    #[test]
    fn test_promote_middle() {
        let mut index = filled(3);
        let slot = index.lookup("1").unwrap();

        index.promote(slot);

        assert_eq!(keys(&index), vec!["1", "2", "0"]);
        assert!(index.check_consistency().is_ok());
    }

    #[test]
    fn test_promote_head_is_noop() {
        let mut index = filled(3);
        let slot = index.lookup("2").unwrap();

        index.promote(slot);

        assert_eq!(keys(&index), vec!["2", "1", "0"]);
        assert!(index.check_consistency().is_ok());
    }

    #[test]
    fn test_evict_tail() {
        let mut index = filled(3);

        let evicted = index.evict_tail().unwrap();
        assert_eq!(evicted.key(), "0");
        assert_eq!(index.len(), 2);
        assert_eq!(index.tail().map(|e| e.key()), Some("1"));
        assert!(index.lookup("0").is_none());
        assert!(index.check_consistency().is_ok());
    }

    #[test]
    fn test_evict_tail_until_empty() {
        let mut index = filled(2);

        assert!(index.evict_tail().is_some());
        assert!(index.evict_tail().is_some());
        assert!(index.evict_tail().is_none());
        assert!(index.head().is_none());
        assert!(index.tail().is_none());
        assert!(index.check_consistency().is_ok());
    }

    #[test]
    fn test_remove_head_leaves_no_back_link() {
        let mut index = filled(3);

        let removed = index.remove("2").unwrap();
        assert_eq!(removed.into_parts(), ("2".to_string(), 2));

        let head = index.head().unwrap();
        assert_eq!(head.key(), "1");
        assert!(head.prev.is_none());
        assert!(index.check_consistency().is_ok());
    }

    #[test]
    fn test_remove_only_entry_empties_list() {
        let mut index = filled(1);

        index.remove("0");

        assert!(index.is_empty());
        assert!(index.head().is_none());
        assert!(index.tail().is_none());
    }

    #[test]
    fn test_remove_missing_is_none() {
        let mut index = filled(2);
        assert!(index.remove("missing").is_none());
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_slots_are_recycled() {
        let mut index = filled(3);
        index.remove("1");
        index.insert_at_head("x".to_string(), 9);

        assert_eq!(index.slots.len(), 3);
        assert_eq!(keys(&index), vec!["x", "2", "0"]);
        assert!(index.check_consistency().is_ok());
    }

    #[test]
    fn test_value_mut() {
        let mut index = filled(2);
        let slot = index.lookup("0").unwrap();
        *index.value_mut(slot) = 100;
        assert_eq!(*index.entry(slot).value(), 100);
    }

    #[test]
    fn test_clear() {
        let mut index = filled(5);
        index.clear();
        assert!(index.is_empty());
        assert_eq!(index.iter().count(), 0);
        assert!(index.check_consistency().is_ok());
    }

    #[test]
    fn test_consistency_detects_broken_back_link() {
        let mut index = filled(3);
        let slot = index.lookup("1").unwrap();
        index.node_mut(slot).prev = None;

        assert!(index.check_consistency().is_err());
    }

    #[test]
    fn test_iter_size_hint() {
        let index = filled(4);
        assert_eq!(index.iter().len(), 4);
        assert_eq!(index.iter_rev().len(), 4);
    }
}
