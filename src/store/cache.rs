//! Bounded FIFO cache shared by the disk store's write-back and read
//! layers.
//!
//! FIFO rather than LRU: insertion order approximates tree-construction
//! order well enough, and at hundreds of millions of writes the LRU
//! bookkeeping cost is not worth paying. Re-inserting an existing key
//! replaces its value in place without changing its eviction position.

#![allow(missing_docs)]

use std::collections::{HashMap, VecDeque};

/// Bounded FIFO cache keyed by node path.
#[derive(Debug)]
pub struct FifoCache<V> {
    capacity: usize,
    map: HashMap<String, V>,
    order: VecDeque<String>,
}

impl<V> FifoCache<V> {
    /// A capacity of zero disables the cache: every insert is immediately
    /// handed back as the evicted entry.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            map: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&V> {
        self.map.get(key)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Insert or replace an entry. Returns the entry evicted to make room,
    /// if any.
    pub fn insert(&mut self, key: String, value: V) -> Option<(String, V)> {
        if self.capacity == 0 {
            return Some((key, value));
        }
        if self.map.contains_key(&key) {
            self.map.insert(key, value);
            return None;
        }
        let evicted = if self.map.len() >= self.capacity {
            self.pop_front()
        } else {
            None
        };
        self.order.push_back(key.clone());
        self.map.insert(key, value);
        evicted
    }

    /// Remove an entry. The order queue keeps a tombstone that is skipped
    /// at eviction time.
    pub fn remove(&mut self, key: &str) -> Option<V> {
        self.map.remove(key)
    }

    /// Keys currently resident, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }

    /// Drain every resident entry in insertion order, emptying the cache.
    pub fn drain_in_order(&mut self) -> Vec<(String, V)> {
        let mut drained = Vec::with_capacity(self.map.len());
        while let Some(key) = self.order.pop_front() {
            if let Some(value) = self.map.remove(&key) {
                drained.push((key, value));
            }
        }
        drained
    }

    fn pop_front(&mut self) -> Option<(String, V)> {
        while let Some(key) = self.order.pop_front() {
            if let Some(value) = self.map.remove(&key) {
                return Some((key, value));
            }
            // Tombstone from a remove(); skip.
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_in_insertion_order() {
        let mut cache = FifoCache::new(2);
        assert!(cache.insert("a".to_string(), 1).is_none());
        assert!(cache.insert("b".to_string(), 2).is_none());
        let evicted = cache.insert("c".to_string(), 3).expect("eviction");
        assert_eq!(evicted, ("a".to_string(), 1));
        assert!(cache.contains("b"));
        assert!(cache.contains("c"));
    }

    #[test]
    fn reinsert_replaces_without_eviction() {
        let mut cache = FifoCache::new(2);
        cache.insert("a".to_string(), 1);
        cache.insert("b".to_string(), 2);
        assert!(cache.insert("a".to_string(), 10).is_none());
        assert_eq!(cache.get("a"), Some(&10));
        assert_eq!(cache.len(), 2);
        // "a" kept its original FIFO position, so it still evicts first.
        let evicted = cache.insert("c".to_string(), 3).expect("eviction");
        assert_eq!(evicted.0, "a");
    }

    #[test]
    fn zero_capacity_rejects_everything() {
        let mut cache: FifoCache<u32> = FifoCache::new(0);
        let evicted = cache.insert("a".to_string(), 1).expect("bounce");
        assert_eq!(evicted, ("a".to_string(), 1));
        assert!(cache.is_empty());
    }

    #[test]
    fn removed_entries_leave_skippable_tombstones() {
        let mut cache = FifoCache::new(2);
        cache.insert("a".to_string(), 1);
        cache.insert("b".to_string(), 2);
        assert_eq!(cache.remove("a"), Some(1));
        // "a" is gone; inserting two more should evict "b" first, not "a".
        let first = cache.insert("c".to_string(), 3);
        assert!(first.is_none(), "slot freed by remove should be reused");
        let evicted = cache.insert("d".to_string(), 4).expect("eviction");
        assert_eq!(evicted.0, "b");
    }

    #[test]
    fn drain_preserves_insertion_order() {
        let mut cache = FifoCache::new(8);
        for (i, key) in ["x", "y", "z"].iter().enumerate() {
            cache.insert((*key).to_string(), i);
        }
        let drained = cache.drain_in_order();
        let keys: Vec<&str> = drained.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["x", "y", "z"]);
        assert!(cache.is_empty());
    }
}
