//! # Bounded Cache
//!
//! A fixed-capacity key/value store with insertion-order eviction. When an
//! insertion would exceed the configured capacity, the entry that was inserted
//! earliest among the current entries is evicted first.
//!
//! This is deliberately simpler than LRU: reads do not refresh an entry's
//! position, and neither does overwriting an existing key. The eviction order
//! is observable behavior that callers may rely on, so it must not be
//! "upgraded" silently.
//!
//! The structure itself is single-threaded. Callers that share one across
//! tasks wrap it in a `Mutex`, the same way the rest of the engine shares
//! mutable state.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

/// A fixed-capacity mapping that evicts its oldest-inserted entry when full.
#[derive(Debug)]
pub struct BoundedCache<K, V> {
    /// Maximum number of entries. `len() <= capacity` holds after every `set`.
    capacity: usize,
    entries: HashMap<K, V>,
    /// Keys in original insertion order, oldest at the front. An overwrite via
    /// `set` does not move the key.
    order: VecDeque<K>,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Creates a cache holding at most `capacity` entries.
    ///
    /// A capacity of zero is treated as one: a cache that can hold nothing
    /// would turn every `set` into a silent drop.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    /// Returns a reference to the value for `key`, if present.
    ///
    /// Lookups do not affect eviction order.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    /// Inserts or overwrites the value for `key`.
    ///
    /// Overwriting keeps the key's *original* insertion position for eviction
    /// purposes. If `key` is new and the cache is at capacity, the single
    /// oldest-inserted entry is evicted before inserting.
    pub fn set(&mut self, key: K, value: V) {
        if let Some(slot) = self.entries.get_mut(&key) {
            *slot = value;
            return;
        }

        if self.entries.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }

        self.order.push_back(key.clone());
        self.entries.insert(key, value);
    }

    /// Removes `key` from the cache, returning its value if it was present.
    pub fn delete(&mut self, key: &K) -> Option<V> {
        let removed = self.entries.remove(key);
        if removed.is_some() {
            self.order.retain(|k| k != key);
        }
        removed
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    /// Current number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The configured maximum capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Keys in eviction order (oldest first). Primarily for diagnostics.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.order.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eviction_is_insertion_ordered() {
        // 1. Fill a capacity-3 cache
        let mut cache = BoundedCache::new(3);
        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("c", 3);
        assert_eq!(cache.len(), 3);

        // 2. Inserting a fourth key evicts the oldest insertion ("a")
        cache.set("d", 4);
        assert_eq!(cache.len(), 3);
        assert!(cache.get(&"a").is_none());
        assert_eq!(cache.get(&"b"), Some(&2));
        assert_eq!(cache.get(&"d"), Some(&4));

        // 3. And the next eviction takes "b"
        cache.set("e", 5);
        assert!(cache.get(&"b").is_none());
        assert_eq!(cache.get(&"c"), Some(&3));
    }

    #[test]
    fn test_overwrite_does_not_refresh_position() {
        let mut cache = BoundedCache::new(2);
        cache.set("a", 1);
        cache.set("b", 2);

        // Overwriting "a" keeps it the oldest-inserted entry.
        cache.set("a", 10);
        assert_eq!(cache.get(&"a"), Some(&10));

        // So a new key still evicts "a" first, not "b".
        cache.set("c", 3);
        assert!(cache.get(&"a").is_none());
        assert_eq!(cache.get(&"b"), Some(&2));
        assert_eq!(cache.get(&"c"), Some(&3));
    }

    #[test]
    fn test_size_never_exceeds_capacity() {
        let capacity = 5;
        let mut cache = BoundedCache::new(capacity);
        for i in 0..50u32 {
            cache.set(i, i * 2);
            assert!(cache.len() <= capacity);
        }
        // The survivors are exactly the last `capacity` insertions.
        for i in 45..50u32 {
            assert_eq!(cache.get(&i), Some(&(i * 2)));
        }
        assert!(cache.get(&44).is_none());
    }

    #[test]
    fn test_delete_and_clear() {
        let mut cache = BoundedCache::new(2);
        cache.set("a", 1);
        cache.set("b", 2);

        assert_eq!(cache.delete(&"a"), Some(1));
        assert_eq!(cache.delete(&"a"), None);
        assert_eq!(cache.len(), 1);

        // Deleting "a" freed its slot; "c" must not evict "b".
        cache.set("c", 3);
        assert_eq!(cache.get(&"b"), Some(&2));

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get(&"b"), None);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut cache = BoundedCache::new(0);
        cache.set("a", 1);
        assert_eq!(cache.capacity(), 1);
        assert_eq!(cache.get(&"a"), Some(&1));
    }
}
