//! A bounded, size-aware cache of decoded values.
//!
//! Decoding a chunk into a [`noms_values::Value`] is pure CPU work, not IO,
//! so unlike the chunk store itself this cache does not need an async
//! trait: every operation here is a synchronous map/list manipulation
//! guarded by a plain [`std::sync::Mutex`]. Concurrent *decoding* of the
//! same hash is deduplicated one layer up, in [`crate::DataStore`]; this
//! cache only ever sees completed decodes.
use noms_values::Value;
use std::collections::hash_map::RandomState;
use std::sync::Mutex;

use chunk_store::Hash;
use linked_hash_map::LinkedHashMap;

/// A decoded value, paired with the approximate size it contributes to the
/// cache's size budget.
#[derive(Debug, Clone)]
pub struct CachedValue {
    /// The decoded value.
    pub value: Value,
    /// The approximate number of bytes this entry counts against the
    /// cache's `max_size`, typically the length of the chunk it was
    /// decoded from.
    pub size: usize,
}

/// A cache of decoded values, keyed by the hash of their source chunk.
///
/// Implementations must be safe to share behind an `Arc` across concurrent
/// readers and writers.
pub trait ValueCache: Send + Sync {
    /// Returns the cached entry for `hash`, marking it most-recently-used.
    fn get(&self, hash: Hash) -> Option<CachedValue>;

    /// Records a newly decoded value, evicting least-recently-used entries
    /// if necessary to stay within the cache's size budget.
    fn put(&self, hash: Hash, value: Value, size: usize);
}

/// A [`ValueCache`] with a fixed total-size budget, evicted in
/// least-recently-used order.
///
/// Backed by a [`linked_hash_map::LinkedHashMap`], which gives O(1) lookup,
/// O(1) removal and O(1) move-to-back (most-recently-used) operations, with
/// eviction simply popping from the front of the map's internal list.
pub struct BoundedCache {
    inner: Mutex<Inner>,
    max_size: usize,
}

struct Inner {
    entries: LinkedHashMap<Hash, CachedValue, RandomState>,
    size: usize,
}

impl BoundedCache {
    /// Creates a cache that evicts entries once their combined size exceeds
    /// `max_size` bytes.
    pub fn new(max_size: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: LinkedHashMap::new(),
                size: 0,
            }),
            max_size,
        }
    }

    /// Returns the number of entries currently cached.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    /// Returns `true` if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ValueCache for BoundedCache {
    fn get(&self, hash: Hash) -> Option<CachedValue> {
        let mut inner = self.inner.lock().unwrap();
        inner.entries.get_refresh(&hash).cloned()
    }

    fn put(&self, hash: Hash, value: Value, size: usize) {
        if size > self.max_size {
            // Never fits even alone: don't bother caching it, and don't
            // disturb whatever else is currently cached.
            return;
        }
        let mut inner = self.inner.lock().unwrap();
        if let Some(old) = inner.entries.remove(&hash) {
            inner.size -= old.size;
        }
        while inner.size + size > self.max_size {
            match inner.entries.pop_front() {
                Some((_, evicted)) => inner.size -= evicted.size,
                None => break,
            }
        }
        inner.size += size;
        inner.entries.insert(hash, CachedValue { value, size });
    }
}

/// A [`ValueCache`] that never retains anything, for callers that want the
/// single-flight decode de-duplication `DataStore` provides without the
/// memory overhead of actually keeping values around.
pub struct NoopCache;

impl ValueCache for NoopCache {
    fn get(&self, _hash: Hash) -> Option<CachedValue> {
        None
    }

    fn put(&self, _hash: Hash, _value: Value, _size: usize) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Value {
        Value::String(s.to_string())
    }

    #[test]
    fn put_then_get_round_trips() {
        let cache = BoundedCache::new(1024);
        let h = Hash::of_bytes(b"a");
        cache.put(h, v("a"), 10);
        let entry = cache.get(h).unwrap();
        assert_eq!(entry.value, v("a"));
        assert_eq!(entry.size, 10);
    }

    #[test]
    fn get_of_absent_hash_is_none() {
        let cache = BoundedCache::new(1024);
        assert!(cache.get(Hash::of_bytes(b"missing")).is_none());
    }

    #[test]
    fn eviction_drops_least_recently_used_first() {
        let cache = BoundedCache::new(20);
        let a = Hash::of_bytes(b"a");
        let b = Hash::of_bytes(b"b");
        let c = Hash::of_bytes(b"c");
        cache.put(a, v("a"), 10);
        cache.put(b, v("b"), 10);
        // Touch `a` so `b` becomes the least-recently-used entry.
        cache.get(a);
        cache.put(c, v("c"), 10);

        assert!(cache.get(a).is_some());
        assert!(cache.get(b).is_none());
        assert!(cache.get(c).is_some());
    }

    #[test]
    fn overwriting_an_existing_key_updates_its_size_accounting() {
        let cache = BoundedCache::new(15);
        let h = Hash::of_bytes(b"a");
        cache.put(h, v("a"), 10);
        cache.put(h, v("a-bigger"), 12);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(h).unwrap().size, 12);
    }

    #[test]
    fn an_entry_larger_than_the_whole_budget_is_never_cached() {
        let cache = BoundedCache::new(5);
        let h = Hash::of_bytes(b"too big");
        cache.put(h, v("nope"), 100);
        assert!(cache.is_empty());
        assert!(cache.get(h).is_none());
    }

    #[test]
    fn noop_cache_never_retains_anything() {
        let cache = NoopCache;
        let h = Hash::of_bytes(b"a");
        cache.put(h, v("a"), 1);
        assert!(cache.get(h).is_none());
    }
}
