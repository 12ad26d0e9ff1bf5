use async_trait::async_trait;
use chunk_store::{Chunk, ChunkStore, Hash, MemoryChunkStore};
use datastore::cache::{BoundedCache, CachedValue, NoopCache, ValueCache};
use datastore::DataStore;
use noms_values::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Wraps a [`MemoryChunkStore`], counting `put` calls so tests can assert on
/// whether a write actually reached the backend or was skipped because the
/// value cache already believed the chunk present.
#[derive(Clone)]
struct CountingStore {
    inner: Arc<MemoryChunkStore>,
    puts: Arc<AtomicUsize>,
}

impl CountingStore {
    fn new() -> Self {
        Self {
            inner: Arc::new(MemoryChunkStore::new()),
            puts: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChunkStore for CountingStore {
    async fn get(&self, h: Hash) -> chunk_store::Result<Chunk> {
        self.inner.get(h).await
    }

    async fn put(&self, chunk: Chunk) -> chunk_store::Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(chunk).await
    }

    async fn get_root(&self) -> chunk_store::Result<Hash> {
        self.inner.get_root().await
    }

    async fn update_root(&self, new: Hash, expected: Hash) -> chunk_store::Result<bool> {
        self.inner.update_root(new, expected).await
    }
}

#[test]
fn bounded_cache_evicts_oldest_untouched_entry_first() {
    let cache = BoundedCache::new(30);
    let a = Hash::of_bytes(b"a");
    let b = Hash::of_bytes(b"b");
    let c = Hash::of_bytes(b"c");
    let d = Hash::of_bytes(b"d");

    cache.put(a, Value::String("a".into()), 10);
    cache.put(b, Value::String("b".into()), 10);
    cache.put(c, Value::String("c".into()), 10);
    // budget is full; inserting `d` must evict `a` (oldest, untouched).
    cache.put(d, Value::String("d".into()), 10);

    assert!(cache.get(a).is_none());
    assert!(cache.get(b).is_some());
    assert!(cache.get(c).is_some());
    assert!(cache.get(d).is_some());
}

#[test]
fn cached_value_carries_the_size_it_was_stored_with() {
    let cache = BoundedCache::new(100);
    let h = Hash::of_bytes(b"x");
    cache.put(h, Value::Bool(true), 42);
    let CachedValue { value, size } = cache.get(h).unwrap();
    assert_eq!(value, Value::Bool(true));
    assert_eq!(size, 42);
}

#[test]
fn noop_cache_is_a_valid_value_cache_impl() {
    let cache: Arc<dyn ValueCache> = Arc::new(NoopCache);
    let h = Hash::of_bytes(b"x");
    cache.put(h, Value::Bool(true), 1);
    assert!(cache.get(h).is_none());
}

#[tokio::test]
async fn concurrent_reads_of_the_same_ref_see_the_same_value() {
    let store = DataStore::new(Arc::new(MemoryChunkStore::new()), 1 << 20);
    let r = store
        .write_value(Value::String("shared".into()), None)
        .await
        .unwrap();

    let (a, b) = tokio::join!(store.read_value(&r), store.read_value(&r));
    assert_eq!(a.unwrap(), Value::String("shared".into()));
    assert_eq!(b.unwrap(), Value::String("shared".into()));
}

#[tokio::test]
async fn write_value_skips_the_put_when_the_chunk_is_already_cached() {
    let backend = CountingStore::new();
    let store = DataStore::new(Arc::new(backend.clone()), 1 << 20);
    let value = Value::String("reused".into());

    let r1 = store.write_value(value.clone(), None).await.unwrap();
    assert_eq!(backend.put_count(), 1);

    let r2 = store.write_value(value, None).await.unwrap();
    assert_eq!(r1, r2);
    assert_eq!(backend.put_count(), 1, "second write should hit the cache, not the backend");
}

#[tokio::test]
async fn a_datastore_built_with_a_noop_cache_still_reads_values_back() {
    let store = DataStore::new(Arc::new(MemoryChunkStore::new()), 0);
    let r = store
        .write_value(Value::String("no cache".into()), None)
        .await
        .unwrap();
    assert_eq!(
        store.read_value(&r).await.unwrap(),
        Value::String("no cache".into())
    );
}
