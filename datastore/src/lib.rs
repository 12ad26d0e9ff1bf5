//! # The version-control layer over a content-addressed chunk store.
//!
//! This crate provides [`DataStore`]: a set of named datasets, each pointing
//! at a head commit, all reachable from a single root hash kept in a
//! [`chunk_store::ChunkStore`] and advanced only by compare-and-swap.
//! Committing a new value never overwrites history — it writes new chunks
//! and then atomically swaps the root pointer — so a `DataStore` handle
//! obtained before a commit keeps seeing exactly the state it started with,
//! while a fresh commit result sees the new state.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use chunk_store::MemoryChunkStore;
//! use datastore::DataStore;
//! use noms_values::Value;
//!
//! # #[tokio::main]
//! # async fn main() -> datastore::Result<()> {
//! let store = DataStore::new(Arc::new(MemoryChunkStore::new()), 1 << 20);
//!
//! let value = store.write_value(Value::String("hello".into()), None).await?;
//! let commit = noms_values::Commit { value: Value::Ref(value), parents: Default::default() };
//! let (store, head) = store.commit("main", commit).await?;
//!
//! assert_eq!(store.head("main").await?, Some(head));
//! # Ok(())
//! # }
//! ```
#![deny(missing_docs)]

pub mod ancestry;
pub mod cache;
pub mod dataset_map;

use ancestry::CommitSource;
use async_trait::async_trait;
use cache::ValueCache;
use chunk_store::{ChunkStore, Hash};
use log::warn;
use noms_values::{Commit, DatasetMap, ParentSet, RefValue, Value, ValueKind, ValueType};
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

/// The error type for datastore operations.
#[derive(Debug)]
pub enum Error {
    /// The underlying chunk store failed.
    ChunkStore(chunk_store::Error),
    /// A chunk's bytes did not decode into the value shape expected of it.
    Decode(noms_values::DecodeError),
    /// A value was read where a different type was expected (e.g. the root
    /// chunk wasn't a dataset map, or a dataset's head wasn't a commit).
    TypeMismatch {
        /// The type that was expected at this position.
        expected: ValueType,
        /// The type the value actually had.
        found: ValueType,
    },
    /// [`Value::Int`] was written without an explicit [`ValueKind`] hint.
    MissingKindHint,
    /// A commit was attempted whose parents do not descend from the
    /// dataset's current head, so it cannot be fast-forwarded.
    NotFastForward,
    /// The root pointer changed between reading it and attempting to
    /// advance it; the caller should retry the commit against a fresh
    /// [`DataStore`] (e.g. the one `commit` would have handed back anyway,
    /// obtained by calling [`DataStore::new`]-equivalent re-entry, or simply
    /// by re-reading `datasets()`).
    Conflict,
    /// A dataset name had no entry in the dataset map.
    UnknownDataset(String),
    /// A [`RefValue`] pointed at the empty sentinel hash, which never
    /// addresses an actual chunk.
    EmptyRef,
}

impl From<chunk_store::Error> for Error {
    fn from(e: chunk_store::Error) -> Self {
        Error::ChunkStore(e)
    }
}

impl From<noms_values::DecodeError> for Error {
    fn from(e: noms_values::DecodeError) -> Self {
        Error::Decode(e)
    }
}

/// A specialized `Result` type for datastore operations.
pub type Result<T> = std::result::Result<T, Error>;

type InFlight = Mutex<HashMap<Hash, Arc<OnceCell<(usize, Value)>>>>;

/// The version-control layer over a [`ChunkStore`]: named datasets, each
/// pointing at a head commit, with fast-forward-checked commits.
///
/// Cloning a `DataStore` (via [`DataStore::commit`]'s return value, not via
/// [`Clone`] — there is no blanket `Clone` impl, since sharing the *same*
/// dataset-map cache cell across two live handles would be wrong) shares the
/// underlying chunk store and value cache, but never shares the
/// dataset-map resolution cell: each handle's view of "the current dataset
/// map" is fixed at the root hash it was constructed with.
pub struct DataStore<C: ChunkStore> {
    chunk_store: Arc<C>,
    value_cache: Arc<dyn ValueCache>,
    dataset_map: Arc<OnceCell<DatasetMap>>,
    in_flight: Arc<InFlight>,
}

impl<C: ChunkStore> DataStore<C> {
    /// Creates a datastore over `chunk_store`, bounding its value cache to
    /// `max_cache_size` bytes of decoded-chunk data.
    ///
    /// `chunk_store` is taken as an `Arc` (rather than by value and wrapped
    /// internally) so that two independently constructed `DataStore`
    /// handles can share the very same backend — the situation that arises
    /// whenever more than one writer is coordinating over one dataset map,
    /// e.g. in tests that race two handles' `commit` calls against each
    /// other. A `max_cache_size` of zero selects the no-op cache variant
    /// (see [`cache::NoopCache`]): decodes are still de-duplicated in
    /// flight (§5), but nothing decoded is retained afterwards.
    pub fn new(chunk_store: Arc<C>, max_cache_size: usize) -> Self {
        let value_cache: Arc<dyn ValueCache> = if max_cache_size > 0 {
            Arc::new(cache::BoundedCache::new(max_cache_size))
        } else {
            Arc::new(cache::NoopCache)
        };
        Self {
            chunk_store,
            value_cache,
            dataset_map: Arc::new(OnceCell::new()),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn with_fresh_dataset_map(&self) -> Self {
        Self {
            chunk_store: Arc::clone(&self.chunk_store),
            value_cache: Arc::clone(&self.value_cache),
            dataset_map: Arc::new(OnceCell::new()),
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    /// Returns the current dataset map: the set of named datasets and the
    /// ref each currently points at.
    ///
    /// Resolved once per `DataStore` handle and cached for the lifetime of
    /// the handle — a commit never mutates an existing handle's view, it
    /// only ever returns a new handle (see [`DataStore::commit`]).
    pub async fn datasets(&self) -> Result<DatasetMap> {
        let map = self
            .dataset_map
            .get_or_try_init(|| async {
                let root = self.chunk_store.get_root().await?;
                let root_value = self.fetch_and_decode(root).await?;
                dataset_map::resolve(root_value)
            })
            .await?;
        Ok(map.clone())
    }

    /// Returns the current head of `dataset`, or `None` if it has never
    /// been committed to.
    pub async fn head(&self, dataset: &str) -> Result<Option<RefValue>> {
        Ok(self.datasets().await?.get(dataset).cloned())
    }

    /// Reads back the value a ref points at.
    ///
    /// Embedded refs inside the returned value (e.g. a commit's `parents`)
    /// are not resolved further — each one is its own [`RefValue`] that a
    /// caller resolves with its own `read_value` call, only as deep as it
    /// actually needs to go.
    pub async fn read_value(&self, r: &RefValue) -> Result<Value> {
        self.fetch_and_decode(r.target_hash)
            .await?
            .ok_or(Error::EmptyRef)
    }

    /// Returns the current head of `dataset`, failing if it has none.
    pub async fn require_head(&self, dataset: &str) -> Result<RefValue> {
        self.head(dataset)
            .await?
            .ok_or_else(|| Error::UnknownDataset(dataset.to_string()))
    }

    /// Writes `value` as a new chunk and returns a ref to it.
    ///
    /// `kind` disambiguates primitives that aren't self-describing (see
    /// [`noms_values::auto_kind`]); it is required for [`Value::Int`] and
    /// ignored (but accepted) for every other variant.
    pub async fn write_value(&self, value: Value, kind: Option<ValueKind>) -> Result<RefValue> {
        if noms_values::requires_explicit_kind(&value) && kind.is_none() {
            return Err(Error::MissingKindHint);
        }
        let chunk = noms_values::encode(&value);
        let target_type = noms_values::type_of(&value);
        // The chunk is believed to exist already if it's cached: skip the
        // redundant put rather than re-issuing it to the chunk store.
        if self.value_cache.get(chunk.hash).is_none() {
            self.chunk_store.put(chunk.clone()).await?;
        }
        self.value_cache.put(chunk.hash, value, chunk.data.len());
        Ok(RefValue {
            target_hash: chunk.hash,
            target_type,
        })
    }

    /// Builds a [`Commit`] from `value` and `parents` without writing
    /// anything.
    ///
    /// A thin convenience constructor: the interesting work happens in
    /// [`DataStore::commit`], which is what actually validates and persists
    /// it.
    pub fn new_commit(value: Value, parents: ParentSet) -> Commit {
        Commit { value, parents }
    }

    /// Commits `commit` as the new head of `dataset`, if it fast-forwards
    /// the dataset's current head.
    ///
    /// On success, returns a *new* `DataStore` handle (sharing the same
    /// chunk store and value cache, but with its own freshly resolved
    /// dataset map) together with a ref to the newly written commit. The
    /// handle this method was called on is left untouched, still reflecting
    /// the state it had before the commit.
    ///
    /// Fails with [`Error::NotFastForward`] if `dataset` already has a head
    /// that isn't one of `commit`'s ancestors, and with [`Error::Conflict`]
    /// if another writer advanced the root between this call reading it and
    /// attempting to swap it — in both cases nothing is left half-written:
    /// the commit and updated dataset map chunks are content-addressed and
    /// harmless to leave orphaned if the root swap never lands.
    pub async fn commit(&self, dataset: &str, commit: Commit) -> Result<(Self, RefValue)> {
        let root_old = self.chunk_store.get_root().await?;
        let root_value = self.fetch_and_decode(root_old).await?;
        let map_old = dataset_map::resolve(root_value)?;
        let head_old = map_old.get(dataset).cloned();

        let parents = commit.parents.clone();
        let commit_value = Value::Commit(commit);
        let new_head = self.write_value(commit_value, None).await?;

        if let Some(head_old) = &head_old {
            if new_head == *head_old {
                // Already installed under this exact hash: nothing to do,
                // not even a CAS.
                return Ok((self.with_fresh_dataset_map(), new_head));
            }
            let mut visited = HashSet::new();
            visited.insert(head_old.target_hash);
            let fast_forwards =
                ancestry::is_ancestor_of_frontier(self, head_old.target_hash, parents, visited)
                    .await?;
            if !fast_forwards {
                return Err(Error::NotFastForward);
            }
        }

        let mut map_new = map_old;
        map_new.insert(dataset.to_string(), new_head.clone());
        let map_chunk = noms_values::encode(&Value::Map(map_new.clone()));
        self.chunk_store.put(map_chunk.clone()).await?;
        self.value_cache
            .put(map_chunk.hash, Value::Map(map_new), map_chunk.data.len());

        let swapped = self
            .chunk_store
            .update_root(map_chunk.hash, root_old)
            .await?;
        if !swapped {
            warn!("root advanced concurrently for dataset {dataset:?}, commit must be retried");
            return Err(Error::Conflict);
        }

        Ok((self.with_fresh_dataset_map(), new_head))
    }

    async fn fetch_and_decode(&self, hash: Hash) -> Result<Option<Value>> {
        if hash.is_empty() {
            return Ok(None);
        }
        if let Some(cached) = self.value_cache.get(hash) {
            return Ok(Some(cached.value));
        }

        let cell = {
            let mut table = self.in_flight.lock().await;
            Arc::clone(table.entry(hash).or_insert_with(|| Arc::new(OnceCell::new())))
        };

        let chunk_store = Arc::clone(&self.chunk_store);
        let result = cell
            .get_or_try_init(|| async move {
                let chunk = chunk_store.get(hash).await?;
                let value = noms_values::decode(&chunk)?;
                Ok::<(usize, Value), Error>((chunk.data.len(), value))
            })
            .await;

        self.in_flight.lock().await.remove(&hash);

        let (size, value) = result?;
        self.value_cache.put(hash, value.clone(), *size);
        Ok(Some(value.clone()))
    }

    async fn commit_of(&self, hash: Hash) -> Result<Commit> {
        match self.fetch_and_decode(hash).await? {
            Some(Value::Commit(commit)) => Ok(commit),
            Some(other) => Err(Error::TypeMismatch {
                expected: ValueType::Commit,
                found: noms_values::type_of(&other),
            }),
            None => Err(Error::EmptyRef),
        }
    }
}

#[async_trait]
impl<C: ChunkStore> CommitSource for DataStore<C> {
    async fn parents_of(&self, hash: Hash) -> Result<ParentSet> {
        Ok(self.commit_of(hash).await?.parents)
    }
}
