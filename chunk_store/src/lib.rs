//! # Content-addressed chunk storage with an atomically updatable root.
//!
//! This crate provides the lowest layer of a content-addressed storage
//! system: an append-only (in the sense that existing entries are never
//! overwritten) map from [`Hash`] to [`Chunk`], plus a single atomically
//! updatable *root* hash that higher layers use to publish new state via
//! compare-and-swap.
//!
//! A chunk is identified by the SHA-256 digest of its own bytes, so writes
//! are naturally idempotent: writing the same bytes twice produces the same
//! hash and the same stored chunk. The empty chunk is special-cased: its
//! hash is a fixed all-zero sentinel rather than the real digest of zero
//! bytes, so "no value" can be recognized without hashing anything.
//!
//! ## Example
//!
//! ```
//! use chunk_store::{Chunk, ChunkStore, MemoryChunkStore};
//!
//! # #[tokio::main]
//! # async fn main() -> chunk_store::Result<()> {
//! let store = MemoryChunkStore::new();
//! let chunk = Chunk::new(b"hello".to_vec());
//! store.put(chunk.clone()).await?;
//! assert_eq!(store.get(chunk.hash).await?, chunk);
//!
//! let root = store.get_root().await?;
//! assert!(root.is_empty());
//! assert!(store.update_root(chunk.hash, root).await?);
//! assert_eq!(store.get_root().await?, chunk.hash);
//! # Ok(())
//! # }
//! ```
#![deny(missing_docs)]

mod memory;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::{self, Debug, Display, Formatter};

pub use memory::MemoryChunkStore;

/// The number of bytes in a [`Hash`].
pub const HASH_LEN: usize = 32;

/// The sentinel hash of the empty chunk, meaning "no value".
///
/// This is distinct from `Hash::of_bytes(&[])`: the empty chunk is never
/// actually hashed, so a lookup for "is this hash the empty chunk" never has
/// to touch the hasher.
pub const EMPTY_HASH: Hash = Hash([0u8; HASH_LEN]);

/// A fixed-width content hash identifying a [`Chunk`].
///
/// Totally ordered and cheaply `Copy`, so it can be used directly as a map
/// key or inside a `BTreeSet`/`im::OrdSet` frontier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Hash([u8; HASH_LEN]);

impl Hash {
    /// Computes the content hash of `data`.
    ///
    /// Returns [`EMPTY_HASH`] for zero-length input rather than the actual
    /// SHA-256 digest of the empty string.
    pub fn of_bytes(data: &[u8]) -> Self {
        if data.is_empty() {
            return EMPTY_HASH;
        }
        let mut hasher = Sha256::new();
        hasher.update(data);
        let digest = hasher.finalize();
        let mut bytes = [0u8; HASH_LEN];
        bytes.copy_from_slice(&digest);
        Hash(bytes)
    }

    /// Returns `true` if this is the sentinel hash of the empty chunk.
    pub fn is_empty(&self) -> bool {
        *self == EMPTY_HASH
    }

    /// Returns the raw bytes of the hash.
    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }
}

impl Debug for Hash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self)
    }
}

impl Display for Hash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// An immutable byte buffer paired with its content hash.
///
/// A chunk is *empty* iff its buffer is zero-length, in which case its hash
/// is always [`EMPTY_HASH`].
#[derive(Clone, PartialEq, Eq)]
pub struct Chunk {
    /// The content hash of `data`, or [`EMPTY_HASH`] if `data` is empty.
    pub hash: Hash,
    /// The raw bytes of the chunk.
    pub data: Vec<u8>,
}

impl Chunk {
    /// Creates a chunk from raw bytes, computing its hash.
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        let data = data.into();
        let hash = Hash::of_bytes(&data);
        Self { hash, data }
    }

    /// Returns the canonical empty chunk ("no value").
    pub fn empty() -> Self {
        Self {
            hash: EMPTY_HASH,
            data: Vec::new(),
        }
    }

    /// Returns `true` if this chunk carries no bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Debug for Chunk {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunk")
            .field("hash", &self.hash)
            .field("len", &self.data.len())
            .finish()
    }
}

/// The error type for chunk store operations.
#[derive(Debug)]
pub enum Error {
    /// The backend could not complete the operation (e.g. an IO failure on a
    /// durable implementation). Carries a human-readable description rather
    /// than a specific backend error type, since `ChunkStore` is implemented
    /// by backends this crate knows nothing about.
    Backend(String),
}

/// A specialized `Result` type for chunk store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A content-addressed chunk store with a single atomically updatable root.
///
/// Implementations must provide their own internal synchronization: `get`,
/// `put`, `get_root` and `update_root` may all be called concurrently, from
/// multiple [`crate`] consumers sharing the same store behind an `Arc`.
#[async_trait::async_trait]
pub trait ChunkStore: Send + Sync {
    /// Returns the chunk with hash `h`, or the empty chunk if no such chunk
    /// has been written.
    async fn get(&self, h: Hash) -> Result<Chunk>;

    /// Writes `chunk`, keyed by its own hash. Idempotent: writing the same
    /// chunk twice is a no-op the second time. Writing an empty chunk is a
    /// no-op (there is nothing to store under the sentinel hash).
    async fn put(&self, chunk: Chunk) -> Result<()>;

    /// Returns the current root pointer, or [`EMPTY_HASH`] if unset.
    async fn get_root(&self) -> Result<Hash>;

    /// Atomically updates the root pointer to `new`, but only if it is
    /// currently `expected`. Returns whether the swap happened.
    async fn update_root(&self, new: Hash, expected: Hash) -> Result<bool>;
}
