//! An in-memory chunk store backed by a `HashMap`.

use crate::{Chunk, ChunkStore, Hash, Result, EMPTY_HASH};
use log::warn;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// An in-memory [`ChunkStore`], useful for tests and as a reference
/// implementation of the chunk store contract.
///
/// Chunks are kept in a `HashMap` guarded by a `tokio::sync::Mutex`; the root
/// pointer lives in its own mutex cell so that `update_root` can perform a
/// single atomic read-compare-write independent of chunk storage.
pub struct MemoryChunkStore {
    chunks: Mutex<HashMap<Hash, Chunk>>,
    root: Mutex<Hash>,
}

impl MemoryChunkStore {
    /// Creates an empty in-memory chunk store with an unset (empty) root.
    pub fn new() -> Self {
        Self {
            chunks: Mutex::new(HashMap::new()),
            root: Mutex::new(EMPTY_HASH),
        }
    }

    /// Returns the number of chunks currently stored (excluding the implicit
    /// empty chunk, which is never actually inserted).
    pub async fn len(&self) -> usize {
        self.chunks.lock().await.len()
    }
}

impl Default for MemoryChunkStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ChunkStore for MemoryChunkStore {
    async fn get(&self, h: Hash) -> Result<Chunk> {
        if h.is_empty() {
            return Ok(Chunk::empty());
        }
        Ok(self
            .chunks
            .lock()
            .await
            .get(&h)
            .cloned()
            .unwrap_or_else(Chunk::empty))
    }

    async fn put(&self, chunk: Chunk) -> Result<()> {
        if !chunk.is_empty() {
            self.chunks.lock().await.insert(chunk.hash, chunk);
        }
        Ok(())
    }

    async fn get_root(&self) -> Result<Hash> {
        Ok(*self.root.lock().await)
    }

    async fn update_root(&self, new: Hash, expected: Hash) -> Result<bool> {
        let mut root = self.root.lock().await;
        if *root == expected {
            *root = new;
            Ok(true)
        } else {
            warn!("update_root CAS failed: expected {expected}, current root is {root}");
            Ok(false)
        }
    }
}
