//! Chunk cache: an evictable LRU of clean chunks plus a dirty map that is
//! never evicted, only cleared by an explicit `flush()`. Splitting the two
//! is what keeps writes from being silently dropped under cache pressure.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use nohash_hasher::IntMap;

/// Packs a `(time_chunk, mesh_chunk)` pair into the single `u64` key the
/// caches are keyed by. Mesh-chunk counts never approach 2^32 in practice,
/// but the split keeps the two halves unambiguous regardless.
#[inline]
pub fn chunk_key(tc: u64, mc: u32) -> u64 {
    (tc << 32) | mc as u64
}

/// Read-only cache of chunk bytes straight off disk (or mmap). Eviction is
/// safe here: a miss just means re-reading the file.
pub struct ReadCache {
    lru: LruCache<u64, Arc<[u8]>>,
}

impl ReadCache {
    /// `budget_bytes` is the approximate memory budget; `chunk_bytes` is the
    /// fixed size of one chunk, used to derive a slot count.
    pub fn new(budget_bytes: u64, chunk_bytes: u64) -> Self {
        let slots = (budget_bytes / chunk_bytes.max(1)).max(1) as usize;
        Self {
            lru: LruCache::new(NonZeroUsize::new(slots).unwrap()),
        }
    }

    pub fn get(&mut self, key: u64) -> Option<Arc<[u8]>> {
        self.lru.get(&key).cloned()
    }

    pub fn put(&mut self, key: u64, bytes: Arc<[u8]>) {
        self.lru.put(key, bytes);
    }

    pub fn invalidate(&mut self, key: u64) {
        self.lru.pop(&key);
    }
}

/// Chunks mutated since the last `flush()`. Never evicted: the engine is the
/// only thing that removes entries, and only after they've been written back.
#[derive(Default)]
pub struct DirtyMap {
    chunks: IntMap<u64, Vec<u8>>,
}

impl DirtyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: u64) -> Option<&Vec<u8>> {
        self.chunks.get(&key)
    }

    pub fn get_mut_or_insert_with(&mut self, key: u64, default: impl FnOnce() -> Vec<u8>) -> &mut Vec<u8> {
        self.chunks.entry(key).or_insert_with(default)
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn drain(&mut self) -> IntMap<u64, Vec<u8>> {
        std::mem::take(&mut self.chunks)
    }
}
