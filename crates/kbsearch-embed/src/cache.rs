//! Query embedding cache: exact-string keys, bounded size, least-recently-used eviction.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use linked_hash_map::LinkedHashMap;

use kbsearch_core::handle::ServiceHandle;
use kbsearch_core::traits::Embedder;
use kbsearch_core::types::Embedding;
use kbsearch_core::{Error, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Memoizes query embeddings in front of a lazily loaded embedding model.
///
/// Keys are the exact query strings (case and whitespace sensitive). The cache
/// lock is not held while the model runs, so two concurrent misses on the same
/// key may both embed it; the second insert just refreshes the entry.
pub struct EmbeddingCache {
    embedder: ServiceHandle<dyn Embedder>,
    entries: Mutex<LinkedHashMap<String, Embedding>>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl EmbeddingCache {
    pub fn new(embedder: ServiceHandle<dyn Embedder>, capacity: usize) -> Self {
        Self {
            embedder,
            entries: Mutex::new(LinkedHashMap::new()),
            capacity: capacity.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn embed_cached(&self, query: &str) -> Result<Embedding> {
        if let Some(vector) = self.lock()?.get_refresh(query) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(query, "embedding cache hit");
            return Ok(vector.clone());
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(query, "embedding cache miss");

        let embedder = self.embedder.get()?;
        let vector = embedder
            .embed_batch(&[query.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("embedding model returned no vector".into()))?;

        let mut entries = self.lock()?;
        if !entries.contains_key(query) {
            while entries.len() >= self.capacity {
                if let Some((evicted, _)) = entries.pop_front() {
                    tracing::debug!(query = %evicted, "evicted least recently used embedding");
                }
            }
        }
        entries.insert(query.to_string(), vector.clone());
        Ok(vector)
    }

    /// Whether `query` is cached. Does not change recency.
    pub fn contains(&self, query: &str) -> bool {
        self.lock().map(|e| e.contains_key(query)).unwrap_or(false)
    }

    pub fn len(&self) -> usize { self.lock().map(|e| e.len()).unwrap_or(0) }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn capacity(&self) -> usize { self.capacity }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.lock() {
            entries.clear();
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats { hits: self.hits.load(Ordering::Relaxed), misses: self.misses.load(Ordering::Relaxed) }
    }

    fn lock(&self) -> Result<MutexGuard<'_, LinkedHashMap<String, Embedding>>> {
        self.entries.lock().map_err(|_| Error::Operation("embedding cache lock poisoned".into()))
    }
}
