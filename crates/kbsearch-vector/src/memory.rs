use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use kbsearch_core::traits::VectorStore;
use kbsearch_core::types::{Candidate, ChunkPayload, Point, PointId, ScrollPage, ScrollRequest, StoredPoint};
use kbsearch_core::{Error, Result};

struct Collection {
    dim: usize,
    points: BTreeMap<PointId, Point>,
}

/// In-process vector store with exact cosine search, following the Qdrant
/// semantics the pipeline relies on (inclusive scroll offsets, named collection).
#[derive(Default)]
pub struct MemoryStore {
    collection: RwLock<Option<Collection>>,
    queries: AtomicUsize,
    unavailable: AtomicBool,
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 { 0.0 } else { dot / (na * nb) }
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    /// A store whose collection already exists with the given dimension.
    pub fn with_collection(dim: usize) -> Self {
        let store = Self::default();
        if let Ok(mut guard) = store.collection.write() {
            *guard = Some(Collection { dim, points: BTreeMap::new() });
        }
        store
    }

    /// Number of `query` calls served so far.
    pub fn query_count(&self) -> usize { self.queries.load(Ordering::SeqCst) }

    /// Makes every subsequent call fail as if the server were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) { self.unavailable.store(unavailable, Ordering::SeqCst); }

    pub fn len(&self) -> usize {
        self.read().ok().and_then(|g| g.as_ref().map(|c| c.points.len())).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::VectorStore("vector store is unavailable".into()));
        }
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Option<Collection>>> {
        self.check_available()?;
        self.collection.read().map_err(|_| Error::VectorStore("collection lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Option<Collection>>> {
        self.check_available()?;
        self.collection.write().map_err(|_| Error::VectorStore("collection lock poisoned".into()))
    }
}

fn missing() -> Error { Error::VectorStore("collection does not exist".into()) }

#[async_trait]
impl VectorStore for MemoryStore {
    async fn query(&self, vector: &[f32], limit: usize) -> Result<Vec<Candidate>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let guard = self.read()?;
        let collection = guard.as_ref().ok_or_else(missing)?;
        let mut hits: Vec<Candidate> = collection
            .points
            .values()
            .map(|p| Candidate {
                id: p.id.clone(),
                vector_score: cosine(vector, &p.vector),
                payload: ChunkPayload::from_raw(&p.payload),
            })
            .collect();
        hits.sort_by(|a, b| b.vector_score.total_cmp(&a.vector_score).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn upsert(&self, points: &[Point]) -> Result<()> {
        let mut guard = self.write()?;
        let collection = guard.as_mut().ok_or_else(missing)?;
        if let Some(bad) = points.iter().find(|p| p.vector.len() != collection.dim) {
            return Err(Error::VectorStore(format!(
                "point {} has {} dimensions, collection expects {}",
                bad.id,
                bad.vector.len(),
                collection.dim
            )));
        }
        for point in points {
            collection.points.insert(point.id.clone(), point.clone());
        }
        Ok(())
    }

    async fn scroll(&self, request: &ScrollRequest) -> Result<ScrollPage> {
        let guard = self.read()?;
        let collection = guard.as_ref().ok_or_else(missing)?;
        let mut remaining = collection
            .points
            .values()
            .filter(|p| request.offset.as_ref().map_or(true, |offset| &p.id >= offset));
        let points: Vec<StoredPoint> = remaining
            .by_ref()
            .take(request.limit)
            .map(|p| StoredPoint {
                id: p.id.clone(),
                vector: request.with_vectors.then(|| p.vector.clone()),
                payload: p.payload.clone(),
            })
            .collect();
        let next_offset = remaining.next().map(|p| p.id.clone());
        Ok(ScrollPage { points, next_offset })
    }

    async fn create_collection(&self, dim: usize) -> Result<()> {
        let mut guard = self.write()?;
        if guard.is_some() {
            return Err(Error::VectorStore("collection already exists".into()));
        }
        *guard = Some(Collection { dim, points: BTreeMap::new() });
        Ok(())
    }

    async fn delete_collection(&self) -> Result<()> {
        *self.write()? = None;
        Ok(())
    }

    async fn collection_exists(&self) -> Result<bool> {
        Ok(self.read()?.is_some())
    }
}
