use async_trait::async_trait;

use crate::types::{Candidate, Embedding, Point, ScrollPage, ScrollRequest};
use crate::Result;

pub trait Embedder: Send + Sync {
    /// Stable identifier of the model (e.g. `sentence-transformers/all-MiniLM-L6-v2`).
    fn model_id(&self) -> &str;
    fn dim(&self) -> usize;
    /// One vector per input text, in input order. Deterministic for a given model.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>>;
}

/// A learned model scoring `(query, content)` pairs jointly; higher is more relevant.
pub trait RelevanceModel: Send + Sync {
    fn predict(&self, pairs: &[(String, String)]) -> Result<Vec<f32>>;
}

/// A named-vector collection in a vector index. The collection and vector field
/// are bound when the store handle is constructed.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Up to `limit` candidates ordered by descending similarity, with payloads.
    async fn query(&self, vector: &[f32], limit: usize) -> Result<Vec<Candidate>>;
    async fn upsert(&self, points: &[Point]) -> Result<()>;
    async fn scroll(&self, request: &ScrollRequest) -> Result<ScrollPage>;
    async fn create_collection(&self, dim: usize) -> Result<()>;
    async fn delete_collection(&self) -> Result<()>;
    async fn collection_exists(&self) -> Result<bool>;
}
