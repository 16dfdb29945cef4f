//! JSON bodies of the Qdrant REST API, limited to what the store uses.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use kbsearch_core::types::{Candidate, ChunkPayload, Embedding, PointId, RawPayload, StoredPoint};

#[derive(Serialize)]
pub(crate) struct VectorParams {
    pub size: usize,
    pub distance: &'static str,
}

#[derive(Serialize)]
pub(crate) struct CreateCollectionRequest {
    pub vectors: HashMap<String, VectorParams>,
}

impl CreateCollectionRequest {
    pub fn cosine(vector_name: &str, size: usize) -> Self {
        let mut vectors = HashMap::new();
        vectors.insert(vector_name.to_string(), VectorParams { size, distance: "Cosine" });
        Self { vectors }
    }
}

#[derive(Serialize)]
pub(crate) struct UpsertPoint<'a> {
    pub id: &'a PointId,
    pub vector: HashMap<&'a str, &'a [f32]>,
    pub payload: &'a RawPayload,
}

#[derive(Serialize)]
pub(crate) struct UpsertRequest<'a> {
    pub points: Vec<UpsertPoint<'a>>,
}

#[derive(Serialize)]
pub(crate) struct QueryRequest<'a> {
    pub query: &'a [f32],
    pub using: &'a str,
    pub limit: usize,
    pub with_payload: bool,
}

#[derive(Serialize)]
pub(crate) struct ScrollBody<'a> {
    pub limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<&'a PointId>,
    pub with_payload: bool,
    pub with_vector: bool,
}

/// Every Qdrant response wraps its data in `result`.
#[derive(Deserialize)]
pub(crate) struct Envelope<T> {
    pub result: T,
}

#[derive(Deserialize)]
pub(crate) struct ExistsResult {
    pub exists: bool,
}

#[derive(Deserialize)]
pub(crate) struct ScoredPoint {
    pub id: PointId,
    pub score: f32,
    #[serde(default)]
    pub payload: Option<RawPayload>,
}

impl ScoredPoint {
    pub fn into_candidate(self) -> Candidate {
        let payload = self.payload.as_ref().map(ChunkPayload::from_raw).unwrap_or_else(|| {
            tracing::debug!(id = %self.id, "hit without payload");
            ChunkPayload::default()
        });
        Candidate { id: self.id, vector_score: self.score, payload }
    }
}

#[derive(Deserialize)]
pub(crate) struct QueryResult {
    pub points: Vec<ScoredPoint>,
}

/// A stored vector is either a plain array (unnamed vector) or a map of named vectors.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum VectorField {
    Plain(Embedding),
    Named(HashMap<String, Embedding>),
}

#[derive(Deserialize)]
pub(crate) struct RecordPoint {
    pub id: PointId,
    #[serde(default)]
    pub payload: Option<RawPayload>,
    #[serde(default)]
    pub vector: Option<VectorField>,
}

impl RecordPoint {
    pub fn into_stored(self, vector_name: &str) -> StoredPoint {
        let vector = match self.vector {
            Some(VectorField::Plain(v)) => Some(v),
            Some(VectorField::Named(mut named)) => named.remove(vector_name),
            None => None,
        };
        StoredPoint { id: self.id, vector, payload: self.payload.unwrap_or_default() }
    }
}

#[derive(Deserialize)]
pub(crate) struct ScrollResult {
    pub points: Vec<RecordPoint>,
    #[serde(default)]
    pub next_page_offset: Option<PointId>,
}

/// Best-effort error text from a non-2xx body (`{"status":{"error":"..."}}`).
pub(crate) fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.pointer("/status/error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}
