//! Domain types shared by the chunker, the vector store and the retrieval engine.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub type Embedding = Vec<f32>;
pub type RawPayload = Map<String, Value>;

/// A trimmed, non-empty search query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query(String);

impl Query {
    /// Trims surrounding whitespace; `None` when nothing is left.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() { None } else { Some(Self(trimmed.to_string())) }
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// A retrieval unit produced at index time.
///
/// - `heading`: nearest enclosing `##`/`###` title, empty before the first heading
/// - `text`: the chunk body, starting at its heading line when there is one
/// - `section`: hierarchical location of the source document (e.g. `player/embed`)
/// - `source`: public reference to the source document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub heading: String,
    pub text: String,
    pub section: String,
    pub source: String,
}

impl Chunk {
    pub fn payload(&self) -> ChunkPayload {
        ChunkPayload {
            section: self.section.clone(),
            source: self.source.clone(),
            content: self.text.clone(),
            heading: self.heading.clone(),
        }
    }
}

/// The payload stored next to every vector: exactly `section`, `source`, `content`, `heading`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPayload {
    #[serde(default)]
    pub section: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub heading: String,
}

impl ChunkPayload {
    /// Reads the four payload fields, defaulting anything missing or non-string to `""`.
    pub fn from_raw(raw: &RawPayload) -> Self {
        let field = |name: &str| match raw.get(name) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => {
                tracing::debug!(field = name, value = %other, "non-string payload field, using empty string");
                String::new()
            }
            None => {
                tracing::debug!(field = name, "payload field missing, using empty string");
                String::new()
            }
        };
        Self { section: field("section"), source: field("source"), content: field("content"), heading: field("heading") }
    }

    pub fn to_raw(&self) -> RawPayload {
        let mut map = Map::new();
        map.insert("section".into(), Value::String(self.section.clone()));
        map.insert("source".into(), Value::String(self.source.clone()));
        map.insert("content".into(), Value::String(self.content.clone()));
        map.insert("heading".into(), Value::String(self.heading.clone()));
        map
    }

    /// `section` and `source` joined, as used when matching an expected source label.
    pub fn label(&self) -> String { format!("{} {}", self.section, self.source) }
}

/// Vector store point id: either an unsigned integer or a UUID string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointId {
    Num(u64),
    Uuid(String),
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointId::Num(n) => write!(f, "{n}"),
            PointId::Uuid(s) => f.write_str(s),
        }
    }
}

/// A raw similarity-search hit, before reranking.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: PointId,
    pub vector_score: f32,
    pub payload: ChunkPayload,
}

/// A candidate after reranking. `rank` is 1-based.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedResult {
    pub candidate: Candidate,
    pub combined_score: f32,
    pub rank: usize,
}

/// A point written to the vector store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub id: PointId,
    pub vector: Embedding,
    pub payload: RawPayload,
}

/// A point read back from the vector store; `vector` is present only when requested.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPoint {
    pub id: PointId,
    pub vector: Option<Embedding>,
    pub payload: RawPayload,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScrollRequest {
    pub limit: usize,
    pub offset: Option<PointId>,
    pub with_vectors: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrollPage {
    pub points: Vec<StoredPoint>,
    pub next_offset: Option<PointId>,
}
