//! Reranking, the retrieval engine and the relevance harness built on it.

pub mod engine;
pub mod format;
pub mod relevance;
pub mod rerank;

pub use engine::{RetrievalEngine, SearchOptions};
pub use format::SearchOutcome;
pub use relevance::{run_relevance, CaseOutcome, Fixture, Recommendation, RelevanceReport};
pub use rerank::{keyword_score, tokenize, RelevanceModelState, Reranker, Strategy};
