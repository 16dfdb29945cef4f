use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use kbsearch_core::config::{SearchSettings, Settings};
use kbsearch_core::handle::ServiceHandle;
use kbsearch_core::traits::{Embedder, RelevanceModel, VectorStore};
use kbsearch_core::types::{Candidate, Query, RankedResult};
use kbsearch_core::{Error, Result};
use kbsearch_embed::{load_cross_encoder, load_embedder, EmbeddingCache};
use kbsearch_vector::QdrantStore;

use crate::format::SearchOutcome;
use crate::rerank::{Reranker, Strategy};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchOptions {
    pub limit_first: usize,
    pub limit_final: usize,
    pub alpha: f32,
    pub use_cross_encoder: bool,
}

impl Default for SearchOptions {
    fn default() -> Self { Self::from_settings(&SearchSettings::default()) }
}

impl SearchOptions {
    pub fn from_settings(settings: &SearchSettings) -> Self {
        Self {
            limit_first: settings.limit_first,
            limit_final: settings.limit_final,
            alpha: settings.rerank_alpha,
            use_cross_encoder: settings.use_cross_encoder,
        }
    }

    pub fn strategy(&self) -> Strategy {
        if self.use_cross_encoder {
            Strategy::CrossEncoder { fallback_alpha: self.alpha }
        } else {
            Strategy::LexicalBlend { alpha: self.alpha }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.limit_first == 0 || self.limit_final == 0 {
            return Err(Error::InvalidConfig("limit_first and limit_final must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(Error::InvalidConfig(format!("alpha must be within [0, 1], got {}", self.alpha)));
        }
        Ok(())
    }
}

/// Query embedding (cached) → similarity search → rerank.
///
/// Embedding and store failures are returned as errors; an empty query, an
/// empty candidate set and an unavailable relevance model are not.
pub struct RetrievalEngine {
    embeddings: EmbeddingCache,
    store: ServiceHandle<dyn VectorStore>,
    reranker: Reranker,
    defaults: SearchOptions,
}

impl RetrievalEngine {
    pub fn new(
        embeddings: EmbeddingCache,
        store: ServiceHandle<dyn VectorStore>,
        reranker: Reranker,
        defaults: SearchOptions,
    ) -> Self {
        Self { embeddings, store, reranker, defaults }
    }

    /// Wires the configured models and Qdrant collection. Nothing is loaded or
    /// contacted until the first search; relative model paths resolve against `base_dir`.
    pub fn from_settings(settings: &Settings, base_dir: &Path) -> Self {
        let embedding = settings.embedding.clone();
        let embed_base = base_dir.to_path_buf();
        let embedder: ServiceHandle<dyn Embedder> =
            ServiceHandle::lazy("embedding model", move || load_embedder(&embedding, &embed_base));

        let store_settings = settings.vector_store.clone();
        let store: ServiceHandle<dyn VectorStore> = ServiceHandle::lazy("vector store", move || {
            Ok(Arc::new(QdrantStore::new(&store_settings)?) as Arc<dyn VectorStore>)
        });

        let cross_encoder_dir = settings.search.cross_encoder_dir.clone();
        let ce_base = base_dir.to_path_buf();
        let reranker = Reranker::with_relevance_loader(move || -> Result<Arc<dyn RelevanceModel>> {
            load_cross_encoder(&cross_encoder_dir, &ce_base)
        });

        Self::new(
            EmbeddingCache::new(embedder, settings.search.cache_max_size),
            store,
            reranker,
            SearchOptions::from_settings(&settings.search),
        )
    }

    pub fn defaults(&self) -> &SearchOptions { &self.defaults }

    pub fn embeddings(&self) -> &EmbeddingCache { &self.embeddings }

    pub async fn search(&self, raw_query: &str) -> Result<SearchOutcome> {
        self.search_with(raw_query, &self.defaults).await
    }

    pub async fn search_with(&self, raw_query: &str, options: &SearchOptions) -> Result<SearchOutcome> {
        options.validate()?;
        let Some(query) = Query::parse(raw_query) else {
            return Ok(SearchOutcome::EmptyQuery);
        };
        let start = Instant::now();
        let candidates = self.candidates(&query, options.limit_first).await?;
        if candidates.is_empty() {
            tracing::info!(query = %query, "no candidates");
            return Ok(SearchOutcome::NothingFound { query: query.to_string() });
        }
        let pool = candidates.len();
        let results = self
            .reranker
            .rerank(query.as_str(), candidates, options.strategy(), Some(options.limit_final))?;
        tracing::info!(
            query = %query,
            candidates = pool,
            results = results.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "search completed"
        );
        Ok(SearchOutcome::Results { query: query.to_string(), results })
    }

    /// The rendered response text, as consumed by the chat backend and tool interface.
    pub async fn search_text(&self, raw_query: &str) -> Result<String> {
        Ok(self.search(raw_query).await?.to_string())
    }

    /// The raw candidate pool for `query`, before reranking.
    pub async fn candidates(&self, query: &Query, limit_first: usize) -> Result<Vec<Candidate>> {
        let vector = self.embeddings.embed_cached(query.as_str())?;
        let store = self.store.get()?;
        store.query(&vector, limit_first).await
    }

    /// Every candidate of the pool, reranked with `options` but not truncated.
    pub async fn rank_all(&self, query: &Query, options: &SearchOptions) -> Result<Vec<RankedResult>> {
        options.validate()?;
        let candidates = self.candidates(query, options.limit_first).await?;
        self.reranker.rerank(query.as_str(), candidates, options.strategy(), None)
    }
}
