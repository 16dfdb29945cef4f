use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use kbsearch_core::handle::ServiceHandle;
use kbsearch_core::traits::{Embedder, RelevanceModel, VectorStore};
use kbsearch_core::types::{Candidate, ChunkPayload, Point, PointId, ScrollPage, ScrollRequest};
use kbsearch_core::{Error, Result};
use kbsearch_embed::{EmbeddingCache, FakeEmbedder};
use kbsearch_retrieval::{Reranker, RetrievalEngine, SearchOptions, SearchOutcome};

/// Returns a fixed candidate list regardless of the query vector.
struct FixedStore {
    candidates: Vec<Candidate>,
    queries: AtomicUsize,
    fail: bool,
}

impl FixedStore {
    fn new(candidates: Vec<Candidate>) -> Arc<Self> {
        Arc::new(Self { candidates, queries: AtomicUsize::new(0), fail: false })
    }
}

#[async_trait]
impl VectorStore for FixedStore {
    async fn query(&self, _vector: &[f32], limit: usize) -> Result<Vec<Candidate>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::VectorStore("connection refused".into()));
        }
        Ok(self.candidates.iter().take(limit).cloned().collect())
    }
    async fn upsert(&self, _points: &[Point]) -> Result<()> { Ok(()) }
    async fn scroll(&self, _request: &ScrollRequest) -> Result<ScrollPage> { Ok(ScrollPage::default()) }
    async fn create_collection(&self, _dim: usize) -> Result<()> { Ok(()) }
    async fn delete_collection(&self) -> Result<()> { Ok(()) }
    async fn collection_exists(&self) -> Result<bool> { Ok(true) }
}

fn cand(id: u64, score: f32, section: &str, content: &str) -> Candidate {
    Candidate {
        id: PointId::Num(id),
        vector_score: score,
        payload: ChunkPayload {
            section: section.into(),
            source: format!("https://docs.example.org/{section}"),
            content: content.into(),
            heading: String::new(),
        },
    }
}

fn corpus() -> Vec<Candidate> {
    vec![
        cand(1, 0.9, "player", "kinescope player setup"),
        cand(2, 0.5, "api", "api key rotation"),
        cand(3, 0.4, "upload", "upload limits"),
        cand(4, 0.3, "billing", "invoices and plans"),
        cand(5, 0.2, "faq", "frequently asked questions"),
        cand(6, 0.1, "misc", "other things"),
    ]
}

struct Harness {
    engine: RetrievalEngine,
    store: Arc<FixedStore>,
    embedder_loads: Arc<AtomicUsize>,
}

fn harness(store: Arc<FixedStore>, reranker: Reranker, options: SearchOptions) -> Harness {
    let loads = Arc::new(AtomicUsize::new(0));
    let counter = loads.clone();
    let embedder: ServiceHandle<dyn Embedder> = ServiceHandle::lazy("embedder", move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeEmbedder::new(32)) as Arc<dyn Embedder>)
    });
    let store_handle: ServiceHandle<dyn VectorStore> = ServiceHandle::ready("store", store.clone());
    let engine = RetrievalEngine::new(EmbeddingCache::new(embedder, 16), store_handle, reranker, options);
    Harness { engine, store, embedder_loads: loads }
}

fn options(limit_final: usize, alpha: f32) -> SearchOptions {
    SearchOptions { limit_first: 20, limit_final, alpha, use_cross_encoder: false }
}

#[tokio::test]
async fn empty_query_touches_nothing() {
    let h = harness(FixedStore::new(corpus()), Reranker::lexical_only(), SearchOptions::default());
    for raw in ["", "   ", "\n\t"] {
        let outcome = h.engine.search(raw).await.unwrap();
        assert_eq!(outcome, SearchOutcome::EmptyQuery);
        assert_eq!(outcome.to_string(), "Укажите query для поиска.");
    }
    assert_eq!(h.store.queries.load(Ordering::SeqCst), 0);
    assert_eq!(h.embedder_loads.load(Ordering::SeqCst), 0);
    assert!(h.engine.embeddings().is_empty());
}

#[tokio::test]
async fn no_candidates_is_nothing_found() {
    let h = harness(FixedStore::new(vec![]), Reranker::lexical_only(), SearchOptions::default());
    let text = h.engine.search_text("  как загрузить видео ").await.unwrap();
    assert_eq!(text, "По запросу «как загрузить видео» ничего не найдено.");
}

#[tokio::test]
async fn results_are_capped_at_limit_final() {
    let h = harness(FixedStore::new(corpus()), Reranker::lexical_only(), options(3, 0.6));
    let outcome = h.engine.search("api key rotation").await.unwrap();
    assert_eq!(outcome.results().len(), 3);
    let text = outcome.to_string();
    assert!(text.starts_with("Результаты по запросу «api key rotation»:\n\n1. (score: 0.500) api"));
    assert!(!text.ends_with('\n'));
}

#[tokio::test]
async fn formatted_blocks_follow_the_text_contract() {
    let store = FixedStore::new(vec![cand(1, 0.9, "player", "kinescope player setup"), cand(2, 0.5, "api", "  api key rotation  ")]);
    let h = harness(store, Reranker::lexical_only(), options(5, 0.5));
    let text = h.engine.search_text("api key rotation").await.unwrap();
    let expected = concat!(
        "Результаты по запросу «api key rotation»:\n",
        "\n",
        "1. (score: 0.500) api\n",
        "   Источник: https://docs.example.org/api\n",
        "   Текст: api key rotation\n",
        "\n",
        "2. (score: 0.900) player\n",
        "   Источник: https://docs.example.org/player\n",
        "   Текст: kinescope player setup",
    );
    assert_eq!(text, expected);
}

#[tokio::test]
async fn empty_content_omits_the_text_line() {
    let store = FixedStore::new(vec![cand(1, 0.7, "faq", "")]);
    let h = harness(store, Reranker::lexical_only(), options(5, 0.6));
    let text = h.engine.search_text("faq").await.unwrap();
    assert!(!text.contains("Текст:"));
    assert!(text.ends_with("Источник: https://docs.example.org/faq"));
}

#[tokio::test]
async fn repeated_queries_embed_once() {
    let h = harness(FixedStore::new(corpus()), Reranker::lexical_only(), SearchOptions::default());
    h.engine.search("upload limits").await.unwrap();
    h.engine.search("  upload limits").await.unwrap();
    let stats = h.engine.embeddings().stats();
    assert_eq!(stats.misses, 1, "trimmed queries share a cache key");
    assert_eq!(stats.hits, 1);
    assert_eq!(h.embedder_loads.load(Ordering::SeqCst), 1);
    assert_eq!(h.store.queries.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn store_failure_propagates() {
    let store = Arc::new(FixedStore { candidates: corpus(), queries: AtomicUsize::new(0), fail: true });
    let h = harness(store, Reranker::lexical_only(), SearchOptions::default());
    let err = h.engine.search("api").await.unwrap_err();
    assert!(matches!(err, Error::VectorStore(_)), "{err}");
}

#[tokio::test]
async fn embedder_load_failure_propagates() {
    let embedder: ServiceHandle<dyn Embedder> =
        ServiceHandle::lazy("embedder", || Err(Error::ModelLoad("no model.safetensors".into())));
    let store = FixedStore::new(corpus());
    let engine = RetrievalEngine::new(
        EmbeddingCache::new(embedder, 4),
        ServiceHandle::ready("store", store.clone() as Arc<dyn VectorStore>),
        Reranker::lexical_only(),
        SearchOptions::default(),
    );
    assert!(matches!(engine.search("api").await, Err(Error::ModelLoad(_))));
    assert_eq!(store.queries.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cross_encoder_unavailable_matches_lexical_results() {
    let failing = Reranker::with_relevance_loader(|| -> Result<Arc<dyn RelevanceModel>> {
        Err(Error::ModelLoad("cross-encoder weights missing".into()))
    });
    let ce = harness(FixedStore::new(corpus()), failing, SearchOptions { use_cross_encoder: true, ..options(3, 0.6) });
    let lexical = harness(FixedStore::new(corpus()), Reranker::lexical_only(), options(3, 0.6));
    let a = ce.engine.search_text("api key rotation").await.unwrap();
    let b = lexical.engine.search_text("api key rotation").await.unwrap();
    assert_eq!(a, b);
}

#[tokio::test]
async fn invalid_options_are_rejected() {
    let h = harness(FixedStore::new(corpus()), Reranker::lexical_only(), SearchOptions::default());
    let bad = SearchOptions { alpha: 1.5, ..SearchOptions::default() };
    assert!(matches!(h.engine.search_with("api", &bad).await, Err(Error::InvalidConfig(_))));
    let zero = SearchOptions { limit_final: 0, ..SearchOptions::default() };
    assert!(h.engine.search_with("api", &zero).await.is_err());
}
