//! Text embedding and pairwise relevance models on candle, plus the query
//! embedding cache used by the retrieval engine.

pub mod bert;
pub mod cache;
pub mod cross_encoder;
pub mod device;
pub mod fake;
pub mod pool;
pub mod tokenize;

use std::path::Path;
use std::sync::Arc;

use kbsearch_core::config::{resolve_with_base, EmbeddingSettings};
use kbsearch_core::traits::{Embedder, RelevanceModel};
use kbsearch_core::Result;

pub use bert::BertEmbedder;
pub use cache::{CacheStats, EmbeddingCache};
pub use cross_encoder::CrossEncoder;
pub use fake::FakeEmbedder;
pub use pool::masked_mean_l2;

fn fake_requested(settings: &EmbeddingSettings) -> bool {
    settings.use_fake
        || std::env::var("APP_USE_FAKE_EMBEDDINGS")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false)
}

/// The configured embedding model. Relative `model_dir` values resolve against `base_dir`.
pub fn load_embedder(settings: &EmbeddingSettings, base_dir: &Path) -> Result<Arc<dyn Embedder>> {
    if fake_requested(settings) {
        tracing::info!(dim = settings.dim, "using fake embedder");
        return Ok(Arc::new(FakeEmbedder::new(settings.dim)));
    }
    let model_dir = resolve_with_base(base_dir, &settings.model_dir);
    Ok(Arc::new(BertEmbedder::load(&model_dir, settings)?))
}

pub fn load_cross_encoder(model_dir: &str, base_dir: &Path) -> Result<Arc<dyn RelevanceModel>> {
    let model_dir = resolve_with_base(base_dir, model_dir);
    Ok(Arc::new(CrossEncoder::load(&model_dir)?))
}
