use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use kbsearch_core::traits::Embedder;
use kbsearch_core::types::Embedding;
use kbsearch_core::Result;

/// Deterministic hashed bag-of-words vectors, L2-normalised. Texts sharing
/// words get a positive cosine similarity, which is enough to exercise the
/// pipeline without model files.
pub struct FakeEmbedder {
    dim: usize,
}

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim: dim.max(1) } }

    fn embed_one(&self, text: &str) -> Embedding {
        let mut v = vec![0f32; self.dim];
        for token in text.split_whitespace() {
            let token = token.to_lowercase();
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            v[idx] += 1.0 + (((h >> 32) as u32) as f32) / (u32::MAX as f32) * 0.1;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        v
    }
}

impl Embedder for FakeEmbedder {
    fn model_id(&self) -> &str { "fake-xxhash" }

    fn dim(&self) -> usize { self.dim }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}
