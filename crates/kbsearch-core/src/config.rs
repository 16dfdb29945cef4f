//! Configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars + the flat legacy env names (`QDRANT_URL`, `LIMIT_FIRST`, ...).
//! Provides helpers to expand `~` and `${VAR}` and to resolve relative paths
//! against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Flat environment names kept for compatibility with existing deployments.
///
/// `EMBEDDING_MODEL` only renames `embedding.model_id`, the label used in logs.
/// The weights are always read from `embedding.model_dir` (`APP_EMBEDDING__MODEL_DIR`).
const LEGACY_ENV: &[(&str, &str)] = &[
    ("QDRANT_URL", "vector_store.url"),
    ("COLLECTION_NAME", "vector_store.collection"),
    ("VECTOR_NAME", "vector_store.vector_name"),
    ("EMBEDDING_MODEL", "embedding.model_id"),
    ("LIMIT_FIRST", "search.limit_first"),
    ("LIMIT_FINAL", "search.limit_final"),
    ("RERANK_ALPHA", "search.rerank_alpha"),
    ("CACHE_MAX_SIZE", "search.cache_max_size"),
    ("USE_CROSS_ENCODER", "search.use_cross_encoder"),
    ("APP_USE_FAKE_EMBEDDINGS", "embedding.use_fake"),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreSettings {
    pub url: String,
    pub collection: String,
    pub vector_name: String,
    pub timeout_secs: u64,
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:6333".into(),
            collection: "papers".into(),
            vector_name: "fast-all-minilm-l6-v2".into(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub model_id: String,
    pub model_dir: String,
    pub dim: usize,
    pub max_len: usize,
    #[serde(deserialize_with = "de_flag")]
    pub use_fake: bool,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model_id: "sentence-transformers/all-MiniLM-L6-v2".into(),
            model_dir: "models/all-MiniLM-L6-v2".into(),
            dim: 384,
            max_len: 256,
            use_fake: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Candidate pool size requested from the vector store.
    pub limit_first: usize,
    /// Number of results kept after reranking.
    pub limit_final: usize,
    pub rerank_alpha: f32,
    pub cache_max_size: usize,
    #[serde(deserialize_with = "de_flag")]
    pub use_cross_encoder: bool,
    pub cross_encoder_dir: String,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            limit_first: 20,
            limit_final: 5,
            rerank_alpha: 0.6,
            cache_max_size: 200,
            use_cross_encoder: false,
            cross_encoder_dir: "models/ms-marco-MiniLM-L-6-v2".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingSettings {
    pub docs_dir: String,
    pub source_base_url: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub batch_size: usize,
    pub export_file: String,
}

impl Default for IndexingSettings {
    fn default() -> Self {
        Self {
            docs_dir: "docs_crawl".into(),
            source_base_url: "https://docs.kinescope.ru".into(),
            chunk_size: 600,
            chunk_overlap: 100,
            batch_size: 64,
            export_file: "data/qdrant_papers_export.jsonl".into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub vector_store: VectorStoreSettings,
    pub embedding: EmbeddingSettings,
    pub search: SearchSettings,
    pub indexing: IndexingSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        let s = &self.search;
        if s.limit_first == 0 { return Err(Error::InvalidConfig("search.limit_first must be at least 1".into())); }
        if s.limit_final == 0 { return Err(Error::InvalidConfig("search.limit_final must be at least 1".into())); }
        if !(0.0..=1.0).contains(&s.rerank_alpha) {
            return Err(Error::InvalidConfig(format!("search.rerank_alpha must be within [0, 1], got {}", s.rerank_alpha)));
        }
        if s.cache_max_size == 0 { return Err(Error::InvalidConfig("search.cache_max_size must be at least 1".into())); }
        if self.embedding.dim == 0 { return Err(Error::InvalidConfig("embedding.dim must be at least 1".into())); }
        let i = &self.indexing;
        if i.chunk_overlap >= i.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "indexing.chunk_overlap ({}) must be smaller than indexing.chunk_size ({})",
                i.chunk_overlap, i.chunk_size
            )));
        }
        if i.batch_size == 0 { return Err(Error::InvalidConfig("indexing.batch_size must be at least 1".into())); }
        if s.limit_first < s.limit_final {
            tracing::warn!(limit_first = s.limit_first, limit_final = s.limit_final, "candidate pool is smaller than the final result count");
        }
        Ok(())
    }
}

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));
        for &(name, key) in LEGACY_ENV {
            figment = figment.merge(Env::raw().only(&[name]).map(move |_| key.into()));
        }

        let config = Self { figment };
        tracing::debug!(env = %env_name, "configuration loaded");
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{}': {}", key, e)))
    }

    /// The typed settings, validated.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

/// Accepts `true/false`, `1/0` and `yes/no` (strings or scalars).
fn de_flag<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag { Bool(bool), Int(i64), Text(String) }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(n) => n != 0,
        Flag::Text(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
    })
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
