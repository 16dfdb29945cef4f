use std::fmt::Display;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation failed: {0}")]
    Operation(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Model load failed: {0}")]
    ModelLoad(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Invalid relevance fixture: {0}")]
    Fixture(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn embedding(e: impl Display) -> Self { Self::Embedding(e.to_string()) }
    pub fn model_load(e: impl Display) -> Self { Self::ModelLoad(e.to_string()) }
}

pub type Result<T> = std::result::Result<T, Error>;
