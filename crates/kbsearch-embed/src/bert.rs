//! Sentence-transformer style encoders on candle: a BERT body loaded from a
//! local Hugging Face snapshot directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::Tokenizer;

use kbsearch_core::config::EmbeddingSettings;
use kbsearch_core::traits::Embedder;
use kbsearch_core::types::Embedding;
use kbsearch_core::{Error, Result};

use crate::device::select_device;
use crate::pool::{masked_mean_l2, rows};
use crate::tokenize::{load_tokenizer, tokenize_batch};

/// Files of a local model snapshot.
pub(crate) struct ModelFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

impl ModelFiles {
    pub(crate) fn locate(model_dir: &Path) -> Result<Self> {
        if !model_dir.exists() {
            return Err(Error::ModelLoad(format!("model directory {} does not exist", model_dir.display())));
        }
        let weights = ["model.safetensors", "pytorch_model.bin"]
            .iter()
            .map(|name| model_dir.join(name))
            .find(|p| p.exists())
            .ok_or_else(|| Error::ModelLoad(format!("no model.safetensors or pytorch_model.bin in {}", model_dir.display())))?;
        Ok(Self { config: model_dir.join("config.json"), tokenizer: model_dir.join("tokenizer.json"), weights })
    }

    /// The parsed BERT config and its `hidden_size`.
    pub(crate) fn bert_config(&self) -> Result<(BertConfig, usize)> {
        let raw = std::fs::read_to_string(&self.config)
            .map_err(|e| Error::ModelLoad(format!("failed to read {}: {e}", self.config.display())))?;
        let value: serde_json::Value = serde_json::from_str(&raw)
            .map_err(|e| Error::ModelLoad(format!("invalid {}: {e}", self.config.display())))?;
        let hidden_size = value
            .get("hidden_size")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| Error::ModelLoad(format!("{} has no hidden_size", self.config.display())))? as usize;
        let config = serde_json::from_value(value)
            .map_err(|e| Error::ModelLoad(format!("invalid {}: {e}", self.config.display())))?;
        Ok((config, hidden_size))
    }

    pub(crate) fn var_builder(&self, device: &Device) -> Result<VarBuilder<'static>> {
        let is_safetensors = self.weights.extension().and_then(|e| e.to_str()) == Some("safetensors");
        if is_safetensors {
            let bytes = std::fs::read(&self.weights)?;
            VarBuilder::from_buffered_safetensors(bytes, DType::F32, device).map_err(Error::model_load)
        } else {
            let tensors = candle_core::pickle::read_all(&self.weights).map_err(Error::model_load)?;
            let tensors: HashMap<String, Tensor> = tensors.into_iter().collect();
            Ok(VarBuilder::from_tensors(tensors, DType::F32, device))
        }
    }
}

/// Mean-pooled, L2-normalised BERT sentence embeddings (e.g. all-MiniLM-L6-v2, 384-d).
pub struct BertEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    model_id: String,
    dim: usize,
    max_len: usize,
}

impl BertEmbedder {
    pub fn load(model_dir: &Path, settings: &EmbeddingSettings) -> Result<Self> {
        let start = Instant::now();
        let device = select_device();
        tracing::info!(model = %settings.model_id, dir = %model_dir.display(), "loading embedding model");
        let files = ModelFiles::locate(model_dir)?;
        let tokenizer = load_tokenizer(&files.tokenizer, settings.max_len)?;
        let (config, hidden_size) = files.bert_config()?;
        if hidden_size != settings.dim {
            return Err(Error::ModelLoad(format!(
                "model hidden size {hidden_size} does not match embedding.dim {}",
                settings.dim
            )));
        }
        let vb = files.var_builder(&device)?;
        let model = BertModel::load(vb, &config).map_err(Error::model_load)?;
        tracing::info!(elapsed_ms = start.elapsed().as_millis() as u64, "embedding model loaded");
        Ok(Self { model, tokenizer, device, model_id: settings.model_id.clone(), dim: settings.dim, max_len: settings.max_len })
    }
}

impl Embedder for BertEmbedder {
    fn model_id(&self) -> &str { &self.model_id }

    fn dim(&self) -> usize { self.dim }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let start = Instant::now();
        let inputs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let batch = tokenize_batch(&self.tokenizer, inputs, self.max_len, &self.device)?;
        let hidden = self
            .model
            .forward(&batch.input_ids, &batch.token_type_ids, Some(&batch.attention_mask))
            .map_err(Error::embedding)?;
        let vectors = rows(&masked_mean_l2(&hidden, &batch.attention_mask)?)?;
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dim) {
            return Err(Error::Embedding(format!("expected {} dimensions, model produced {}", self.dim, bad.len())));
        }
        tracing::debug!(texts = texts.len(), elapsed_ms = start.elapsed().as_millis() as u64, "embedded batch");
        Ok(vectors)
    }
}
