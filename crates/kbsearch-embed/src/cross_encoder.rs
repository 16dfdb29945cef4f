//! Pairwise relevance scoring with a BERT sequence-classification head
//! (e.g. `cross-encoder/ms-marco-MiniLM-L-6-v2`).

use std::path::Path;
use std::time::Instant;

use candle_core::{Device, Module, Tensor};
use candle_nn::{linear, Linear};
use candle_transformers::models::bert::BertModel;
use tokenizers::Tokenizer;

use kbsearch_core::traits::RelevanceModel;
use kbsearch_core::{Error, Result};

use crate::bert::ModelFiles;
use crate::device::select_device;
use crate::tokenize::{load_tokenizer, tokenize_batch};

const CROSS_ENCODER_MAX_LEN: usize = 512;

pub struct CrossEncoder {
    bert: BertModel,
    pooler: Linear,
    classifier: Linear,
    tokenizer: Tokenizer,
    device: Device,
}

impl CrossEncoder {
    pub fn load(model_dir: &Path) -> Result<Self> {
        let start = Instant::now();
        let device = select_device();
        tracing::info!(dir = %model_dir.display(), "loading cross-encoder");
        let files = ModelFiles::locate(model_dir)?;
        let tokenizer = load_tokenizer(&files.tokenizer, CROSS_ENCODER_MAX_LEN)?;
        let (config, hidden_size) = files.bert_config()?;
        let vb = files.var_builder(&device)?;
        let bert = BertModel::load(vb.pp("bert"), &config).map_err(Error::model_load)?;
        let pooler = linear(hidden_size, hidden_size, vb.pp("bert.pooler.dense")).map_err(Error::model_load)?;
        let classifier = linear(hidden_size, 1, vb.pp("classifier")).map_err(Error::model_load)?;
        tracing::info!(elapsed_ms = start.elapsed().as_millis() as u64, "cross-encoder loaded");
        Ok(Self { bert, pooler, classifier, tokenizer, device })
    }

    fn logits(&self, input_ids: &Tensor, token_type_ids: &Tensor, attention_mask: &Tensor) -> candle_core::Result<Vec<f32>> {
        let hidden = self.bert.forward(input_ids, token_type_ids, Some(attention_mask))?;
        let cls = hidden.narrow(1, 0, 1)?.squeeze(1)?;
        let pooled = self.pooler.forward(&cls)?.tanh()?;
        let logits = self.classifier.forward(&pooled)?.squeeze(1)?;
        logits.to_device(&Device::Cpu)?.to_vec1::<f32>()
    }
}

impl RelevanceModel for CrossEncoder {
    fn predict(&self, pairs: &[(String, String)]) -> Result<Vec<f32>> {
        if pairs.is_empty() {
            return Ok(Vec::new());
        }
        let start = Instant::now();
        let inputs: Vec<(&str, &str)> = pairs.iter().map(|(q, c)| (q.as_str(), c.as_str())).collect();
        let batch = tokenize_batch(&self.tokenizer, inputs, CROSS_ENCODER_MAX_LEN, &self.device)?;
        let scores = self
            .logits(&batch.input_ids, &batch.token_type_ids, &batch.attention_mask)
            .map_err(Error::embedding)?;
        tracing::debug!(pairs = pairs.len(), elapsed_ms = start.elapsed().as_millis() as u64, "cross-encoder scored pairs");
        Ok(scores)
    }
}
