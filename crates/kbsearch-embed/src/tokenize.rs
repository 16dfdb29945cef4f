use candle_core::{Device, Tensor};
use tokenizers::{EncodeInput, Tokenizer, TruncationParams};

use kbsearch_core::{Error, Result};

const PAD_ID: u32 = 0;

/// A right-padded batch: `input_ids`, `token_type_ids` and `attention_mask`, all `[B, T]`.
pub struct TokenBatch {
    pub input_ids: Tensor,
    pub token_type_ids: Tensor,
    pub attention_mask: Tensor,
}

/// Encodes single texts or `(query, passage)` pairs, truncating each to `max_len`
/// tokens and padding to the longest sequence in the batch.
pub fn tokenize_batch<'s, E>(tokenizer: &Tokenizer, inputs: Vec<E>, max_len: usize, device: &Device) -> Result<TokenBatch>
where
    E: Into<EncodeInput<'s>> + Send,
{
    let encodings = tokenizer
        .encode_batch(inputs, true)
        .map_err(|e| Error::embedding(format!("tokenization failed: {e}")))?;
    let seq_len = encodings.iter().map(|e| e.get_ids().len().min(max_len)).max().unwrap_or(0).max(1);
    let batch = encodings.len();

    let mut ids = Vec::with_capacity(batch * seq_len);
    let mut type_ids = Vec::with_capacity(batch * seq_len);
    let mut mask = Vec::with_capacity(batch * seq_len);
    for enc in &encodings {
        push_padded(&mut ids, enc.get_ids(), seq_len, PAD_ID);
        push_padded(&mut type_ids, enc.get_type_ids(), seq_len, 0);
        push_padded(&mut mask, enc.get_attention_mask(), seq_len, 0);
    }
    let shape = (batch, seq_len);
    Ok(TokenBatch {
        input_ids: Tensor::from_vec(ids, shape, device).map_err(Error::embedding)?,
        token_type_ids: Tensor::from_vec(type_ids, shape, device).map_err(Error::embedding)?,
        attention_mask: Tensor::from_vec(mask, shape, device).map_err(Error::embedding)?,
    })
}

fn push_padded(out: &mut Vec<u32>, values: &[u32], seq_len: usize, pad: u32) {
    let take = values.len().min(seq_len);
    out.extend_from_slice(&values[..take]);
    out.extend(std::iter::repeat(pad).take(seq_len - take));
}

/// Loads `tokenizer.json` with truncation at `max_len` tokens, so pairs keep
/// their trailing separator.
pub fn load_tokenizer(path: &std::path::Path, max_len: usize) -> Result<Tokenizer> {
    let mut tokenizer = Tokenizer::from_file(path)
        .map_err(|e| Error::model_load(format!("failed to load tokenizer from {}: {e}", path.display())))?;
    tokenizer
        .with_truncation(Some(TruncationParams { max_length: max_len, ..Default::default() }))
        .map_err(|e| Error::model_load(format!("invalid truncation settings: {e}")))?;
    tokenizer.with_padding(None);
    Ok(tokenizer)
}
