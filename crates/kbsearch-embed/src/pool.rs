use candle_core::{DType, Tensor};

use kbsearch_core::{Error, Result};

/// Attention-masked mean over the token axis followed by L2 normalisation.
/// `hidden` is `[B, T, H]`, `attention_mask` is `[B, T]`; returns `[B, H]`.
pub fn masked_mean_l2(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    pool(hidden, attention_mask).map_err(Error::embedding)
}

fn pool(hidden: &Tensor, attention_mask: &Tensor) -> candle_core::Result<Tensor> {
    let (batch, _tokens, hidden_dim) = hidden.dims3()?;
    let mask = attention_mask.to_device(hidden.device())?.to_dtype(hidden.dtype())?;
    let masked = hidden.broadcast_mul(&mask.unsqueeze(2)?)?;
    let sum = masked.sum(1)?;
    let lengths = mask.sum_keepdim(1)?.maximum(1e-9)?;
    let mean = sum.broadcast_div(&lengths)?;
    let eps = match hidden.dtype() { DType::F16 => 1e-6, _ => 1e-12 };
    let norm = (mean.sqr()?.sum_keepdim(1)?.sqrt()? + eps)?;
    let pooled = mean.broadcast_div(&norm)?;
    debug_assert_eq!(pooled.dims(), &[batch, hidden_dim]);
    Ok(pooled)
}

/// Copies a `[B, H]` tensor into one vector per row.
pub fn rows(t: &Tensor) -> Result<Vec<Vec<f32>>> {
    t.to_dtype(DType::F32)
        .and_then(|t| t.to_device(&candle_core::Device::Cpu))
        .and_then(|t| t.to_vec2::<f32>())
        .map_err(Error::embedding)
}
