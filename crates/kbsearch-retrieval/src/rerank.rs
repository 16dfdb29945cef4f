//! Second-stage ordering of similarity-search candidates.

use regex::Regex;
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use kbsearch_core::traits::RelevanceModel;
use kbsearch_core::types::{Candidate, RankedResult};
use kbsearch_core::{Error, Result};

fn word_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\w+").expect("word pattern is valid"))
}

/// Lowercased `\w+` tokens of `text`.
pub fn tokenize(text: &str) -> HashSet<String> {
    let lowered = text.to_lowercase();
    word_pattern().find_iter(&lowered).map(|m| m.as_str().to_string()).collect()
}

/// Fraction of query tokens present in `content`; 0 when the query has no tokens.
pub fn keyword_score(query_tokens: &HashSet<String>, content: &str) -> f32 {
    if query_tokens.is_empty() {
        return 0.0;
    }
    let content_tokens = tokenize(content);
    let shared = query_tokens.intersection(&content_tokens).count();
    shared as f32 / query_tokens.len() as f32
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Strategy {
    /// `alpha * vector_score + (1 - alpha) * keyword_score`.
    LexicalBlend { alpha: f32 },
    /// Pairwise model scores; lexical blend with `fallback_alpha` when the model is unavailable.
    CrossEncoder { fallback_alpha: f32 },
}

pub enum RelevanceModelState {
    Ready(Arc<dyn RelevanceModel>),
    Unavailable { reason: String },
}

impl RelevanceModelState {
    pub fn is_ready(&self) -> bool { matches!(self, RelevanceModelState::Ready(_)) }
}

type RelevanceLoader = Box<dyn Fn() -> Result<Arc<dyn RelevanceModel>> + Send + Sync>;

/// Orders candidates with one of the [`Strategy`] variants.
///
/// The relevance model is resolved the first time the cross-encoder strategy is
/// requested and the outcome is kept for the reranker's lifetime: a model that
/// failed to load stays [`RelevanceModelState::Unavailable`] and every later
/// request uses the lexical blend.
pub struct Reranker {
    loader: Option<RelevanceLoader>,
    state: OnceLock<RelevanceModelState>,
}

impl Default for Reranker {
    fn default() -> Self { Self::lexical_only() }
}

impl Reranker {
    pub fn lexical_only() -> Self { Self { loader: None, state: OnceLock::new() } }

    pub fn with_relevance_loader<F>(loader: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn RelevanceModel>> + Send + Sync + 'static,
    {
        Self { loader: Some(Box::new(loader)), state: OnceLock::new() }
    }

    pub fn with_relevance_model(model: Arc<dyn RelevanceModel>) -> Self {
        let state = OnceLock::new();
        let _ = state.set(RelevanceModelState::Ready(model));
        Self { loader: None, state }
    }

    pub fn relevance_state(&self) -> &RelevanceModelState {
        self.state.get_or_init(|| match &self.loader {
            None => RelevanceModelState::Unavailable { reason: "no relevance model configured".into() },
            Some(load) => match load() {
                Ok(model) => RelevanceModelState::Ready(model),
                Err(e) => {
                    tracing::warn!(error = %e, "relevance model unavailable, falling back to lexical blend");
                    RelevanceModelState::Unavailable { reason: e.to_string() }
                }
            },
        })
    }

    /// Scores and sorts `candidates`, keeping at most `limit` when given.
    /// Ties on the score go to the higher vector score, then the smaller point id.
    pub fn rerank(
        &self,
        query: &str,
        candidates: Vec<Candidate>,
        strategy: Strategy,
        limit: Option<usize>,
    ) -> Result<Vec<RankedResult>> {
        let scores = match strategy {
            Strategy::LexicalBlend { alpha } => lexical_blend(query, &candidates, alpha),
            Strategy::CrossEncoder { fallback_alpha } => match self.relevance_state() {
                RelevanceModelState::Ready(model) => pairwise(model.as_ref(), query, &candidates)?,
                RelevanceModelState::Unavailable { reason } => {
                    tracing::debug!(%reason, "cross-encoder requested but unavailable");
                    lexical_blend(query, &candidates, fallback_alpha)
                }
            },
        };

        let mut scored: Vec<(f32, Candidate)> = scores.into_iter().zip(candidates).collect();
        scored.sort_by(|(sa, a), (sb, b)| {
            sb.total_cmp(sa)
                .then_with(|| b.vector_score.total_cmp(&a.vector_score))
                .then_with(|| a.id.cmp(&b.id))
        });
        if let Some(limit) = limit {
            scored.truncate(limit);
        }
        Ok(scored
            .into_iter()
            .enumerate()
            .map(|(i, (combined_score, candidate))| RankedResult { candidate, combined_score, rank: i + 1 })
            .collect())
    }
}

pub fn lexical_blend(query: &str, candidates: &[Candidate], alpha: f32) -> Vec<f32> {
    let query_tokens = tokenize(query);
    candidates
        .iter()
        .map(|c| alpha * c.vector_score + (1.0 - alpha) * keyword_score(&query_tokens, c.payload.content.trim()))
        .collect()
}

fn pairwise(model: &dyn RelevanceModel, query: &str, candidates: &[Candidate]) -> Result<Vec<f32>> {
    if candidates.is_empty() {
        return Ok(Vec::new());
    }
    let pairs: Vec<(String, String)> = candidates
        .iter()
        .map(|c| (query.to_string(), c.payload.content.trim().to_string()))
        .collect();
    let scores = model.predict(&pairs)?;
    if scores.len() != candidates.len() {
        return Err(Error::Operation(format!(
            "relevance model returned {} scores for {} pairs",
            scores.len(),
            candidates.len()
        )));
    }
    Ok(scores)
}

impl std::fmt::Debug for Reranker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.state.get() {
            None => "unresolved",
            Some(RelevanceModelState::Ready(_)) => "ready",
            Some(RelevanceModelState::Unavailable { .. }) => "unavailable",
        };
        f.debug_struct("Reranker").field("relevance_model", &state).finish()
    }
}
