//! Retrieval quality check: runs fixture queries through the engine and checks
//! that an expected section or source lands within a rank threshold.

use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::path::Path;

use kbsearch_core::types::{Query, RankedResult};
use kbsearch_core::{Error, Result};

use crate::engine::{RetrievalEngine, SearchOptions};

/// Overrides for the engine defaults; any field left out keeps the default.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FixtureParams {
    pub limit_first: Option<usize>,
    pub limit_final: Option<usize>,
    pub rerank_alpha: Option<f32>,
    pub use_cross_encoder: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TestCase {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub expected_section_contains: Option<String>,
    #[serde(default)]
    pub expected_in_top: Option<usize>,
}

impl TestCase {
    pub fn label(&self) -> String {
        match &self.id {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "?".into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub params: FixtureParams,
    #[serde(default)]
    pub tests: Vec<TestCase>,
}

impl Fixture {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::NotFound(format!("relevance fixture {} does not exist", path.display())));
        }
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw).map_err(|e| Error::Fixture(format!("{}: {e}", path.display())))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::Fixture(e.to_string()))
    }

    pub fn options(&self, defaults: &SearchOptions) -> SearchOptions {
        SearchOptions {
            limit_first: self.params.limit_first.unwrap_or(defaults.limit_first),
            limit_final: self.params.limit_final.unwrap_or(defaults.limit_final),
            alpha: self.params.rerank_alpha.unwrap_or(defaults.alpha),
            use_cross_encoder: self.params.use_cross_encoder.unwrap_or(defaults.use_cross_encoder),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recommendation {
    /// Retrieved, but reranked below the threshold.
    LowerAlpha { position: usize },
    /// Not among the retrieved candidates at all.
    ImproveContent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseOutcome {
    Passed { position: usize },
    Failed { found_at: Option<usize>, position_in_pool: Option<usize>, recommendation: Recommendation },
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseReport {
    pub id: String,
    pub query: String,
    pub expected_in_top: usize,
    pub outcome: CaseOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelevanceReport {
    pub options: SearchOptions,
    pub cases: Vec<CaseReport>,
}

impl RelevanceReport {
    pub fn passed(&self) -> usize { self.count(|o| matches!(o, CaseOutcome::Passed { .. })) }

    pub fn failed(&self) -> usize { self.count(|o| matches!(o, CaseOutcome::Failed { .. })) }

    pub fn skipped(&self) -> usize { self.count(|o| matches!(o, CaseOutcome::Skipped)) }

    /// 0 when no case failed, 1 otherwise.
    pub fn exit_code(&self) -> i32 { i32::from(self.failed() > 0) }

    fn count(&self, pred: impl Fn(&CaseOutcome) -> bool) -> usize {
        self.cases.iter().filter(|c| pred(&c.outcome)).count()
    }
}

fn position_of(ranked: &[RankedResult], expected: &str) -> Option<usize> {
    let expected = expected.to_lowercase();
    ranked
        .iter()
        .position(|r| r.candidate.payload.label().to_lowercase().contains(&expected))
        .map(|i| i + 1)
}

/// Runs every case. Engine failures abort the run.
pub async fn run_relevance(engine: &RetrievalEngine, fixture: &Fixture) -> Result<RelevanceReport> {
    let options = fixture.options(engine.defaults());
    options.validate()?;
    let mut cases = Vec::with_capacity(fixture.tests.len());
    for case in &fixture.tests {
        let id = case.label();
        let query = case.query.as_deref().and_then(Query::parse);
        let expected = case.expected_section_contains.as_deref().map(str::trim).filter(|e| !e.is_empty());
        let expected_in_top = case.expected_in_top.unwrap_or(options.limit_final);
        let (Some(query), Some(expected)) = (query, expected) else {
            tracing::debug!(case = %id, "skipping case without query or expected_section_contains");
            cases.push(CaseReport { id, query: case.query.clone().unwrap_or_default(), expected_in_top, outcome: CaseOutcome::Skipped });
            continue;
        };

        let ranked = engine.rank_all(&query, &options).await?;
        let top = &ranked[..ranked.len().min(options.limit_final)];
        let found_at = position_of(top, expected);
        let position_in_pool = found_at.or_else(|| position_of(&ranked, expected));

        let within = |p: Option<usize>| p.is_some_and(|p| p <= expected_in_top);
        let outcome = if within(found_at) || within(position_in_pool) {
            CaseOutcome::Passed { position: found_at.or(position_in_pool).unwrap_or_default() }
        } else {
            let recommendation = match position_in_pool {
                Some(position) => Recommendation::LowerAlpha { position },
                None => Recommendation::ImproveContent,
            };
            CaseOutcome::Failed { found_at, position_in_pool, recommendation }
        };
        tracing::debug!(case = %id, ?outcome, "relevance case evaluated");
        cases.push(CaseReport { id, query: query.to_string(), expected_in_top, outcome });
    }
    Ok(RelevanceReport { options, cases })
}

fn preview(query: &str) -> String { query.chars().take(50).collect() }

impl fmt::Display for RelevanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let limit_first = self.options.limit_first;
        for case in &self.cases {
            match &case.outcome {
                CaseOutcome::Skipped => writeln!(f, "  [{}] пропущен: нет query или expected_section_contains", case.id)?,
                CaseOutcome::Passed { position } => writeln!(
                    f,
                    "  [OK] {}: «{}...» — ожидаемый источник на месте {position}",
                    case.id,
                    preview(&case.query)
                )?,
                CaseOutcome::Failed { position_in_pool, .. } => {
                    let location = match position_in_pool {
                        Some(p) => format!(" (в топ-{limit_first} на позиции {p})"),
                        None => " (не найден в топе)".to_string(),
                    };
                    writeln!(
                        f,
                        "  [FAIL] {}: «{}...» — ожидаемый источник не в топ-{}{location}",
                        case.id,
                        preview(&case.query),
                        case.expected_in_top
                    )?;
                }
            }
        }
        writeln!(f)?;
        write!(f, "Итого: {}/{} тестов пройдено.", self.passed(), self.cases.len())?;
        if self.failed() == 0 {
            return Ok(());
        }
        write!(f, "\n\nРекомендации по исправлению:")?;
        for case in &self.cases {
            if let CaseOutcome::Failed { recommendation, .. } = &case.outcome {
                match recommendation {
                    Recommendation::LowerAlpha { position } => write!(
                        f,
                        "\n  - {}: ожидаемый результат на позиции {position}. Можно снизить rerank_alpha (например до 0.5) в params фикстуры или в RERANK_ALPHA.",
                        case.id
                    )?,
                    Recommendation::ImproveContent => write!(
                        f,
                        "\n  - {}: ожидаемый раздел не попал в топ-{limit_first}. Проверьте формулировку запроса или добавьте контент в индекс.",
                        case.id
                    )?,
                }
            }
        }
        Ok(())
    }
}
