use std::fmt;

use kbsearch_core::types::RankedResult;

/// What a search produced. `Display` renders the text handed to the chat
/// backend and the tool interface.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    EmptyQuery,
    NothingFound { query: String },
    Results { query: String, results: Vec<RankedResult> },
}

impl SearchOutcome {
    pub fn results(&self) -> &[RankedResult] {
        match self {
            SearchOutcome::Results { results, .. } => results,
            _ => &[],
        }
    }
}

impl fmt::Display for SearchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchOutcome::EmptyQuery => f.write_str("Укажите query для поиска."),
            SearchOutcome::NothingFound { query } => write!(f, "По запросу «{query}» ничего не найдено."),
            SearchOutcome::Results { query, results } => {
                writeln!(f, "Результаты по запросу «{query}»:")?;
                for (i, result) in results.iter().enumerate() {
                    let payload = &result.candidate.payload;
                    write!(f, "\n{}. (score: {:.3}) {}", result.rank, result.candidate.vector_score, payload.section)?;
                    write!(f, "\n   Источник: {}", payload.source)?;
                    let content = payload.content.trim();
                    if !content.is_empty() {
                        write!(f, "\n   Текст: {content}")?;
                    }
                    if i + 1 < results.len() {
                        f.write_str("\n")?;
                    }
                }
                Ok(())
            }
        }
    }
}
