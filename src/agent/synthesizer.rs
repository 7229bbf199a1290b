//! Query synthesizer: question + catalog + history -> candidate query.

use super::prompts;
use crate::catalog::SchemaCatalog;
use crate::error::SynthesisError;
use crate::llm::TextGenerator;
use crate::models::{Attempt, CandidateQuery, DatabaseType, Question};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{debug, warn};

/// Parsed generator output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisOutput {
    pub thoughts: Vec<String>,
    pub possible: bool,
    pub query: String,
}

#[derive(Debug, Deserialize)]
struct RawOutput {
    #[serde(default, alias = "steps")]
    thoughts: Vec<JsonValue>,
    #[serde(default = "default_possible")]
    possible: bool,
    #[serde(default, alias = "sql")]
    query: String,
}

fn default_possible() -> bool {
    true
}

/// Flatten a thought entry: plain strings, or `{thoughts, outcome}` objects.
fn thought_text(value: JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s),
        JsonValue::Object(obj) => {
            let parts: Vec<String> = obj
                .values()
                .filter_map(|v| v.as_str().map(str::to_string))
                .filter(|s| !s.trim().is_empty())
                .collect();
            (!parts.is_empty()).then(|| parts.join(" -> "))
        }
        JsonValue::Null => None,
        other => Some(other.to_string()),
    }
}

/// Strip a surrounding ``` fence, with or without a language tag.
fn strip_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end().trim_end_matches("```").trim()
}

/// Body of the first ```sql fenced block.
fn sql_fence(text: &str) -> Option<&str> {
    let lower = text.to_lowercase();
    let start = lower.find("```sql")? + "```sql".len();
    let end = text[start..].find("```").map_or(text.len(), |e| start + e);
    Some(text[start..end].trim())
}

fn looks_like_sql(text: &str) -> bool {
    let head = text.trim_start().to_lowercase();
    head.starts_with("select") || head.starts_with("with")
}

/// Read the generator's output.
///
/// Accepts a JSON object (optionally fenced), a ```sql fenced block, or bare SQL.
pub fn parse_output(raw: &str) -> Result<SynthesisOutput, SynthesisError> {
    let unfenced = strip_fence(raw);

    let json = match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(start), Some(end)) if start < end => Some(&unfenced[start..=end]),
        _ => None,
    };
    if let Some(json) = json {
        if let Ok(output) = serde_json::from_str::<RawOutput>(json) {
            return Ok(SynthesisOutput {
                thoughts: output.thoughts.into_iter().filter_map(thought_text).collect(),
                possible: output.possible,
                query: output.query.trim().to_string(),
            });
        }
    }

    if let Some(sql) = sql_fence(raw) {
        return Ok(SynthesisOutput {
            thoughts: Vec::new(),
            possible: true,
            query: sql.to_string(),
        });
    }

    if looks_like_sql(unfenced) {
        return Ok(SynthesisOutput {
            thoughts: Vec::new(),
            possible: true,
            query: unfenced.to_string(),
        });
    }

    Err(SynthesisError::Unparseable {
        message: raw.chars().take(200).collect(),
    })
}

/// Produces candidate queries for one store and catalog.
#[derive(Clone)]
pub struct QuerySynthesizer {
    generator: Arc<dyn TextGenerator>,
    catalog: Arc<SchemaCatalog>,
    db_type: DatabaseType,
    repeat_reprompts: u32,
}

impl std::fmt::Debug for QuerySynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuerySynthesizer")
            .field("db_type", &self.db_type)
            .field("catalog_version", &self.catalog.version)
            .field("repeat_reprompts", &self.repeat_reprompts)
            .finish_non_exhaustive()
    }
}

impl QuerySynthesizer {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        catalog: Arc<SchemaCatalog>,
        db_type: DatabaseType,
        repeat_reprompts: u32,
    ) -> Self {
        Self {
            generator,
            catalog,
            db_type,
            repeat_reprompts,
        }
    }

    /// Produce the candidate query for attempt `attempt` (1-based).
    ///
    /// `history` holds every earlier attempt of this request. A query equal to
    /// one of them (ignoring whitespace and case) is re-prompted up to
    /// `repeat_reprompts` times before failing with [`SynthesisError::Repeated`].
    pub async fn synthesize(
        &self,
        question: &Question,
        history: &[Attempt],
        attempt: u32,
    ) -> Result<CandidateQuery, SynthesisError> {
        let mut repeated: Option<String> = None;
        let mut reprompts = 0;

        loop {
            let prompt = prompts::query_prompt(
                &self.catalog,
                self.db_type,
                question,
                history,
                repeated.as_deref(),
            );
            let raw = self.generator.generate(&prompt).await?;
            let output = parse_output(&raw)?;

            if !output.possible {
                let reason = if output.thoughts.is_empty() {
                    "no reasoning was given".to_string()
                } else {
                    output.thoughts.join(" ")
                };
                return Err(SynthesisError::NotPossible { reason });
            }
            if output.query.is_empty() {
                return Err(SynthesisError::EmptyQuery);
            }

            let candidate = CandidateQuery::new(attempt, output.query).with_thoughts(output.thoughts);
            let normalized = candidate.normalized_sql();
            if !history
                .iter()
                .any(|a| a.query.normalized_sql() == normalized)
            {
                debug!(attempt, sql = %candidate.sql, "Synthesized query");
                return Ok(candidate);
            }

            if reprompts >= self.repeat_reprompts {
                return Err(SynthesisError::Repeated { sql: candidate.sql });
            }
            reprompts += 1;
            warn!(attempt, reprompts, sql = %candidate.sql, "Generator repeated a query");
            repeated = Some(candidate.sql);
        }
    }
}
