//! Query-related data models.
//!
//! This module defines the values that flow through one retrieval request:
//! the question, each candidate query and its execution result, and the final
//! response with its attempt trail.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Default safety cap on materialized rows per query.
pub const DEFAULT_ROW_LIMIT: u32 = 10_000;

/// Maximum allowed row cap.
pub const MAX_ROW_LIMIT: u32 = 100_000;

/// Default query timeout in seconds.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

/// A natural-language question for one retrieval request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Question(String);

impl Question {
    /// Create a question, trimming surrounding whitespace.
    pub fn new(text: impl AsRef<str>) -> Self {
        Self(text.as_ref().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for Question {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A generated SQL string and the attempt that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateQuery {
    /// 1-based attempt number
    pub attempt: u32,
    pub sql: String,
    /// Reasoning notes returned alongside the query, kept for auditing
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub thoughts: Vec<String>,
}

impl CandidateQuery {
    pub fn new(attempt: u32, sql: impl Into<String>) -> Self {
        Self {
            attempt,
            sql: sql.into(),
            thoughts: Vec::new(),
        }
    }

    pub fn with_thoughts(mut self, thoughts: Vec<String>) -> Self {
        self.thoughts = thoughts;
        self
    }

    /// Whitespace- and case-insensitive form used to detect repeated queries.
    pub fn normalized_sql(&self) -> String {
        normalize_sql(&self.sql)
    }
}

/// Collapse whitespace, drop a trailing semicolon and lowercase.
pub fn normalize_sql(sql: &str) -> String {
    sql.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(';')
        .trim_end()
        .to_lowercase()
}

/// Normalized category of an execution failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    /// The statement could not be parsed
    Syntax,
    /// Unknown table, column or function
    SchemaMismatch,
    /// The per-call timeout elapsed
    Timeout,
    /// Refused as a non read-only statement
    Rejected,
    Other,
}

impl FailureCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Syntax => "syntax",
            Self::SchemaMismatch => "schema_mismatch",
            Self::Timeout => "timeout",
            Self::Rejected => "rejected",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully materialized query rows. Column order is preserved in every row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<serde_json::Map<String, JsonValue>>,
    /// True if the row cap was reached
    #[serde(default)]
    pub truncated: bool,
}

impl ResultSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Collect the distinct string values of a column, in row order.
    pub fn column_values(&self, column: &str) -> Vec<String> {
        let mut values: Vec<String> = Vec::new();
        for row in &self.rows {
            let value = match row.get(column) {
                Some(JsonValue::String(s)) => s.clone(),
                Some(JsonValue::Number(n)) => n.to_string(),
                _ => continue,
            };
            if !values.contains(&value) {
                values.push(value);
            }
        }
        values
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionFailure {
    pub category: FailureCategory,
    /// Raw store or guard message. Diagnostics only, never shown to end users.
    pub message: String,
}

/// Outcome of executing one candidate query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionResult {
    Rows(ResultSet),
    Failure(ExecutionFailure),
}

impl ExecutionResult {
    pub fn failure(category: FailureCategory, message: impl Into<String>) -> Self {
        Self::Failure(ExecutionFailure {
            category,
            message: message.into(),
        })
    }

    /// True for a successful execution that returned no rows.
    pub fn is_empty_rows(&self) -> bool {
        matches!(self, Self::Rows(rows) if rows.is_empty())
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    pub fn row_count(&self) -> usize {
        match self {
            Self::Rows(rows) => rows.len(),
            Self::Failure(_) => 0,
        }
    }

    /// One-line summary used in retry prompts and logs.
    pub fn summary(&self) -> String {
        match self {
            Self::Rows(rows) if rows.is_empty() => {
                "The query ran successfully but returned no rows.".to_string()
            }
            Self::Rows(rows) => format!("The query returned {} rows.", rows.len()),
            Self::Failure(failure) => format!(
                "The query failed ({}): {}",
                failure.category, failure.message
            ),
        }
    }
}

/// One (candidate query, execution result) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub query: CandidateQuery,
    pub result: ExecutionResult,
    pub elapsed_ms: u64,
}

/// Final natural-language answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    /// Rows returned by the final attempt
    pub record_count: usize,
    /// True if not every row was shown to the generator
    pub clipped: bool,
    /// Meeting `beam_id` values present in the final rows
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Outcome {
    Done { answer: Answer },
    Failed { reason: String },
}

/// The result of one `ask` call: the outcome plus the attempt trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub request_id: Uuid,
    pub question: Question,
    pub outcome: Outcome,
    pub attempts: Vec<Attempt>,
}

impl AgentResponse {
    pub fn answer(&self) -> Option<&Answer> {
        match &self.outcome {
            Outcome::Done { answer } => Some(answer),
            Outcome::Failed { .. } => None,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self.outcome, Outcome::Done { .. })
    }

    /// Answer text, or the failure reason.
    pub fn text(&self) -> &str {
        match &self.outcome {
            Outcome::Done { answer } => &answer.text,
            Outcome::Failed { reason } => reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(values: &[(&str, &str)]) -> ResultSet {
        let rows = values
            .iter()
            .map(|(beam_id, name)| {
                let mut row = serde_json::Map::new();
                row.insert("beam_id".into(), json!(beam_id));
                row.insert("name".into(), json!(name));
                row
            })
            .collect();
        ResultSet {
            columns: vec!["beam_id".into(), "name".into()],
            rows,
            truncated: false,
        }
    }

    #[test]
    fn test_question_trims() {
        let q = Question::new("  Which firms?\n");
        assert_eq!(q.as_str(), "Which firms?");
        assert!(Question::new("   ").is_empty());
    }

    #[test]
    fn test_normalized_sql_ignores_layout() {
        let a = CandidateQuery::new(1, "SELECT name\n  FROM firms;");
        let b = CandidateQuery::new(2, "select name from firms");
        assert_eq!(a.normalized_sql(), b.normalized_sql());
    }

    #[test]
    fn test_column_values_are_distinct_and_ordered() {
        let set = rows(&[("b-2", "Acme"), ("b-1", "Globex"), ("b-2", "Acme")]);
        assert_eq!(set.column_values("beam_id"), vec!["b-2", "b-1"]);
        assert!(set.column_values("missing").is_empty());
    }

    #[test]
    fn test_row_order_is_preserved() {
        let set = rows(&[("b-1", "Acme")]);
        let keys: Vec<&String> = set.rows[0].keys().collect();
        assert_eq!(keys, vec!["beam_id", "name"]);
    }

    #[test]
    fn test_execution_result_predicates() {
        let empty = ExecutionResult::Rows(ResultSet::default());
        assert!(empty.is_empty_rows());
        assert!(!empty.is_failure());

        let failed = ExecutionResult::failure(FailureCategory::Syntax, "near SELEC");
        assert!(failed.is_failure());
        assert!(!failed.is_empty_rows());
        assert!(failed.summary().contains("syntax"));
    }

    #[test]
    fn test_execution_result_serializes_with_status_tag() {
        let failed = ExecutionResult::failure(FailureCategory::SchemaMismatch, "no such column");
        let value = serde_json::to_value(&failed).unwrap();
        assert_eq!(value["status"], "failure");
        assert_eq!(value["category"], "schema_mismatch");
    }
}
