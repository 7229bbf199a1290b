//! Response synthesizer: question + final execution result -> answer.
//!
//! Only non-empty row sets go to the generator. Empty results and failures
//! get fixed, deterministic answers so nothing can be invented for them.

use super::format::format_as_markdown;
use super::prompts;
use crate::llm::TextGenerator;
use crate::models::{Answer, ExecutionResult, FailureCategory, Question, ResultSet};
use std::sync::Arc;
use tracing::warn;

/// Column holding the meeting reference cited as `<ref>beam_id</ref>`.
pub const REFERENCE_COLUMN: &str = "beam_id";

pub const NO_RECORDS_ANSWER: &str = "No matching records were found in the database for this question. \
Try rephrasing it or adding more context, such as the names, firms or dates involved.";

const INABILITY_PREFIX: &str = "I was unable to retrieve data to answer this question.";

fn failure_explanation(category: FailureCategory) -> &'static str {
    match category {
        FailureCategory::Syntax => "The generated database queries were not valid.",
        FailureCategory::SchemaMismatch => {
            "The generated database queries referred to data that does not exist in the database."
        }
        FailureCategory::Timeout => "The database took too long to respond.",
        FailureCategory::Rejected => "The generated database queries were not permitted.",
        FailureCategory::Other => "The database returned an error.",
    }
}

#[derive(Clone)]
pub struct ResponseSynthesizer {
    generator: Arc<dyn TextGenerator>,
    prompt_rows: usize,
}

impl std::fmt::Debug for ResponseSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseSynthesizer")
            .field("prompt_rows", &self.prompt_rows)
            .finish_non_exhaustive()
    }
}

impl ResponseSynthesizer {
    pub fn new(generator: Arc<dyn TextGenerator>, prompt_rows: usize) -> Self {
        Self {
            generator,
            prompt_rows: prompt_rows.max(1),
        }
    }

    /// Write the answer for the final execution result. Never fails.
    pub async fn respond(&self, question: &Question, result: &ExecutionResult) -> Answer {
        match result {
            ExecutionResult::Rows(rows) if rows.is_empty() => Answer {
                text: NO_RECORDS_ANSWER.to_string(),
                record_count: 0,
                clipped: false,
                references: Vec::new(),
            },
            ExecutionResult::Rows(rows) => self.answer_rows(question, rows).await,
            ExecutionResult::Failure(failure) => Answer {
                text: format!(
                    "{} {} Please rephrase the question or add more context.",
                    INABILITY_PREFIX,
                    failure_explanation(failure.category)
                ),
                record_count: 0,
                clipped: false,
                references: Vec::new(),
            },
        }
    }

    async fn answer_rows(&self, question: &Question, rows: &ResultSet) -> Answer {
        let shown = rows.len().min(self.prompt_rows);
        let clipped = shown < rows.len() || rows.truncated;
        let table = format_as_markdown(&rows.columns, &rows.rows[..shown]);
        let prompt = prompts::answer_prompt(question, &table, rows.len(), shown);

        let text = match self.generator.generate(&prompt).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!(error = %e, "Answer generation failed, returning the retrieved records");
                degraded_answer(&table, rows.len(), clipped)
            }
        };

        Answer {
            text,
            record_count: rows.len(),
            clipped,
            references: rows.column_values(REFERENCE_COLUMN),
        }
    }
}

/// Answer built from the rows alone when the generator is unavailable.
fn degraded_answer(table: &str, record_count: usize, clipped: bool) -> String {
    let mut text = format!("**The database returned {} records.**", record_count);
    if clipped {
        text.push_str("\n\n**There are too many records to cover in this response, showing the first records only.**");
    }
    text.push_str("\n\n");
    text.push_str(table.trim_end());
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerationError;
    use crate::llm::ScriptedGenerator;
    use serde_json::json;

    fn meetings(n: usize) -> ResultSet {
        let rows = (1..=n)
            .map(|i| {
                let mut row = serde_json::Map::new();
                row.insert("beam_id".into(), json!(format!("BEAM-{i:03}")));
                row.insert("title".into(), json!(format!("Meeting {i}")));
                row
            })
            .collect();
        ResultSet {
            columns: vec!["beam_id".into(), "title".into()],
            rows,
            truncated: false,
        }
    }

    fn responder(generator: Arc<ScriptedGenerator>, prompt_rows: usize) -> ResponseSynthesizer {
        ResponseSynthesizer::new(generator, prompt_rows)
    }

    #[tokio::test]
    async fn test_rows_are_answered_by_generator() {
        let generator = Arc::new(ScriptedGenerator::new([
            "Found 2 meetings: <ref>BEAM-001</ref> and <ref>BEAM-002</ref>.",
        ]));
        let answer = responder(generator.clone(), 20)
            .respond(&Question::new("Meetings?"), &ExecutionResult::Rows(meetings(2)))
            .await;
        assert!(answer.text.contains("<ref>BEAM-001</ref>"));
        assert_eq!(answer.record_count, 2);
        assert!(!answer.clipped);
        assert_eq!(answer.references, vec!["BEAM-001", "BEAM-002"]);

        let prompt = &generator.prompts()[0];
        assert!(prompt.contains("The database returned 2 records."));
        assert!(prompt.contains("BEAM-002"));
    }

    #[tokio::test]
    async fn test_prompt_rows_are_clipped() {
        let generator = Arc::new(ScriptedGenerator::new(["Too many meetings to list."]));
        let answer = responder(generator.clone(), 20)
            .respond(&Question::new("All meetings"), &ExecutionResult::Rows(meetings(25)))
            .await;
        assert!(answer.clipped);
        assert_eq!(answer.record_count, 25);
        assert_eq!(answer.references.len(), 25);

        let prompt = &generator.prompts()[0];
        assert!(prompt.contains("BEAM-020"));
        assert!(!prompt.contains("BEAM-021"));
        assert!(prompt.contains("first 20 records"));
    }

    #[tokio::test]
    async fn test_generator_failure_degrades() {
        let generator = Arc::new(ScriptedGenerator::from_results([Err(
            GenerationError::Api {
                status: 503,
                message: "unavailable".into(),
            },
        )]));
        let answer = responder(generator, 20)
            .respond(&Question::new("Meetings?"), &ExecutionResult::Rows(meetings(3)))
            .await;
        assert!(answer.text.starts_with("**The database returned 3 records.**"));
        assert!(answer.text.contains("BEAM-003"));
        assert!(!answer.text.contains("unavailable"));
    }

    #[tokio::test]
    async fn test_empty_rows_skip_generator() {
        let generator = Arc::new(ScriptedGenerator::default());
        let answer = responder(generator.clone(), 20)
            .respond(
                &Question::new("Meetings with Nobody?"),
                &ExecutionResult::Rows(ResultSet::default()),
            )
            .await;
        assert_eq!(answer.text, NO_RECORDS_ANSWER);
        assert_eq!(answer.record_count, 0);
        assert_eq!(generator.call_count(), 0);
    }

    #[tokio::test]
    async fn test_failure_hides_raw_error() {
        let generator = Arc::new(ScriptedGenerator::default());
        let result = ExecutionResult::failure(
            FailureCategory::SchemaMismatch,
            "no such column: meetings.full_name",
        );
        let answer = responder(generator.clone(), 20)
            .respond(&Question::new("q"), &result)
            .await;
        assert!(answer.text.starts_with(INABILITY_PREFIX));
        assert!(!answer.text.contains("full_name"));
        assert_eq!(generator.call_count(), 0);
    }
}
