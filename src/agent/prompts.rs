//! Prompt construction for query and answer generation.

use crate::catalog::SchemaCatalog;
use crate::models::{Attempt, DatabaseType, ExecutionResult, FailureCategory, Question};

const QUERY_ROLE: &str = "You are an expert SQL data retrieval assistant for an investment bank. \
Your task is to write one syntactically correct {dialect} query that retrieves the data \
needed to answer the user's question about company meetings, firms, contacts and employees.";

const QUERY_RULES: &str = "\
Rules you must always follow:
1. Write exactly one read-only SELECT statement (a WITH ... SELECT is fine). Never modify data.
2. Only use the tables, views and columns listed in the schema. Do not query columns that do not exist, and qualify column names with the table name when needed.
3. When returning meetings, always include the beam_id field and order meetings by date in ascending order.
4. When searching free-text fields, use {partial_match} with % wildcards for a case-insensitive partial match. Never use exact equality on names or titles.
5. Do not keyword-search long content fields unless the user explicitly asks to search the content.
6. Never return hidden identifier columns to the user; use them only for joins.
7. If the question cannot be answered from this schema, set \"possible\" to false and explain why in your thoughts.";

const QUERY_OUTPUT: &str = "\
Respond with a single JSON object and nothing else:
{\"thoughts\": [\"step-by-step reasoning about the tables, joins and filters needed\"], \"possible\": true, \"query\": \"SELECT ...\"}";

const ANSWER_ROLE: &str = "You are a chat assistant for an investment bank. \
Employees ask questions about company meeting notes held in a database. \
A SQL agent has already retrieved the data below for the user's question. \
Read the question and the retrieved data, report how many records were found, and answer the question.";

const ANSWER_RULES: &str = "\
Important:
- Only use information present in the retrieved data. Never make up information.
- If the retrieved data does not answer the question, say so and ask the user for more context.
- When referencing a meeting, cite its beam_id in xml tags: <ref>beam_id</ref>.
- Format your answer in markdown so it is easy to read.";

/// Case-insensitive partial match operator for the dialect.
fn partial_match_operator(db_type: DatabaseType) -> &'static str {
    match db_type {
        DatabaseType::PostgreSQL => "ILIKE",
        // LIKE is case-insensitive for ASCII in SQLite
        DatabaseType::SQLite => "LIKE",
    }
}

/// Guidance appended after a failed or empty attempt.
fn retry_guidance(result: &ExecutionResult) -> &'static str {
    match result {
        ExecutionResult::Rows(_) => {
            "No rows matched. Broaden the search: loosen or drop filters, use partial matches on names, \
             and check whether the entity lives in a different table or link table."
        }
        ExecutionResult::Failure(f) if f.category == FailureCategory::Timeout => {
            "The query took too long. Simplify it: avoid full-text matching on meeting content, \
             drop unneeded joins and filter earlier."
        }
        ExecutionResult::Failure(_) => {
            "Fix the error. Check the table and column names against the schema and the SQL syntax."
        }
    }
}

/// Prompt for the query synthesizer.
///
/// `repeated` is the SQL the generator just repeated, when re-prompting.
pub fn query_prompt(
    catalog: &SchemaCatalog,
    db_type: DatabaseType,
    question: &Question,
    history: &[Attempt],
    repeated: Option<&str>,
) -> String {
    let mut prompt = String::new();

    prompt.push_str(&QUERY_ROLE.replace("{dialect}", db_type.dialect_name()));
    prompt.push_str("\n\n<schema>\n");
    prompt.push_str(&catalog.render());
    prompt.push_str("</schema>\n\n");
    prompt.push_str(&QUERY_RULES.replace("{partial_match}", partial_match_operator(db_type)));
    prompt.push_str("\n\n");
    prompt.push_str(QUERY_OUTPUT);
    prompt.push_str("\n\n");

    if !history.is_empty() {
        prompt.push_str("#### PREVIOUS ATTEMPTS ####\n");
        for attempt in history {
            prompt.push_str(&format!(
                "Attempt {}:\n```sql\n{}\n```\nResult: {}\n{}\n\n",
                attempt.query.attempt,
                attempt.query.sql.trim(),
                attempt.result.summary(),
                retry_guidance(&attempt.result)
            ));
        }
        prompt.push_str(
            "Write a materially different query that addresses the problems above.\n\
             #### END OF PREVIOUS ATTEMPTS ####\n\n",
        );
    }

    if let Some(sql) = repeated {
        prompt.push_str(&format!(
            "You just proposed this query again, but it was already attempted:\n```sql\n{}\n```\n\
             Do not repeat it. Change the tables, joins or filters.\n\n",
            sql.trim()
        ));
    }

    prompt.push_str(&format!("User question: {}\n", question));
    prompt
}

/// Prompt for the response synthesizer.
pub fn answer_prompt(question: &Question, table: &str, record_count: usize, shown: usize) -> String {
    let mut data = format!("The database returned {} records.\n\n{}", record_count, table);
    if shown < record_count {
        data.push_str(&format!(
            "\nOnly the first {} records are shown. Tell the user there are too many records \
             to cover and focus on the most recent ones shown.\n",
            shown
        ));
    }

    format!(
        "{ANSWER_ROLE}\n\n{ANSWER_RULES}\n\n<query>{question}</query>\n\n<data>\n{data}</data>\n"
    )
}
