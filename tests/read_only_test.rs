//! Integration tests for read-only execution.
//!
//! Tests verify that:
//! - Write, DDL and multi-statement queries are rejected and change nothing
//! - The read-only store connection refuses writes even past the guard
//! - Re-executing a query yields an identical result
//! - A second read-only connection to the same store sees identical rows

mod common;

use common::{TestStore, query, scripted};
use meeting_sql_agent::catalog::SchemaCatalog;
use meeting_sql_agent::config::AgentSettings;
use meeting_sql_agent::db::{DbPool, QueryExecutor};
use meeting_sql_agent::models::{CandidateQuery, ExecutionResult, FailureCategory};

fn is_rejected(result: &ExecutionResult) -> bool {
    matches!(result, ExecutionResult::Failure(f) if f.category == FailureCategory::Rejected)
}

#[tokio::test]
async fn test_write_queries_are_rejected() {
    let store = TestStore::seeded().await;
    let generator = scripted([
        query("DELETE FROM meetings"),
        query("UPDATE firms SET name = 'Hijacked'"),
        query("DROP TABLE employees"),
    ]);
    let agent = store.agent(generator, AgentSettings::default()).await;

    let response = agent.ask("Remove every meeting").await;

    assert_eq!(response.attempts.len(), 3);
    assert!(response.attempts.iter().all(|a| is_rejected(&a.result)));
    assert!(response.text().starts_with("I was unable to retrieve data"));

    assert_eq!(store.count("meetings").await, 2);
    assert_eq!(store.count("employees").await, 2);
    let pool = store.writable_pool().await;
    let hijacked: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM firms WHERE name = 'Hijacked'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(hijacked, 0);
}

#[tokio::test]
async fn test_executor_rejects_smuggled_statements() {
    let store = TestStore::seeded().await;
    let executor = QueryExecutor::new(store.agent_pool().await, &SchemaCatalog::meetings());

    for sql in [
        "SELECT name FROM firms; DELETE FROM firms",
        "INSERT INTO firms VALUES ('x', 'x', 'x', 'x')",
        "CREATE TABLE notes (id INTEGER)",
        "PRAGMA writable_schema = 1",
        "ATTACH DATABASE 'other.db' AS other",
    ] {
        let result = executor.execute(&CandidateQuery::new(1, sql)).await;
        assert!(result.is_failure(), "accepted: {sql}");
        assert!(
            matches!(
                result,
                ExecutionResult::Failure(ref f)
                    if matches!(f.category, FailureCategory::Rejected | FailureCategory::Syntax)
            ),
            "unexpected category for: {sql}"
        );
    }
    assert_eq!(store.count("firms").await, 3);
}

#[tokio::test]
async fn test_store_connection_is_read_only() {
    let store = TestStore::seeded().await;
    let DbPool::SQLite(pool) = store.agent_pool().await else {
        panic!("expected a SQLite pool");
    };

    let write = sqlx::query("DELETE FROM firms").execute(&pool).await;
    assert!(write.is_err());
    assert_eq!(store.count("firms").await, 3);
}

#[tokio::test]
async fn test_re_execution_is_identical() {
    let store = TestStore::seeded().await;
    let catalog = SchemaCatalog::meetings();
    let sql = "SELECT beam_id, title, date, firms_discussed, employees
               FROM meeting_notes ORDER BY date ASC";

    let executor = QueryExecutor::new(store.agent_pool().await, &catalog);
    let first = executor.execute(&CandidateQuery::new(1, sql)).await;
    let second = executor.execute(&CandidateQuery::new(1, sql)).await;
    assert_eq!(first, second);
    assert_eq!(first.row_count(), 2);

    // A separate read-only connection to the same store
    let replica = QueryExecutor::new(store.agent_pool().await, &catalog);
    let third = replica.execute(&CandidateQuery::new(1, sql)).await;
    assert_eq!(first, third);

    let ExecutionResult::Rows(rows) = first else {
        panic!("expected rows");
    };
    assert_eq!(
        rows.columns,
        vec!["beam_id", "title", "date", "firms_discussed", "employees"]
    );
    assert_eq!(rows.rows[0]["beam_id"], "BEAM-001");
    assert_eq!(rows.rows[0]["firms_discussed"], "Nimbus Robotics");
    assert_eq!(rows.rows[1]["employees"], "Bob Stone");
}
