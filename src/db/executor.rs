//! Query execution engine.
//!
//! This module runs candidate queries against the store with:
//! - SQL guard checks before anything reaches the store
//! - Read-only transactions that are always rolled back
//! - Row caps (enforced via streaming - only fetches needed rows)
//! - Query timeouts
//!
//! Every outcome, including store errors and timeouts, is returned as an
//! [`ExecutionResult`]; nothing propagates past this boundary.
//!
//! # Architecture
//!
//! The executor uses database-specific implementations organized in submodules:
//! - `postgres`: `READ ONLY` transaction with a server-side statement timeout
//! - `sqlite`: transaction on a read-only connection, interrupted by a
//!   progress handler once the query timeout passes
//!
//! Each submodule provides identical functionality adapted to the database.

use crate::catalog::SchemaCatalog;
use crate::db::guard::SqlGuard;
use crate::db::pool::DbPool;
use crate::db::types::RowToJson;
use crate::error::{DbError, DbResult};
use crate::models::{
    CandidateQuery, DEFAULT_QUERY_TIMEOUT_SECS, DEFAULT_ROW_LIMIT, ExecutionResult, MAX_ROW_LIMIT,
    ResultSet,
};
use futures_util::StreamExt;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Query executor bound to one store and one catalog.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    pool: DbPool,
    guard: SqlGuard,
    query_timeout: Duration,
    row_limit: u32,
}

impl QueryExecutor {
    /// Create a new query executor with default settings.
    pub fn new(pool: DbPool, catalog: &SchemaCatalog) -> Self {
        let guard = SqlGuard::new(pool.db_type(), catalog);
        Self {
            pool,
            guard,
            query_timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
            row_limit: DEFAULT_ROW_LIMIT,
        }
    }

    pub fn with_timeout(mut self, query_timeout: Duration) -> Self {
        self.query_timeout = query_timeout;
        self
    }

    /// Set the row cap, clamped to [1, MAX_ROW_LIMIT].
    pub fn with_row_limit(mut self, row_limit: u32) -> Self {
        self.row_limit = row_limit.clamp(1, MAX_ROW_LIMIT);
        self
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Execute a candidate query. Never fails: errors become `ExecutionResult::Failure`.
    pub async fn execute(&self, query: &CandidateQuery) -> ExecutionResult {
        debug!(
            attempt = query.attempt,
            sql = %query.sql,
            limit = self.row_limit,
            timeout_secs = self.query_timeout.as_secs(),
            "Executing query"
        );

        match self.run(&query.sql).await {
            Ok(rows) => {
                if rows.truncated {
                    warn!(
                        attempt = query.attempt,
                        limit = self.row_limit,
                        "Query result truncated"
                    );
                }
                info!(attempt = query.attempt, rows = rows.len(), "Query succeeded");
                ExecutionResult::Rows(rows)
            }
            Err(e) => {
                let category = e.failure_category();
                warn!(
                    attempt = query.attempt,
                    category = %category,
                    error = %e,
                    "Query failed"
                );
                ExecutionResult::failure(category, e.to_string())
            }
        }
    }

    async fn run(&self, sql: &str) -> DbResult<ResultSet> {
        self.guard.check(sql)?;

        match &self.pool {
            DbPool::Postgres(p) => {
                let rows = postgres::fetch_rows(p, sql, self.row_limit, self.query_timeout).await?;
                Ok(process_rows(rows, self.row_limit))
            }
            DbPool::SQLite(p) => {
                let rows = sqlite::fetch_rows(p, sql, self.row_limit, self.query_timeout).await?;
                Ok(process_rows(rows, self.row_limit))
            }
        }
    }
}

/// Process rows from any database type into a ResultSet.
fn process_rows<R: RowToJson>(rows: Vec<R>, row_limit: u32) -> ResultSet {
    let Some(first) = rows.first() else {
        return ResultSet::default();
    };

    let columns = first.column_names();
    let truncated = rows.len() > row_limit as usize;
    let rows = rows
        .iter()
        .take(row_limit as usize)
        .map(RowToJson::to_json_map)
        .collect();

    ResultSet {
        columns,
        rows,
        truncated,
    }
}

// =============================================================================
// Common Helper Functions
// =============================================================================

fn collect_rows<R>(results: Vec<Result<R, sqlx::Error>>) -> DbResult<Vec<R>> {
    let mut rows = Vec::with_capacity(results.len());
    for result in results {
        rows.push(result.map_err(DbError::from)?);
    }
    Ok(rows)
}

fn timeout_error(operation: &str, timeout: Duration) -> DbError {
    DbError::timeout(operation, timeout.as_secs().max(1) as u32)
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================

mod postgres {
    use super::*;
    use sqlx::PgPool;
    use sqlx::postgres::PgRow;

    pub async fn fetch_rows(
        pool: &PgPool,
        sql: &str,
        row_limit: u32,
        query_timeout: Duration,
    ) -> DbResult<Vec<PgRow>> {
        use sqlx::Executor;

        let fetch_limit = row_limit as usize + 1;
        let mut tx = pool.begin().await?;
        (&mut *tx).execute("SET TRANSACTION READ ONLY").await?;
        (&mut *tx)
            .execute(
                format!(
                    "SET LOCAL statement_timeout = {}",
                    query_timeout.as_millis()
                )
                .as_str(),
            )
            .await?;

        let results = {
            let stream = (&mut *tx).fetch(sql);
            timeout(query_timeout, stream.take(fetch_limit).collect::<Vec<_>>()).await
        };

        if let Err(e) = tx.rollback().await {
            debug!(error = %e, "Rollback after read failed");
        }

        match results {
            Ok(results) => collect_rows(results),
            Err(_) => Err(timeout_error("query execution", query_timeout)),
        }
    }
}

mod sqlite {
    use super::*;
    use sqlx::pool::PoolConnection;
    use sqlx::sqlite::{Sqlite, SqliteRow};
    use sqlx::{SqliteConnection, SqlitePool};
    use std::time::Instant;

    /// VM instructions between deadline checks.
    const PROGRESS_INTERVAL: i32 = 1_000;

    pub async fn fetch_rows(
        pool: &SqlitePool,
        sql: &str,
        row_limit: u32,
        query_timeout: Duration,
    ) -> DbResult<Vec<SqliteRow>> {
        let mut conn = pool.acquire().await?;

        // Dropping the fetch future does not stop the statement on the worker
        // thread, so SQLite itself interrupts it once the deadline passes.
        let deadline = Instant::now() + query_timeout;
        conn.lock_handle()
            .await?
            .set_progress_handler(PROGRESS_INTERVAL, move || Instant::now() < deadline);

        let rows = read_in_transaction(&mut conn, sql, row_limit as usize + 1, query_timeout).await;
        release(conn).await;

        match rows {
            // An interrupted statement surfaces as a store error
            Err(e) if !matches!(e, DbError::Timeout { .. }) && Instant::now() >= deadline => {
                debug!(error = %e, "Query interrupted at deadline");
                Err(timeout_error("query execution", query_timeout))
            }
            rows => rows,
        }
    }

    async fn read_in_transaction(
        conn: &mut SqliteConnection,
        sql: &str,
        fetch_limit: usize,
        query_timeout: Duration,
    ) -> DbResult<Vec<SqliteRow>> {
        use sqlx::{Connection, Executor};

        let mut tx = conn.begin().await?;

        let results = {
            let stream = (&mut *tx).fetch(sql);
            timeout(query_timeout, stream.take(fetch_limit).collect::<Vec<_>>()).await
        };

        if let Err(e) = tx.rollback().await {
            debug!(error = %e, "Rollback after read failed");
        }

        match results {
            Ok(results) => collect_rows(results),
            Err(_) => Err(timeout_error("query execution", query_timeout)),
        }
    }

    /// Clear the deadline before the connection goes back to the pool.
    async fn release(mut conn: PoolConnection<Sqlite>) {
        let cleared = match conn.lock_handle().await {
            Ok(mut handle) => {
                handle.remove_progress_handler();
                true
            }
            Err(e) => {
                debug!(error = %e, "Closing connection with a stale progress handler");
                false
            }
        };
        if !cleared {
            drop(conn.detach());
        }
    }
}
