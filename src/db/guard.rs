//! SQL guard for generated queries.
//!
//! Every candidate query is parsed with [sqlparser](https://docs.rs/sqlparser/)
//! in the store's dialect before it reaches the store. Only a single read-only
//! query is accepted, and every relation it reads must be described by the
//! schema catalog. Violations are reported as [`DbError`]s whose
//! [`failure_category`](DbError::failure_category) the retrieval agent can act on:
//!
//! | Violation                         | Error                    | Category         |
//! |-----------------------------------|--------------------------|------------------|
//! | Unparseable or empty SQL          | `DbError::InvalidInput`  | `Syntax`         |
//! | Write, DDL or multiple statements | `DbError::Permission`    | `Rejected`       |
//! | Relation not in the catalog       | `DbError::Schema`        | `SchemaMismatch` |

use crate::catalog::SchemaCatalog;
use crate::error::{DbError, DbResult};
use crate::models::DatabaseType;
use sqlparser::ast::{ObjectName, Query, SetExpr, Statement, Visit, Visitor};
use sqlparser::dialect::{Dialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::parser::Parser;
use std::collections::{HashSet, VecDeque};
use std::ops::ControlFlow;

mod error_messages {
    pub const DML_WRITE: &str = "The store is read-only. Write a SELECT query instead.";
    pub const DDL: &str = "Schema changes are not allowed. Write a SELECT query instead.";
    pub const TRANSACTION: &str = "Transaction control is not allowed. Write a single SELECT query.";
    pub const ADMINISTRATIVE: &str = "Administrative statements are not allowed.";
    pub const MULTIPLE: &str = "Only a single SELECT statement is allowed.";
    pub const SELECT_INTO: &str = "SELECT INTO creates a table. Write a plain SELECT query.";
    pub const UNKNOWN: &str = "Only SELECT queries are allowed.";
    pub const PARSE_ERROR: &str = "Failed to parse SQL statement.";
}

/// Type of SQL statement detected by the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlStatementType {
    /// SELECT, VALUES, WITH ... SELECT
    Select,
    /// INSERT, UPDATE, DELETE, MERGE, COPY
    DmlWrite,
    /// CREATE, DROP, ALTER, TRUNCATE
    Ddl,
    /// BEGIN, COMMIT, ROLLBACK, SAVEPOINT
    Transaction,
    /// GRANT, REVOKE, CALL, PRAGMA, ...
    Administrative,
    Unknown,
}

fn get_dialect(db_type: DatabaseType) -> Box<dyn Dialect> {
    match db_type {
        DatabaseType::PostgreSQL => Box::new(PostgreSqlDialect {}),
        DatabaseType::SQLite => Box::new(SQLiteDialect {}),
    }
}

/// Parse `sql` and require exactly one read-only query.
///
/// ```
/// use meeting_sql_agent::db::guard::validate_readonly;
/// use meeting_sql_agent::models::DatabaseType;
///
/// assert!(validate_readonly("SELECT name FROM firms", DatabaseType::PostgreSQL).is_ok());
/// assert!(validate_readonly("DELETE FROM firms", DatabaseType::PostgreSQL).is_err());
/// ```
pub fn validate_readonly(sql: &str, db_type: DatabaseType) -> DbResult<Statement> {
    let dialect = get_dialect(db_type);

    let mut statements = Parser::parse_sql(dialect.as_ref(), sql).map_err(|e| {
        DbError::invalid_input(format!("{} Error: {}", error_messages::PARSE_ERROR, e))
    })?;

    if statements.len() > 1 {
        return Err(DbError::permission(
            "MULTIPLE STATEMENTS",
            error_messages::MULTIPLE,
        ));
    }
    let stmt = statements
        .pop()
        .ok_or_else(|| DbError::invalid_input("Empty SQL statement"))?;

    let (stmt_type, operation_name) = classify_statement(&stmt);
    let reason = match stmt_type {
        SqlStatementType::Select => return check_query_bodies(stmt),
        SqlStatementType::DmlWrite => error_messages::DML_WRITE,
        SqlStatementType::Ddl => error_messages::DDL,
        SqlStatementType::Transaction => error_messages::TRANSACTION,
        SqlStatementType::Administrative => error_messages::ADMINISTRATIVE,
        SqlStatementType::Unknown => error_messages::UNKNOWN,
    };
    Err(DbError::permission(operation_name, reason))
}

/// Classify a parsed statement into a statement type.
fn classify_statement(stmt: &Statement) -> (SqlStatementType, &'static str) {
    match stmt {
        Statement::Query(_) => (SqlStatementType::Select, "SELECT"),

        Statement::Insert { .. } => (SqlStatementType::DmlWrite, "INSERT"),
        Statement::Update { .. } => (SqlStatementType::DmlWrite, "UPDATE"),
        Statement::Delete { .. } => (SqlStatementType::DmlWrite, "DELETE"),
        Statement::Merge { .. } => (SqlStatementType::DmlWrite, "MERGE"),
        Statement::Copy { .. } => (SqlStatementType::DmlWrite, "COPY"),

        Statement::CreateTable { .. } => (SqlStatementType::Ddl, "CREATE TABLE"),
        Statement::CreateView { .. } => (SqlStatementType::Ddl, "CREATE VIEW"),
        Statement::CreateIndex { .. } => (SqlStatementType::Ddl, "CREATE INDEX"),
        Statement::AlterTable { .. } => (SqlStatementType::Ddl, "ALTER TABLE"),
        Statement::Drop { .. } => (SqlStatementType::Ddl, "DROP"),
        Statement::Truncate { .. } => (SqlStatementType::Ddl, "TRUNCATE"),

        Statement::StartTransaction { .. } => (SqlStatementType::Transaction, "BEGIN"),
        Statement::Commit { .. } => (SqlStatementType::Transaction, "COMMIT"),
        Statement::Rollback { .. } => (SqlStatementType::Transaction, "ROLLBACK"),
        Statement::Savepoint { .. } => (SqlStatementType::Transaction, "SAVEPOINT"),

        Statement::Grant { .. } => (SqlStatementType::Administrative, "GRANT"),
        Statement::Revoke { .. } => (SqlStatementType::Administrative, "REVOKE"),
        Statement::Call { .. } => (SqlStatementType::Administrative, "CALL"),
        Statement::Pragma { .. } => (SqlStatementType::Administrative, "PRAGMA"),
        Statement::AttachDatabase { .. } => (SqlStatementType::Administrative, "ATTACH"),

        // EXPLAIN, SHOW, SET, ... are not answers to a question
        _ => (SqlStatementType::Unknown, "Unknown"),
    }
}

/// Reject query bodies that write, such as `SELECT INTO` or data-modifying CTEs.
fn check_query_bodies(stmt: Statement) -> DbResult<Statement> {
    struct BodyCheck;

    impl Visitor for BodyCheck {
        type Break = DbError;

        fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<DbError> {
            match query.body.as_ref() {
                SetExpr::Select(select) if select.into.is_some() => ControlFlow::Break(
                    DbError::permission("SELECT INTO", error_messages::SELECT_INTO),
                ),
                SetExpr::Select(_)
                | SetExpr::Query(_)
                | SetExpr::SetOperation { .. }
                | SetExpr::Values(_)
                | SetExpr::Table(_) => ControlFlow::Continue(()),
                _ => ControlFlow::Break(DbError::permission(
                    "DATA-MODIFYING QUERY",
                    error_messages::DML_WRITE,
                )),
            }
        }
    }

    match stmt.visit(&mut BodyCheck) {
        ControlFlow::Break(err) => Err(err),
        ControlFlow::Continue(()) => Ok(stmt),
    }
}

/// CTE names visible while visiting one query.
struct Scope {
    visible: HashSet<String>,
    /// CTEs of this query whose bodies have not been visited yet
    pending: VecDeque<String>,
}

/// Collects every relation a statement reads that does not resolve to a CTE.
///
/// A non-recursive CTE is visible to later CTEs and to the query body, but
/// not to its own body. In `WITH RECURSIVE` every CTE of the clause is visible
/// everywhere in it.
#[derive(Default)]
struct RelationCollector {
    relations: Vec<String>,
    scopes: Vec<Scope>,
}

impl Visitor for RelationCollector {
    type Break = ();

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<()> {
        let mut visible = self
            .scopes
            .last()
            .map(|scope| scope.visible.clone())
            .unwrap_or_default();
        let mut pending = VecDeque::new();

        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                let name = cte.alias.name.value.to_lowercase();
                if with.recursive {
                    visible.insert(name);
                } else {
                    pending.push_back(name);
                }
            }
        }

        self.scopes.push(Scope { visible, pending });
        ControlFlow::Continue(())
    }

    fn post_visit_query(&mut self, _query: &Query) -> ControlFlow<()> {
        self.scopes.pop();
        // CTE bodies are visited in order before the query body
        if let Some(parent) = self.scopes.last_mut() {
            if let Some(name) = parent.pending.pop_front() {
                parent.visible.insert(name);
            }
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_relation(&mut self, relation: &ObjectName) -> ControlFlow<()> {
        let name = unqualified_name(relation);
        let is_cte = self
            .scopes
            .last()
            .is_some_and(|scope| scope.visible.contains(&name));
        if !is_cte && !self.relations.contains(&name) {
            self.relations.push(name);
        }
        ControlFlow::Continue(())
    }
}

/// Last path segment of a relation name, unquoted and lowercased.
fn unqualified_name(relation: &ObjectName) -> String {
    let full = relation.to_string();
    full.rsplit('.')
        .next()
        .unwrap_or(&full)
        .trim_matches(|c| c == '"' || c == '`' || c == '[' || c == ']')
        .to_lowercase()
}

/// Relations read by `stmt`, in first-reference order, excluding CTEs.
pub fn referenced_relations(stmt: &Statement) -> Vec<String> {
    let mut collector = RelationCollector::default();
    let _ = stmt.visit(&mut collector);
    collector.relations
}

/// Read-only and catalog-reference checks for one store.
#[derive(Debug, Clone)]
pub struct SqlGuard {
    db_type: DatabaseType,
    allowed: HashSet<String>,
}

impl SqlGuard {
    pub fn new(db_type: DatabaseType, catalog: &SchemaCatalog) -> Self {
        Self {
            db_type,
            allowed: catalog
                .relation_names()
                .into_iter()
                .map(str::to_lowercase)
                .collect(),
        }
    }

    pub fn db_type(&self) -> DatabaseType {
        self.db_type
    }

    /// Validate `sql` for execution.
    pub fn check(&self, sql: &str) -> DbResult<()> {
        let stmt = validate_readonly(sql, self.db_type)?;

        let unknown: Vec<String> = referenced_relations(&stmt)
            .into_iter()
            .filter(|r| !self.allowed.contains(r))
            .collect();
        if !unknown.is_empty() {
            return Err(DbError::schema(
                format!(
                    "Unknown relation(s): {}. Only these relations exist: {}",
                    unknown.join(", "),
                    self.allowed_list()
                ),
                unknown.join(", "),
            ));
        }
        Ok(())
    }

    fn allowed_list(&self) -> String {
        let mut names: Vec<&str> = self.allowed.iter().map(String::as_str).collect();
        names.sort_unstable();
        names.join(", ")
    }
}
