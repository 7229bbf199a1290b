//! Error types for the meeting SQL agent.
//!
//! This module defines all error types using `thiserror`. Store errors are
//! classified into the executor's [`FailureCategory`] taxonomy so the retrieval
//! agent can reason about them uniformly; generation errors are mapped into
//! synthesis failures or degraded answers depending on where they occur.

use crate::models::FailureCategory;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
        suggestion: String,
    },

    #[error("Permission denied: {operation} - {reason}")]
    Permission { operation: String, reason: String },

    #[error("Schema error: {message} (object: {object})")]
    Schema { message: String, object: String },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u32,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a database error with optional SQL state.
    pub fn database(
        message: impl Into<String>,
        sql_state: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
            suggestion: suggestion.into(),
        }
    }

    /// Create a permission error.
    pub fn permission(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Permission {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create a schema error.
    pub fn schema(message: impl Into<String>, object: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
            object: object.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u32) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Database { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// Classify this error for the retrieval agent.
    ///
    /// PostgreSQL errors are classified by SQLSTATE; SQLite reports no codes
    /// for these conditions, so its messages are matched instead.
    pub fn failure_category(&self) -> FailureCategory {
        match self {
            Self::Timeout { .. } => FailureCategory::Timeout,
            Self::Permission { .. } => FailureCategory::Rejected,
            Self::Schema { .. } => FailureCategory::SchemaMismatch,
            Self::InvalidInput { .. } => FailureCategory::Syntax,
            Self::Database {
                message, sql_state, ..
            } => match sql_state.as_deref() {
                Some(code) => category_from_sql_state(code)
                    .unwrap_or_else(|| category_from_message(message)),
                None => category_from_message(message),
            },
            Self::Connection { .. } | Self::Internal { .. } => FailureCategory::Other,
        }
    }
}

/// Map a PostgreSQL SQLSTATE code to a failure category.
fn category_from_sql_state(code: &str) -> Option<FailureCategory> {
    match code {
        // syntax_error
        "42601" => Some(FailureCategory::Syntax),
        // undefined_table, undefined_column, undefined_function, ambiguous_column,
        // datatype_mismatch, undefined_object
        "42P01" | "42703" | "42883" | "42702" | "42804" | "42704" => {
            Some(FailureCategory::SchemaMismatch)
        }
        // query_canceled (statement_timeout)
        "57014" => Some(FailureCategory::Timeout),
        // read_only_sql_transaction, insufficient_privilege
        "25006" | "42501" => Some(FailureCategory::Rejected),
        _ => None,
    }
}

fn category_from_message(message: &str) -> FailureCategory {
    let lower = message.to_lowercase();
    if lower.contains("syntax error") || lower.contains("incomplete input") {
        FailureCategory::Syntax
    } else if lower.contains("no such table")
        || lower.contains("no such column")
        || lower.contains("no such function")
        || lower.contains("ambiguous column")
        || lower.contains("does not exist")
    {
        FailureCategory::SchemaMismatch
    } else if lower.contains("readonly") || lower.contains("read-only") {
        FailureCategory::Rejected
    } else if lower.contains("interrupted") || lower.contains("timeout") {
        FailureCategory::Timeout
    } else {
        FailureCategory::Other
    }
}

/// Convert sqlx errors to DbError.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::connection(
                msg.to_string(),
                "Check the connection string format and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                DbError::database(
                    db_err.message(),
                    code,
                    "Check the SQL syntax and referenced objects",
                )
            }
            sqlx::Error::RowNotFound => DbError::database(
                "No rows returned",
                None,
                "Verify the query conditions match existing data",
            ),
            sqlx::Error::PoolTimedOut => DbError::timeout("connection pool acquire", 30),
            sqlx::Error::PoolClosed => {
                DbError::connection("Connection pool is closed", "Reconnect to the database")
            }
            sqlx::Error::Io(io_err) => DbError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => DbError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => DbError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::TypeNotFound { type_name } => DbError::schema(
                format!("Type not found: {}", type_name),
                type_name.to_string(),
            ),
            sqlx::Error::ColumnNotFound(col) => {
                DbError::schema(format!("Column not found: {}", col), col.to_string())
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => DbError::internal(format!(
                "Column index {} out of bounds (len: {})",
                index, len
            )),
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => DbError::internal(format!("Decode error: {}", source)),
            sqlx::Error::WorkerCrashed => DbError::internal("Database worker crashed"),
            _ => DbError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Schema catalog misconfiguration. Fatal at startup.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Catalog has no tables")]
    Empty,

    #[error("Table #{index} has an empty name")]
    EmptyTableName { index: usize },

    #[error("Table '{table}' is missing a description")]
    MissingDescription { table: String },

    #[error("Table '{table}' has no columns")]
    NoColumns { table: String },

    #[error("Table '{table}' has a column with an empty name")]
    EmptyColumnName { table: String },

    #[error("Column '{column}' of table '{table}' is missing a description")]
    MissingColumnDescription { table: String, column: String },

    #[error("Duplicate table '{table}'")]
    DuplicateTable { table: String },

    #[error("Duplicate column '{column}' in table '{table}'")]
    DuplicateColumn { table: String, column: String },

    #[error("Failed to read catalog file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failure of a call to the language-generation service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("Generation timed out after {elapsed_secs}s")]
    Timeout { elapsed_secs: u64 },

    #[error("Generation service unreachable: {message}")]
    Http { message: String },

    #[error("Generation service returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Generation service returned malformed output: {message}")]
    Malformed { message: String },
}

impl GenerationError {
    /// Create a malformed output error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    /// Check if retrying the same call can help.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Http { .. } => true,
            // Rate limits and server-side failures
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::Malformed { .. } => false,
        }
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GenerationError::Timeout { elapsed_secs: 0 }
        } else if err.is_decode() {
            GenerationError::malformed(err.to_string())
        } else {
            GenerationError::Http {
                message: err.to_string(),
            }
        }
    }
}

/// The query synthesizer could not produce a coherent SQL candidate.
///
/// Terminal for the current request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SynthesisError {
    #[error("Language generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("Could not read a SQL query from the generated output: {message}")]
    Unparseable { message: String },

    #[error("The question cannot be answered from the available tables: {reason}")]
    NotPossible { reason: String },

    #[error("The generated query is empty")]
    EmptyQuery,

    #[error("The generator repeated a query that was already attempted")]
    Repeated { sql: String },
}

impl SynthesisError {
    /// Reason reported to the caller.
    ///
    /// Service responses and raw model output only go to the logs; the model's
    /// own explanation of why a question is out of scope is kept.
    pub fn user_reason(&self) -> String {
        match self {
            Self::Generation(_) => {
                "The language-generation service is unavailable. Please try again later."
                    .to_string()
            }
            Self::Unparseable { .. } | Self::EmptyQuery => {
                "A database query could not be produced for this question. Please rephrase it."
                    .to_string()
            }
            Self::NotPossible { .. } => self.to_string(),
            Self::Repeated { .. } => {
                "No further way to query the database for this question was found. Please rephrase it."
                    .to_string()
            }
        }
    }
}

/// Startup configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No database configured. Pass --database or set DB_USER, DB_PASSWORD and DB_NAME.")]
    MissingDatabase,

    #[error("Invalid database URL: {0}")]
    InvalidUrl(String),

    #[error("Unsupported database scheme '{0}'. Use postgres:// or sqlite:")]
    UnsupportedScheme(String),

    #[error("Invalid pool option: {0}")]
    InvalidPoolOption(String),

    #[error("Invalid agent setting: {0}")]
    InvalidSetting(String),

    #[error("No API key configured for the language-generation service (set OPENAI_API_KEY)")]
    MissingApiKey,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DbError::connection("Failed to connect", "Check credentials");
        assert!(err.to_string().contains("Connection failed"));
    }

    #[test]
    fn test_error_suggestion() {
        let err = DbError::database(
            "Syntax error",
            Some("42601".to_string()),
            "Check SQL syntax",
        );
        assert_eq!(err.suggestion(), Some("Check SQL syntax"));
    }

    #[test]
    fn test_postgres_sql_state_categories() {
        let syntax = DbError::database("syntax error at or near \"SELEC\"", Some("42601".into()), "");
        assert_eq!(syntax.failure_category(), FailureCategory::Syntax);

        let column = DbError::database(
            "column employees.full_name does not exist",
            Some("42703".into()),
            "",
        );
        assert_eq!(column.failure_category(), FailureCategory::SchemaMismatch);

        let table = DbError::database("relation \"meeting\" does not exist", Some("42P01".into()), "");
        assert_eq!(table.failure_category(), FailureCategory::SchemaMismatch);

        let canceled = DbError::database(
            "canceling statement due to statement timeout",
            Some("57014".into()),
            "",
        );
        assert_eq!(canceled.failure_category(), FailureCategory::Timeout);

        let read_only = DbError::database(
            "cannot execute INSERT in a read-only transaction",
            Some("25006".into()),
            "",
        );
        assert_eq!(read_only.failure_category(), FailureCategory::Rejected);
    }

    #[test]
    fn test_sqlite_message_categories() {
        let column = DbError::database("no such column: employees.full_name", Some("1".into()), "");
        assert_eq!(column.failure_category(), FailureCategory::SchemaMismatch);

        let table = DbError::database("no such table: meeting", None, "");
        assert_eq!(table.failure_category(), FailureCategory::SchemaMismatch);

        let syntax = DbError::database("near \"SELEC\": syntax error", Some("1".into()), "");
        assert_eq!(syntax.failure_category(), FailureCategory::Syntax);

        let other = DbError::database("disk I/O error", None, "");
        assert_eq!(other.failure_category(), FailureCategory::Other);
    }

    #[test]
    fn test_non_database_categories() {
        assert_eq!(
            DbError::timeout("query", 30).failure_category(),
            FailureCategory::Timeout
        );
        assert_eq!(
            DbError::permission("INSERT", "read-only").failure_category(),
            FailureCategory::Rejected
        );
        assert_eq!(
            DbError::schema("Column not found", "x").failure_category(),
            FailureCategory::SchemaMismatch
        );
        assert_eq!(
            DbError::connection("refused", "retry").failure_category(),
            FailureCategory::Other
        );
    }

    #[test]
    fn test_generation_error_retryable() {
        assert!(GenerationError::Timeout { elapsed_secs: 30 }.is_retryable());
        assert!(
            GenerationError::Api {
                status: 429,
                message: "rate limited".into()
            }
            .is_retryable()
        );
        assert!(
            GenerationError::Api {
                status: 503,
                message: "unavailable".into()
            }
            .is_retryable()
        );
        assert!(
            !GenerationError::Api {
                status: 401,
                message: "bad key".into()
            }
            .is_retryable()
        );
        assert!(!GenerationError::malformed("no choices").is_retryable());
    }

    #[test]
    fn test_synthesis_error_from_generation() {
        let err: SynthesisError = GenerationError::Timeout { elapsed_secs: 5 }.into();
        assert!(matches!(err, SynthesisError::Generation(_)));
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_synthesis_user_reason_hides_service_text() {
        let err: SynthesisError = GenerationError::Api {
            status: 401,
            message: "Incorrect API key provided: sk-live-abc123".into(),
        }
        .into();
        assert!(!err.user_reason().contains("sk-live"));
        assert!(!err.user_reason().contains("401"));

        let err = SynthesisError::Unparseable {
            message: "Sure! Here is some prose instead of SQL".into(),
        };
        assert!(!err.user_reason().contains("prose"));

        let err = SynthesisError::NotPossible {
            reason: "No weather data.".into(),
        };
        assert!(err.user_reason().contains("No weather data."));
    }
}
