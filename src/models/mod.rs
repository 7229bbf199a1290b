//! Data models for the meeting SQL agent.
//!
//! This module re-exports all model types used throughout the application.

pub mod connection;
pub mod query;
pub mod schema;

// Re-export commonly used types
pub use connection::{ConnectionConfig, DatabaseType};
pub use query::{
    AgentResponse, Answer, Attempt, CandidateQuery, DEFAULT_QUERY_TIMEOUT_SECS, DEFAULT_ROW_LIMIT,
    ExecutionFailure, ExecutionResult, FailureCategory, MAX_ROW_LIMIT, Outcome, Question,
    ResultSet,
};
pub use schema::{ColumnDescriptor, MatchStyle, RelationKind, SchemaDescriptor, SemanticType};
