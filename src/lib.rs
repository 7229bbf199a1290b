//! Meeting SQL Agent Library
//!
//! A Text-to-SQL retrieval agent that answers natural-language questions
//! about meetings, firms, contacts and employees by writing SQL against a
//! described schema, running it read-only (PostgreSQL or SQLite), and turning
//! the rows into an answer.

pub mod agent;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod models;

pub use agent::RetrievalAgent;
pub use catalog::SchemaCatalog;
pub use config::Config;
pub use error::DbError;
