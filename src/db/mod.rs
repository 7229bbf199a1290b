//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Connection pool management
//! - SQL guard checks on generated queries
//! - Read-only query execution
//! - Type mappings

pub mod executor;
pub mod guard;
pub mod pool;
pub mod types;

pub use executor::QueryExecutor;
pub use guard::SqlGuard;
pub use pool::DbPool;
