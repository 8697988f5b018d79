//! Error types for lea-db

use thiserror::Error;

/// Warehouse operation errors
#[derive(Error, Debug)]
pub enum DbError {
    /// Connection error
    #[error("Warehouse connection error: {0}")]
    ConnectionError(String),

    /// Query execution error
    #[error("Query execution error: {0}")]
    ExecutionError(String),

    /// Table not found
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// SQL could not be rewritten for execution
    #[error("Reference rewriting failed: {0}")]
    Rewrite(#[from] lea_sql::SqlError),

    /// Not implemented
    #[error("Not implemented for {backend}: {feature}")]
    NotImplemented { backend: String, feature: String },

    /// Internal error
    #[error("Internal warehouse error: {0}")]
    Internal(String),
}

/// Result type alias for DbError
pub type DbResult<T> = Result<T, DbError>;

impl From<duckdb::Error> for DbError {
    fn from(err: duckdb::Error) -> Self {
        DbError::ExecutionError(err.to_string())
    }
}
