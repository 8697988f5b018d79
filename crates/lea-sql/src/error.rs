//! Error types for lea-sql

use thiserror::Error;

/// SQL parsing and annotation errors
#[derive(Error, Debug)]
pub enum SqlError {
    /// SQL parse error
    #[error("SQL parse error: {message}")]
    ParseError { message: String },

    /// Empty SQL
    #[error("SQL is empty")]
    EmptySql,

    /// Unknown dialect name
    #[error("Unknown SQL dialect: {0}")]
    UnknownDialect(String),

    /// Malformed annotation comment
    #[error("Malformed {keyword} annotation at line {line}: {reason}")]
    MalformedAnnotation {
        keyword: String,
        line: usize,
        reason: String,
    },
}

/// Result type alias for SqlError
pub type SqlResult<T> = Result<T, SqlError>;
