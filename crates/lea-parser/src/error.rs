//! Error types for lea-parser

use std::path::PathBuf;
use thiserror::Error;

/// Script discovery and parsing errors
#[derive(Error, Debug)]
pub enum ParserError {
    /// Scripts directory missing
    #[error("Scripts directory not found: {path}")]
    RootNotFound { path: PathBuf },

    /// A script file sits directly under the root instead of a schema dir
    #[error("Script {path} is not inside a schema directory")]
    ScriptOutsideSchema { path: PathBuf },

    /// Two script files map to the same table
    #[error("Duplicate script for table {id}: {first} and {second}")]
    DuplicateScript {
        id: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// SQL in a script failed to parse or carries a malformed annotation
    #[error("Failed to parse {path}: {source}")]
    Script {
        path: PathBuf,
        #[source]
        source: lea_sql::SqlError,
    },

    /// Jinja rendering failed
    #[error("Failed to render {path}: {source}")]
    Template {
        path: PathBuf,
        #[source]
        source: lea_jinja::JinjaError,
    },

    /// Core error (invalid table reference derived from a path)
    #[error(transparent)]
    Core(#[from] lea_core::CoreError),

    /// IO error
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for ParserError
pub type ParserResult<T> = Result<T, ParserError>;
