//! Error types for lea-core

use thiserror::Error;

/// Core error type for lea
#[derive(Error, Debug)]
pub enum CoreError {
    /// Invalid configuration value
    #[error("Invalid configuration: {message}")]
    ConfigInvalid { message: String },

    /// Two scripts map to the same table reference
    #[error("Duplicate script for table {id} (second definition at {path})")]
    DuplicateScript { id: String, path: String },

    /// A selector or dependency names a table no script produces
    #[error("Unknown table reference: {name}")]
    ScriptNotFound { name: String },

    /// Circular dependency detected
    #[error("Circular dependency detected: {cycle}")]
    CircularDependency { cycle: String },

    /// Malformed selector expression
    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    /// Malformed table reference
    #[error("Invalid table reference '{reference}': {reason}")]
    InvalidTableRef { reference: String, reason: String },
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;
