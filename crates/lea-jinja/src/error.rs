//! Error types for lea-jinja

use thiserror::Error;

/// Jinja rendering errors
#[derive(Error, Debug)]
pub enum JinjaError {
    /// Template rendering failed
    #[error("Template rendering failed: {0}")]
    Render(#[from] minijinja::Error),
}

/// Result type alias for JinjaError
pub type JinjaResult<T> = Result<T, JinjaError>;
