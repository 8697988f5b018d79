//! lea-sql - SQL parsing layer for lea
//!
//! This crate wraps sqlparser-rs with dialect support and provides table
//! dependency extraction, AST-based reference rewriting, and inline
//! annotation scanning.

pub mod annotations;
pub mod dialect;
pub mod error;
pub mod extractor;
pub mod parser;
pub mod rewrite;

pub use annotations::{scan_annotations, AnnotationKind, ColumnAnnotation};
pub use dialect::{BigQueryDialect, DuckDbDialect, SqlDialect};
pub use error::{SqlError, SqlResult};
pub use extractor::extract_dependencies;
pub use parser::SqlParser;
pub use rewrite::{rewrite_references, rewrite_statements};

use sqlparser::ast::{ObjectName, ObjectNamePart};

/// Render an `ObjectName` as a dotted string.
pub fn object_name_to_string(name: &ObjectName) -> String {
    name.0
        .iter()
        .map(|part| match part {
            ObjectNamePart::Identifier(ident) => ident.value.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(".")
}
