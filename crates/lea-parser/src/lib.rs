//! lea-parser - Script discovery for lea
//!
//! Walks a scripts directory, maps file paths to table references,
//! renders Jinja templates, extracts dependencies and inline assertion
//! annotations, and produces the immutable [`lea_core::Script`] records
//! the DAG is built from.

pub mod discover;
pub mod error;

pub use discover::{parse_scripts, script_table_ref};
pub use error::{ParserError, ParserResult};
