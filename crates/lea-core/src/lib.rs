//! lea-core - Core library for lea
//!
//! This crate provides the shared data model: fully-qualified table
//! references, parsed scripts with their assertions, the dependency DAG,
//! selector resolution, and the typed run configuration used across all
//! lea components.

pub mod config;
pub mod dag;
pub mod error;
pub mod progress;
pub mod script;
pub mod selector;
pub mod sql_quote;
pub mod table_ref;

pub use config::{Env, RunConfig, WarehouseKind};
pub use dag::ScriptDag;
pub use error::{CoreError, CoreResult};
pub use progress::{NodeStatus, ProgressEvent, ProgressSink};
pub use script::{Assertion, Script, ScriptKind};
pub use table_ref::TableRef;
