//! Warehouse capability trait.

use crate::error::DbResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lea_core::config::Env;
use lea_core::script::Script;
use lea_core::table_ref::TableRef;
use std::collections::HashMap;

/// How dependency references are rewritten during materialisation.
///
/// Maps the lowercase source dotted reference (exactly as scripts write it,
/// e.g. `staging.orders` or `staging.orders___audit`) to the rendered
/// warehouse identifier it should read from.
pub type DepsResolution = HashMap<String, String>;

/// Capability interface the executor is polymorphic over.
///
/// Implementations must be Send + Sync; the executor issues calls from
/// several workers at once, bounded only by its concurrency limit.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Warehouse kind identifier for logging.
    fn kind(&self) -> &'static str;

    /// Render the warehouse-syntax identifier for a table.
    ///
    /// The rendered form must round-trip through the dependency extractor;
    /// the audit form appends `___audit` to the table identifier. `env`
    /// selects dev or production rendering — frozen dependencies are
    /// rendered against production even in a dev run.
    fn render_table_ref(&self, id: &TableRef, audit: bool, env: &Env) -> String;

    /// Ensure the target namespace and checkpoint storage exist.
    async fn prepare(&self) -> DbResult<()>;

    /// Drop the target namespace, including checkpoints.
    async fn teardown(&self) -> DbResult<()>;

    /// Execute the script's SQL into its (audit) table, rewriting internal
    /// dependency references per `resolution`. Returns the row count of the
    /// materialised table.
    async fn materialize(
        &self,
        script: &Script,
        audit: bool,
        resolution: &DepsResolution,
    ) -> DbResult<usize>;

    /// Execute a SELECT whose references are already resolved, returning up
    /// to `limit` rows formatted for test reporting.
    async fn query_rows(&self, sql: &str, limit: usize) -> DbResult<Vec<String>>;

    /// Atomically replace the production table with its audit table and
    /// drop the audit form. Idempotent: promoting an already-promoted table
    /// succeeds.
    async fn promote(&self, id: &TableRef) -> DbResult<()>;

    /// Drop a table. Dropping the audit form also clears its checkpoint.
    async fn drop_table(&self, id: &TableRef, audit: bool) -> DbResult<()>;

    /// Whether the table physically exists in the run's environment.
    async fn exists(&self, id: &TableRef, audit: bool) -> DbResult<bool>;

    /// When the table's audit form was last successfully materialised.
    ///
    /// This is the skip-logic checkpoint; it survives promotion (which
    /// drops the audit table itself).
    async fn last_materialized(&self, id: &TableRef) -> DbResult<Option<DateTime<Utc>>>;
}
