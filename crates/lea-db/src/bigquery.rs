//! BigQuery warehouse stub.
//!
//! Reference rendering is complete (and covered by tests, since selector
//! matching and checkpoint recognition depend on it); execution requires a
//! Google Cloud client and is not yet implemented.

use crate::error::{DbError, DbResult};
use crate::traits::{DepsResolution, Warehouse};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lea_core::config::Env;
use lea_core::script::Script;
use lea_core::table_ref::{TableRef, AUDIT_SUFFIX};

/// BigQuery warehouse backend (rendering only).
pub struct BigQueryWarehouse {
    project: String,
    dataset: String,
    env: Env,
}

impl BigQueryWarehouse {
    pub fn new(project: impl Into<String>, dataset: impl Into<String>, env: Env) -> Self {
        Self {
            project: project.into(),
            dataset: dataset.into(),
            env,
        }
    }

    fn not_implemented(&self, feature: &str) -> DbError {
        DbError::NotImplemented {
            backend: "bigquery".to_string(),
            feature: feature.to_string(),
        }
    }
}

#[async_trait]
impl Warehouse for BigQueryWarehouse {
    fn kind(&self) -> &'static str {
        "bigquery"
    }

    /// `project.dataset[_user].schema__…__table[___audit]` — the whole
    /// schema chain folds into the table identifier; the dataset carries
    /// the dev suffix.
    fn render_table_ref(&self, id: &TableRef, audit: bool, env: &Env) -> String {
        let mut segments: Vec<&str> = id.schema().iter().map(String::as_str).collect();
        segments.push(id.name());
        let mut table = segments.join("__");
        if audit {
            table.push_str(AUDIT_SUFFIX);
        }
        let suffix = if env.is_prod() {
            String::new()
        } else {
            self.env.namespace_suffix()
        };
        format!("{}.{}{}.{}", self.project, self.dataset, suffix, table)
    }

    async fn prepare(&self) -> DbResult<()> {
        Err(self.not_implemented("prepare"))
    }

    async fn teardown(&self) -> DbResult<()> {
        Err(self.not_implemented("teardown"))
    }

    async fn materialize(
        &self,
        _script: &Script,
        _audit: bool,
        _resolution: &DepsResolution,
    ) -> DbResult<usize> {
        Err(self.not_implemented("materialize"))
    }

    async fn query_rows(&self, _sql: &str, _limit: usize) -> DbResult<Vec<String>> {
        Err(self.not_implemented("query_rows"))
    }

    async fn promote(&self, _id: &TableRef) -> DbResult<()> {
        Err(self.not_implemented("promote"))
    }

    async fn drop_table(&self, _id: &TableRef, _audit: bool) -> DbResult<()> {
        Err(self.not_implemented("drop_table"))
    }

    async fn exists(&self, _id: &TableRef, _audit: bool) -> DbResult<bool> {
        Err(self.not_implemented("exists"))
    }

    async fn last_materialized(&self, _id: &TableRef) -> DbResult<Option<DateTime<Utc>>> {
        Err(self.not_implemented("last_materialized"))
    }
}
