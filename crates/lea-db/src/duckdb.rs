//! DuckDB warehouse implementation.
//!
//! Also serves MotherDuck (`md:` connection strings) and DuckLake targets,
//! which speak the same SQL surface through the DuckDB client.
//!
//! Dev runs open a per-user database file (`lea.db` → `lea_max.db`) and
//! attach the production file read-only under the `prod` catalog so frozen
//! dependencies can be read. Audit checkpoints live in
//! `lea_meta.materializations` and survive promotion.

use crate::error::{DbError, DbResult};
use crate::traits::{DepsResolution, Warehouse};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use duckdb::Connection;
use lea_core::config::Env;
use lea_core::script::Script;
use lea_core::sql_quote::{escape_sql_string, quote_ident, quote_qualified};
use lea_core::table_ref::{TableRef, AUDIT_SUFFIX};
use lea_sql::dialect::DuckDbDialect;
use std::path::Path;
use std::sync::Mutex;

/// Catalog alias the production database is attached under in dev runs.
const PROD_CATALOG: &str = "prod";

/// Schema holding lea's own bookkeeping tables.
const META_SCHEMA: &str = "lea_meta";

/// DuckDB warehouse backend
pub struct DuckDbWarehouse {
    conn: Mutex<Connection>,
    env: Env,
    /// Production database path as configured (no user suffix).
    prod_path: String,
    dialect: DuckDbDialect,
}

/// Database path for an environment: dev appends `_<user>` to the file
/// stem (`lea.db` → `lea_max.db`) or to the database name of a `md:` /
/// `ducklake:` connection string.
pub fn database_path_for_env(path: &str, env: &Env) -> String {
    let suffix = env.namespace_suffix();
    if suffix.is_empty() || path == ":memory:" {
        return path.to_string();
    }

    if let Some((scheme, name)) = path.split_once(':') {
        if scheme == "md" || scheme == "ducklake" {
            return format!("{scheme}:{name}{suffix}");
        }
    }

    match path.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}{suffix}.{ext}"),
        _ => format!("{path}{suffix}"),
    }
}

impl DuckDbWarehouse {
    /// Open the warehouse for `env`. `path` is the production database
    /// path; dev runs derive their own file from it.
    pub fn connect(path: &str, env: Env) -> DbResult<Self> {
        let effective = database_path_for_env(path, &env);
        let conn = if effective == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(Path::new(&effective))
        }
        .map_err(|e| DbError::ConnectionError(e.to_string()))?;

        Ok(Self {
            conn: Mutex::new(conn),
            env,
            prod_path: path.to_string(),
            dialect: DuckDbDialect::new(),
        })
    }

    /// In-memory warehouse. Dev and prod collapse onto the same database;
    /// useful for tests.
    pub fn in_memory(env: Env) -> DbResult<Self> {
        Self::connect(":memory:", env)
    }

    /// Acquire the connection lock, recovering from a poisoned state.
    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|p| {
            log::warn!("duckdb connection mutex poisoned, recovering");
            p.into_inner()
        })
    }

    fn execute_batch_sync(&self, sql: &str) -> DbResult<()> {
        let conn = self.lock();
        conn.execute_batch(sql)
            .map_err(|e| DbError::ExecutionError(e.to_string()))
    }

    fn query_count_sync(&self, sql: &str) -> DbResult<usize> {
        let conn = self.lock();
        let count: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM ({sql})"), [], |row| {
                row.get(0)
            })
            .map_err(|e| DbError::ExecutionError(e.to_string()))?;
        Ok(count as usize)
    }

    fn exists_sync(&self, id: &TableRef, audit: bool) -> DbResult<bool> {
        let conn = self.lock();
        let mut name = id.folded_name();
        if audit {
            name.push_str(AUDIT_SUFFIX);
        }
        let sql = format!(
            "SELECT COUNT(*) FROM information_schema.tables \
             WHERE table_schema = '{}' AND table_name = '{}'",
            escape_sql_string(id.top_schema()),
            escape_sql_string(&name)
        );
        let count: i64 = conn
            .query_row(&sql, [], |row| row.get(0))
            .map_err(|e| DbError::ExecutionError(e.to_string()))?;
        Ok(count > 0)
    }

    /// Record the audit checkpoint for a table.
    fn upsert_checkpoint_sync(&self, id: &TableRef) -> DbResult<()> {
        let sql = format!(
            "INSERT OR REPLACE INTO {META_SCHEMA}.materializations VALUES ('{}', '{}')",
            escape_sql_string(&id.dotted()),
            Utc::now().to_rfc3339()
        );
        self.execute_batch_sync(&sql)
    }

    fn materialize_sync(
        &self,
        script: &Script,
        audit: bool,
        resolution: &DepsResolution,
    ) -> DbResult<usize> {
        let statements = lea_sql::rewrite_statements(&script.sql, &self.dialect, resolution)?;
        let Some((last, setup)) = statements.split_last() else {
            return Err(DbError::ExecutionError(format!(
                "{} contains no statements",
                script.id
            )));
        };

        let target = self.render_table_ref(&script.id, audit, &self.env);
        let quoted_target = quote_qualified(&target);

        self.execute_batch_sync(&format!(
            "CREATE SCHEMA IF NOT EXISTS {}",
            quote_ident(script.id.top_schema())
        ))?;

        // Procedural statements (SET, DECLARE, temp macros) run first in
        // the same session; the final statement is the materialised SELECT.
        for stmt in setup {
            self.execute_batch_sync(&stmt.to_string())?;
        }
        let select = last.to_string();

        let merged = if let Some(key) = script.incremental_key.as_deref() {
            self.merge_incremental_sync(script, audit, &quoted_target, key, &select)?
        } else {
            false
        };
        if !merged {
            self.execute_batch_sync(&format!(
                "CREATE OR REPLACE TABLE {quoted_target} AS {select}"
            ))?;
        }

        if audit {
            self.upsert_checkpoint_sync(&script.id)?;
        }

        self.query_count_sync(&format!("SELECT * FROM {quoted_target}"))
    }

    /// Incremental merge: copy the production table, delete the rows whose
    /// key appears in the new output, insert the new rows. Pre-existing
    /// rows with other keys are preserved.
    ///
    /// Returns false when there is no production table yet, in which case
    /// the caller falls back to a plain CTAS.
    fn merge_incremental_sync(
        &self,
        script: &Script,
        audit: bool,
        quoted_target: &str,
        key: &str,
        select: &str,
    ) -> DbResult<bool> {
        if !audit || !self.exists_sync(&script.id, false)? {
            return Ok(false);
        }

        let prod = quote_qualified(&self.render_table_ref(&script.id, false, &self.env));
        let qk = quote_ident(key);
        self.execute_batch_sync(&format!(
            "CREATE OR REPLACE TABLE {quoted_target} AS SELECT * FROM {prod}"
        ))?;
        self.execute_batch_sync(&format!(
            "DELETE FROM {quoted_target} WHERE {qk} IN (SELECT {qk} FROM ({select}))"
        ))?;
        self.execute_batch_sync(&format!(
            "INSERT INTO {quoted_target} SELECT * FROM ({select})"
        ))?;
        Ok(true)
    }

    fn query_rows_sync(&self, sql: &str, limit: usize) -> DbResult<Vec<String>> {
        let conn = self.lock();
        let wrapped = format!("SELECT * FROM ({sql}) LIMIT {limit}");
        let mut stmt = conn
            .prepare(&wrapped)
            .map_err(|e| DbError::ExecutionError(e.to_string()))?;
        let mut rows = stmt
            .query([])
            .map_err(|e| DbError::ExecutionError(e.to_string()))?;

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| DbError::ExecutionError(e.to_string()))?
        {
            let columns = row.as_ref().column_count();
            let formatted: Vec<String> = (0..columns)
                .map(|i| get_column_as_string(row, i))
                .collect();
            out.push(formatted.join(", "));
        }
        Ok(out)
    }

    fn promote_sync(&self, id: &TableRef) -> DbResult<()> {
        if !self.exists_sync(id, true)? {
            // Rename-if-exists: already promoted (or never materialised,
            // which the executor rules out before calling).
            return Ok(());
        }

        let schema = quote_ident(id.top_schema());
        let audit_name = format!("{}{}", id.folded_name(), AUDIT_SUFFIX);
        let sql = format!(
            "BEGIN;\n\
             DROP TABLE IF EXISTS {schema}.{prod};\n\
             ALTER TABLE {schema}.{audit} RENAME TO {prod};\n\
             COMMIT;",
            prod = quote_ident(&id.folded_name()),
            audit = quote_ident(&audit_name),
        );
        self.execute_batch_sync(&sql)
    }

    fn drop_sync(&self, id: &TableRef, audit: bool) -> DbResult<()> {
        let target = quote_qualified(&self.render_table_ref(id, audit, &self.env));
        self.execute_batch_sync(&format!("DROP TABLE IF EXISTS {target}"))?;
        if audit {
            self.execute_batch_sync(&format!(
                "DELETE FROM {META_SCHEMA}.materializations WHERE table_ref = '{}'",
                escape_sql_string(&id.dotted())
            ))?;
        }
        Ok(())
    }

    fn prepare_sync(&self) -> DbResult<()> {
        self.execute_batch_sync(&format!(
            "CREATE SCHEMA IF NOT EXISTS {META_SCHEMA};\n\
             CREATE TABLE IF NOT EXISTS {META_SCHEMA}.materializations (\n\
                 table_ref VARCHAR PRIMARY KEY,\n\
                 materialized_at VARCHAR NOT NULL\n\
             );"
        ))?;

        // Frozen dependencies read production; attach it read-only when the
        // dev file is separate and the production file exists.
        if !self.env.is_prod()
            && self.prod_path != ":memory:"
            && !self.prod_path.contains(':')
            && Path::new(&self.prod_path).exists()
        {
            self.execute_batch_sync(&format!(
                "ATTACH IF NOT EXISTS '{}' AS {PROD_CATALOG} (READ_ONLY)",
                escape_sql_string(&self.prod_path)
            ))?;
        }
        Ok(())
    }

    fn teardown_sync(&self) -> DbResult<()> {
        let schemas: Vec<String> = {
            let conn = self.lock();
            let mut stmt = conn
                .prepare(
                    "SELECT schema_name FROM information_schema.schemata \
                     WHERE catalog_name = current_database() \
                       AND schema_name NOT IN ('information_schema', 'main', 'pg_catalog')",
                )
                .map_err(|e| DbError::ExecutionError(e.to_string()))?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(|e| DbError::ExecutionError(e.to_string()))?;
            rows.filter_map(Result::ok).collect()
        };

        for schema in schemas {
            self.execute_batch_sync(&format!(
                "DROP SCHEMA IF EXISTS {} CASCADE",
                quote_ident(&schema)
            ))?;
        }
        Ok(())
    }

    fn last_materialized_sync(&self, id: &TableRef) -> DbResult<Option<DateTime<Utc>>> {
        let conn = self.lock();
        let sql = format!(
            "SELECT materialized_at FROM {META_SCHEMA}.materializations WHERE table_ref = '{}'",
            escape_sql_string(&id.dotted())
        );
        let result: Result<String, duckdb::Error> = conn.query_row(&sql, [], |row| row.get(0));
        match result {
            Ok(ts) => Ok(DateTime::parse_from_rfc3339(&ts)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DbError::ExecutionError(e.to_string())),
        }
    }
}

/// Read a column value as a String, trying multiple DuckDB types.
fn get_column_as_string(row: &duckdb::Row<'_>, idx: usize) -> String {
    if let Ok(Some(s)) = row.get::<_, Option<String>>(idx) {
        return s;
    }
    if let Ok(Some(n)) = row.get::<_, Option<i64>>(idx) {
        return n.to_string();
    }
    if let Ok(Some(f)) = row.get::<_, Option<f64>>(idx) {
        return f.to_string();
    }
    if let Ok(Some(b)) = row.get::<_, Option<bool>>(idx) {
        return b.to_string();
    }
    "null".to_string()
}

#[async_trait]
impl Warehouse for DuckDbWarehouse {
    fn kind(&self) -> &'static str {
        "duckdb"
    }

    fn render_table_ref(&self, id: &TableRef, audit: bool, env: &Env) -> String {
        let mut name = id.folded_name();
        if audit {
            name.push_str(AUDIT_SUFFIX);
        }
        // A prod reference during a dev run reads through the attached
        // production catalog; everything else stays in the open database.
        if env.is_prod() && !self.env.is_prod() {
            format!("{PROD_CATALOG}.{}.{}", id.top_schema(), name)
        } else {
            format!("{}.{}", id.top_schema(), name)
        }
    }

    async fn prepare(&self) -> DbResult<()> {
        self.prepare_sync()
    }

    async fn teardown(&self) -> DbResult<()> {
        self.teardown_sync()
    }

    async fn materialize(
        &self,
        script: &Script,
        audit: bool,
        resolution: &DepsResolution,
    ) -> DbResult<usize> {
        self.materialize_sync(script, audit, resolution)
    }

    async fn query_rows(&self, sql: &str, limit: usize) -> DbResult<Vec<String>> {
        self.query_rows_sync(sql, limit)
    }

    async fn promote(&self, id: &TableRef) -> DbResult<()> {
        self.promote_sync(id)
    }

    async fn drop_table(&self, id: &TableRef, audit: bool) -> DbResult<()> {
        self.drop_sync(id, audit)
    }

    async fn exists(&self, id: &TableRef, audit: bool) -> DbResult<bool> {
        self.exists_sync(id, audit)
    }

    async fn last_materialized(&self, id: &TableRef) -> DbResult<Option<DateTime<Utc>>> {
        self.last_materialized_sync(id)
    }
}

#[cfg(test)]
#[path = "duckdb_test.rs"]
mod tests;
