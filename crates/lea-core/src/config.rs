//! Typed run configuration.

use crate::error::{CoreError, CoreResult};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Default concurrency bound for the executor.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Environment variable carrying the dev username.
pub const USERNAME_VAR: &str = "LEA_USERNAME";

/// Target environment for a run.
///
/// Dev runs write into a per-user namespace: the username is appended to the
/// top-level dataset (BigQuery) or the database file (DuckDB). Prod runs
/// write the bare names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "env")]
pub enum Env {
    Dev { user: String },
    Prod,
}

impl Env {
    /// Dev environment with the username from `LEA_USERNAME` (fallback `USER`).
    pub fn dev_from_env() -> CoreResult<Self> {
        let user = std::env::var(USERNAME_VAR)
            .or_else(|_| std::env::var("USER"))
            .map_err(|_| CoreError::ConfigInvalid {
                message: format!("{USERNAME_VAR} is not set and USER is unavailable"),
            })?;
        if user.is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: format!("{USERNAME_VAR} is empty"),
            });
        }
        Ok(Env::Dev { user })
    }

    pub fn is_prod(&self) -> bool {
        matches!(self, Env::Prod)
    }

    /// Suffix appended to the top-level namespace in dev, empty in prod.
    pub fn namespace_suffix(&self) -> String {
        match self {
            Env::Dev { user } => format!("_{user}"),
            Env::Prod => String::new(),
        }
    }
}

impl fmt::Display for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Env::Dev { user } => write!(f, "dev ({user})"),
            Env::Prod => write!(f, "prod"),
        }
    }
}

/// Supported warehouse backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WarehouseKind {
    DuckDb,
    MotherDuck,
    DuckLake,
    BigQuery,
}

impl WarehouseKind {
    pub fn parse(name: &str) -> CoreResult<Self> {
        match name.to_lowercase().as_str() {
            "duckdb" => Ok(WarehouseKind::DuckDb),
            "motherduck" => Ok(WarehouseKind::MotherDuck),
            "ducklake" => Ok(WarehouseKind::DuckLake),
            "bigquery" => Ok(WarehouseKind::BigQuery),
            other => Err(CoreError::ConfigInvalid {
                message: format!("unknown warehouse '{other}'"),
            }),
        }
    }
}

impl fmt::Display for WarehouseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarehouseKind::DuckDb => write!(f, "duckdb"),
            WarehouseKind::MotherDuck => write!(f, "motherduck"),
            WarehouseKind::DuckLake => write!(f, "ducklake"),
            WarehouseKind::BigQuery => write!(f, "bigquery"),
        }
    }
}

/// Everything one run needs to know, resolved before any execution.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Target environment.
    pub env: Env,

    /// Maximum number of concurrently-running nodes.
    pub concurrency: usize,

    /// Drop existing audit tables and checkpoints before planning.
    pub restart: bool,

    /// Stop scheduling on the first error instead of poisoning descendants.
    pub fail_fast: bool,

    /// Render unselected ancestors against production.
    pub freeze_unselected: bool,

    /// Plan and report without touching the warehouse.
    pub dry_run: bool,

    /// Selector expressions, unioned. Empty selects everything.
    pub select: Vec<String>,

    /// Selector expressions subtracted from the selection.
    pub unselect: Vec<String>,

    /// Root directory of the SQL scripts.
    pub scripts_root: PathBuf,

    /// Optional per-node timeout.
    pub timeout: Option<Duration>,
}

impl RunConfig {
    /// A config with defaults suitable for tests and simple callers.
    pub fn new(env: Env, scripts_root: impl Into<PathBuf>) -> Self {
        Self {
            env,
            concurrency: DEFAULT_CONCURRENCY,
            restart: false,
            fail_fast: false,
            freeze_unselected: false,
            dry_run: false,
            select: Vec::new(),
            unselect: Vec::new(),
            scripts_root: scripts_root.into(),
            timeout: None,
        }
    }
}
