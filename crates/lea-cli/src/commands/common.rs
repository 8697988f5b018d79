//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use lea_core::config::{Env, WarehouseKind};
use lea_core::dag::ScriptDag;
use lea_core::error::CoreError;
use lea_core::script::Script;
use lea_db::{BigQueryWarehouse, DuckDbWarehouse, Warehouse};
use lea_sql::SqlParser;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::cli::GlobalArgs;

/// Exit code for one or more errored nodes.
pub const EXIT_NODE_ERRORS: i32 = 1;
/// Exit code for invalid configuration or selectors.
pub const EXIT_INVALID_CONFIG: i32 = 2;
/// Exit code for a dependency cycle.
pub const EXIT_CYCLE: i32 = 3;

/// Error type representing a non-zero process exit code.
///
/// Use `return Err(ExitCode(N).into())` instead of `std::process::exit(N)`
/// so that RAII destructors run and cleanup happens properly.
#[derive(Debug)]
pub struct ExitCode(pub i32);

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Empty display — main.rs handles the exit code without printing
        write!(f, "")
    }
}

impl std::error::Error for ExitCode {}

/// The exit code a core error maps to.
pub fn exit_code_for(error: &CoreError) -> i32 {
    match error {
        CoreError::CircularDependency { .. } => EXIT_CYCLE,
        CoreError::ConfigInvalid { .. }
        | CoreError::InvalidSelector { .. }
        | CoreError::ScriptNotFound { .. }
        | CoreError::InvalidTableRef { .. } => EXIT_INVALID_CONFIG,
        _ => EXIT_NODE_ERRORS,
    }
}

/// Print a core error and convert it to its structured exit code.
pub fn fail_with(error: CoreError) -> anyhow::Error {
    eprintln!("Error: {error}");
    ExitCode(exit_code_for(&error)).into()
}

/// Resolve the run environment from global flags.
pub fn resolve_env(global: &GlobalArgs) -> Result<Env> {
    if global.production {
        Ok(Env::Prod)
    } else {
        Env::dev_from_env().map_err(fail_with)
    }
}

/// Create a warehouse from global flags.
pub fn create_warehouse(global: &GlobalArgs, env: Env) -> Result<Arc<dyn Warehouse>> {
    let kind = WarehouseKind::parse(&global.warehouse).map_err(fail_with)?;
    let warehouse: Arc<dyn Warehouse> = match kind {
        WarehouseKind::DuckDb | WarehouseKind::MotherDuck | WarehouseKind::DuckLake => Arc::new(
            DuckDbWarehouse::connect(&global.db, env)
                .context("Failed to open DuckDB database")?,
        ),
        WarehouseKind::BigQuery => {
            let project = global.project.clone().ok_or_else(|| {
                fail_with(CoreError::ConfigInvalid {
                    message: "bigquery requires --project (LEA_BQ_PROJECT_ID)".to_string(),
                })
            })?;
            let dataset = global.dataset.clone().ok_or_else(|| {
                fail_with(CoreError::ConfigInvalid {
                    message: "bigquery requires --dataset (LEA_BQ_DATASET_NAME)".to_string(),
                })
            })?;
            Arc::new(BigQueryWarehouse::new(project, dataset, env))
        }
    };
    Ok(warehouse)
}

/// The SQL parser matching the configured warehouse dialect.
pub fn create_sql_parser(global: &GlobalArgs) -> Result<SqlParser> {
    SqlParser::from_dialect_name(&global.warehouse).map_err(|e| {
        fail_with(CoreError::ConfigInvalid {
            message: e.to_string(),
        })
    })
}

/// Discover scripts, synthesise assertion tests and build the DAG.
pub fn load_dag(global: &GlobalArgs) -> Result<ScriptDag> {
    let sql_parser = create_sql_parser(global)?;
    let root = Path::new(&global.scripts);

    let mut scripts = lea_parser::parse_scripts(root, &sql_parser).map_err(|e| {
        eprintln!("Error: {e}");
        ExitCode(EXIT_INVALID_CONFIG)
    })?;

    let tests: Vec<Script> = scripts
        .iter()
        .flat_map(lea_test::synthesize_assertion_tests)
        .collect();
    scripts.extend(tests);

    ScriptDag::build(scripts).map_err(fail_with)
}

/// Calculate column widths for a table given headers and row data.
pub fn calculate_column_widths(headers: &[&str], rows: &[Vec<String>]) -> Vec<usize> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }
    widths
}

/// Print a formatted table to stdout.
pub fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let widths = calculate_column_widths(headers, rows);

    let header_parts: Vec<String> = headers
        .iter()
        .zip(&widths)
        .map(|(h, &w)| format!("{:<width$}", h, width = w))
        .collect();
    println!("{}", header_parts.join("  "));

    let sep_parts: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    println!("{}", sep_parts.join("  "));

    for row in rows {
        let row_parts: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| format!("{:<width$}", cell, width = w))
            .collect();
        println!("{}", row_parts.join("  "));
    }
}
