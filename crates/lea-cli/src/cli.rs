//! CLI argument definitions using clap derive API

use clap::{Args, Parser, Subcommand, ValueEnum};

/// lea - a minimalist SQL transformation orchestrator
#[derive(Parser, Debug)]
#[command(name = "lea")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Path to the scripts directory
    #[arg(long, global = true, default_value = "scripts")]
    pub scripts: String,

    /// Warehouse backend (duckdb, motherduck, ducklake, bigquery)
    #[arg(short, long, global = true, default_value = "duckdb", env = "LEA_WAREHOUSE")]
    pub warehouse: String,

    /// DuckDB database path (or md:/ducklake: connection string)
    #[arg(long, global = true, default_value = "lea.duckdb", env = "LEA_DUCKDB_PATH")]
    pub db: String,

    /// BigQuery project id
    #[arg(long, global = true, env = "LEA_BQ_PROJECT_ID")]
    pub project: Option<String>,

    /// BigQuery dataset name
    #[arg(long, global = true, env = "LEA_BQ_DATASET_NAME")]
    pub dataset: Option<String>,

    /// Run against production instead of the per-user dev namespace
    #[arg(long, global = true)]
    pub production: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Materialise the selected scripts with Write-Audit-Publish
    Run(RunArgs),

    /// List scripts, their kinds and dependencies
    Ls(LsArgs),

    /// Drop the target namespace (dev by default)
    Teardown(TeardownArgs),
}

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Selector expressions (repeatable), e.g. +core.users+, staging/, git
    #[arg(short, long = "select")]
    pub select: Vec<String>,

    /// Selector expressions subtracted from the selection (repeatable)
    #[arg(long = "unselect")]
    pub unselect: Vec<String>,

    /// Drop existing audit tables and checkpoints before planning
    #[arg(long)]
    pub restart: bool,

    /// Stop at the first error instead of completing independent work
    #[arg(long)]
    pub fail_fast: bool,

    /// Read unselected ancestors from production instead of running them
    #[arg(long)]
    pub freeze_unselected: bool,

    /// Maximum number of concurrently-running scripts
    #[arg(long, default_value_t = lea_core::config::DEFAULT_CONCURRENCY)]
    pub threads: usize,

    /// Plan and report without touching the warehouse
    #[arg(long)]
    pub dry_run: bool,

    /// Per-script timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Base branch the `git` selector diffs against
    #[arg(long, default_value = "origin/main")]
    pub base_branch: String,

    /// Output format for progress events
    #[arg(long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Progress output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable terminal output
    Text,
    /// One JSON event per line
    Json,
    /// No progress output
    Quiet,
}

/// Arguments for the ls command
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Selector expressions to restrict the listing (repeatable)
    #[arg(short, long = "select")]
    pub select: Vec<String>,
}

/// Arguments for the teardown command
#[derive(Args, Debug)]
pub struct TeardownArgs {
    /// Required confirmation when tearing down production
    #[arg(long)]
    pub yes: bool,
}
