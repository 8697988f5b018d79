//! Single-node execution: skip checks, dependency resolution,
//! materialisation, and assertion/singular test queries.

use lea_core::config::Env;
use lea_core::script::Script;
use lea_core::table_ref::TableRef;
use lea_db::{DbResult, DepsResolution, Warehouse};
use lea_sql::SqlParser;
use std::sync::Arc;
use std::time::Duration;

/// How many violating rows an assertion failure reports.
const SAMPLE_ROWS: usize = 5;

/// Scheduling context for one dependency, captured from run state just
/// before the node starts.
#[derive(Debug, Clone)]
pub(super) struct DepHint {
    pub id: TableRef,
    /// The dependency materialised its audit table earlier in this run.
    pub done_this_run: bool,
    /// Unselected ancestor under --freeze-unselected: read production.
    pub frozen: bool,
}

/// Everything a worker needs to execute one node.
#[derive(Debug, Clone)]
pub(super) struct NodePlan {
    pub script: Script,
    pub dep_hints: Vec<DepHint>,
    /// The node has at least one dependency inside the active set.
    pub has_active_parents: bool,
    /// Every active dependency was skipped this run. Tests piggyback on
    /// this: unchanged audited data needs no re-audit.
    pub all_active_parents_skipped: bool,
}

/// Terminal result of one node execution.
#[derive(Debug, Clone)]
pub(super) enum NodeOutcome {
    Done { rows: usize },
    Skipped,
    Failed { error: String },
    /// The run halted (fail-fast or cancellation) before the node started.
    Stopped,
}

/// Execute one node, applying the optional per-node timeout.
pub(super) async fn run_node(
    warehouse: Arc<dyn Warehouse>,
    sql_parser: Arc<SqlParser>,
    env: Env,
    plan: NodePlan,
    restart: bool,
    timeout: Option<Duration>,
) -> NodeOutcome {
    let fut = run_node_inner(&warehouse, &sql_parser, &env, &plan, restart);
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(outcome) => outcome,
            Err(_) => NodeOutcome::Failed {
                error: format!("timeout after {}s", limit.as_secs()),
            },
        },
        None => fut.await,
    }
}

async fn run_node_inner(
    warehouse: &Arc<dyn Warehouse>,
    sql_parser: &Arc<SqlParser>,
    env: &Env,
    plan: &NodePlan,
    restart: bool,
) -> NodeOutcome {
    if plan.script.is_test() {
        return run_test(warehouse, sql_parser, env, plan).await;
    }

    // Skip law: a checkpoint exists, the source is older, and no --restart.
    if !restart {
        match warehouse.last_materialized(&plan.script.id).await {
            Ok(Some(checkpoint)) if plan.script.mtime <= checkpoint => {
                return NodeOutcome::Skipped;
            }
            Ok(_) => {}
            Err(e) => {
                return NodeOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    let resolution = match build_resolution(warehouse, env, &plan.dep_hints).await {
        Ok(resolution) => resolution,
        Err(e) => {
            return NodeOutcome::Failed {
                error: e.to_string(),
            }
        }
    };

    match warehouse.materialize(&plan.script, true, &resolution).await {
        Ok(rows) => NodeOutcome::Done { rows },
        Err(e) => NodeOutcome::Failed {
            error: e.to_string(),
        },
    }
}

/// Run a test node: zero returned rows is a pass.
async fn run_test(
    warehouse: &Arc<dyn Warehouse>,
    sql_parser: &Arc<SqlParser>,
    env: &Env,
    plan: &NodePlan,
) -> NodeOutcome {
    if plan.has_active_parents && plan.all_active_parents_skipped {
        return NodeOutcome::Skipped;
    }

    let resolution = match build_resolution(warehouse, env, &plan.dep_hints).await {
        Ok(resolution) => resolution,
        Err(e) => {
            return NodeOutcome::Failed {
                error: e.to_string(),
            }
        }
    };

    let sql = match lea_sql::rewrite_references(&plan.script.sql, sql_parser.dialect(), &resolution)
    {
        Ok(sql) => sql,
        Err(e) => {
            return NodeOutcome::Failed {
                error: e.to_string(),
            }
        }
    };

    match warehouse.query_rows(&sql, SAMPLE_ROWS).await {
        Ok(rows) if rows.is_empty() => NodeOutcome::Done { rows: 0 },
        Ok(rows) => NodeOutcome::Failed {
            error: format!(
                "assertion failed, sample violating rows: [{}]",
                rows.join(" | ")
            ),
        },
        Err(e) => NodeOutcome::Failed {
            error: e.to_string(),
        },
    }
}

/// Decide which rendered form each dependency reference reads from.
///
/// Audit when the dependency just materialised or left a live audit table
/// behind; production (no dev suffix) when frozen; the run environment's
/// production form otherwise. Explicit `___audit` references always read
/// the audit form.
async fn build_resolution(
    warehouse: &Arc<dyn Warehouse>,
    env: &Env,
    hints: &[DepHint],
) -> DbResult<DepsResolution> {
    let mut resolution = DepsResolution::new();
    for hint in hints {
        let target = if hint.frozen {
            warehouse.render_table_ref(&hint.id, false, &Env::Prod)
        } else if hint.done_this_run || warehouse.exists(&hint.id, true).await? {
            warehouse.render_table_ref(&hint.id, true, env)
        } else {
            warehouse.render_table_ref(&hint.id, false, env)
        };
        resolution.insert(hint.id.dotted().to_lowercase(), target);
        resolution.insert(
            hint.id.dotted_audit().to_lowercase(),
            warehouse.render_table_ref(&hint.id, true, env),
        );
    }
    Ok(resolution)
}
