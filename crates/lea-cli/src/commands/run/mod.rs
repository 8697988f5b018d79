//! The run command: discover scripts, synthesise tests, resolve the
//! selection, execute with Write-Audit-Publish, and report.

mod execute;
mod node;

use anyhow::Result;
use lea_core::config::RunConfig;
use lea_core::progress::{NodeStatus, NullSink, ProgressSink};
use lea_core::selector::resolve_active_set;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::cli::{GlobalArgs, OutputFormat, RunArgs};
use crate::commands::common;
use crate::git;
use crate::progress::{JsonSink, TerminalSink};

use execute::RunOutcome;

pub async fn execute(args: &RunArgs, global: &GlobalArgs) -> Result<()> {
    let env = common::resolve_env(global)?;
    let dag = common::load_dag(global)?;

    let needs_git = args
        .select
        .iter()
        .chain(&args.unselect)
        .any(|e| e.trim().trim_matches('+') == "git");
    let git_changed = if needs_git {
        Some(git::changed_tables(Path::new(&global.scripts), &args.base_branch).await?)
    } else {
        None
    };

    let active = resolve_active_set(&dag, &args.select, &args.unselect, git_changed.as_ref())
        .map_err(common::fail_with)?;

    if active.is_empty() {
        println!("Nothing selected.");
        return Ok(());
    }

    if args.dry_run {
        println!("Would run {} scripts against {env}:", active.len());
        for id in dag
            .topological_order()
            .map_err(common::fail_with)?
            .iter()
            .filter(|id| active.contains(*id))
        {
            let kind = dag.script(id).map(|s| s.kind.to_string()).unwrap_or_default();
            println!("  {id} ({kind})");
        }
        return Ok(());
    }

    let warehouse = common::create_warehouse(global, env.clone())?;
    let sql_parser = Arc::new(common::create_sql_parser(global)?);

    let (sink, terminal): (Arc<dyn ProgressSink>, Option<Arc<TerminalSink>>) = match args.output {
        OutputFormat::Text => {
            let terminal = Arc::new(TerminalSink::new(active.len()));
            (terminal.clone(), Some(terminal))
        }
        OutputFormat::Json => (Arc::new(JsonSink), None),
        OutputFormat::Quiet => (Arc::new(NullSink), None),
    };

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nCancelling; in-flight scripts will finish...");
                cancel.store(true, Ordering::SeqCst);
            }
        });
    }

    let mut config = RunConfig::new(env, &global.scripts);
    config.concurrency = args.threads.max(1);
    config.restart = args.restart;
    config.fail_fast = args.fail_fast;
    config.freeze_unselected = args.freeze_unselected;
    config.select = args.select.clone();
    config.unselect = args.unselect.clone();
    config.timeout = args.timeout_secs.map(Duration::from_secs);

    let outcome = execute::execute_active_set(
        &dag,
        &active,
        &config,
        warehouse,
        sql_parser,
        sink,
        cancel,
    )
    .await?;

    if let Some(terminal) = terminal {
        terminal.finish();
    }
    print_summary(&outcome, args.output);

    if outcome.success() {
        Ok(())
    } else {
        Err(common::ExitCode(common::EXIT_NODE_ERRORS).into())
    }
}

fn print_summary(outcome: &RunOutcome, output: OutputFormat) {
    if output != OutputFormat::Text {
        return;
    }

    println!();
    println!(
        "done: {}  skipped: {}  errored: {}  skipped (upstream): {}  promoted: {}",
        outcome.count(NodeStatus::Done),
        outcome.count(NodeStatus::Skipped),
        outcome.count(NodeStatus::Errored),
        outcome.count(NodeStatus::SkippedUpstream),
        outcome.promoted.len(),
    );

    for (id, result) in &outcome.results {
        if result.status == NodeStatus::Errored {
            let error = result.error.as_deref().unwrap_or("unknown error");
            println!("  \u{2717} {id}: {error}");
        }
    }
    if let Some(error) = &outcome.promotion_error {
        println!("  \u{2717} publish: {error}");
    } else if !outcome.promoted.is_empty() {
        println!("published {} tables", outcome.promoted.len());
    } else if outcome
        .results
        .values()
        .any(|r| matches!(r.status, NodeStatus::Errored | NodeStatus::SkippedUpstream))
    {
        println!("publish suppressed; audit tables kept for inspection");
    }
}
