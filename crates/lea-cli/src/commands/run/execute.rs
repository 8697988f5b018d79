//! Concurrent Write-Audit-Publish executor.
//!
//! Nodes run under a semaphore-bounded worker pool. Readiness is tracked
//! with a remaining-parent counter per node; all state transitions flow
//! through a single completion channel owned by the scheduler, so the
//! graph needs no locks. Publish happens only when every active node ends
//! in DONE or SKIPPED.

use anyhow::{Context, Result};
use lea_core::config::RunConfig;
use lea_core::dag::ScriptDag;
use lea_core::progress::{NodeStatus, ProgressEvent, ProgressSink};
use lea_core::table_ref::TableRef;
use lea_db::Warehouse;
use lea_sql::SqlParser;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;

use super::node::{run_node, DepHint, NodeOutcome, NodePlan};

/// Terminal record for one node.
#[derive(Debug, Clone)]
pub(crate) struct NodeResult {
    pub status: NodeStatus,
    pub duration: Duration,
    pub rows: Option<usize>,
    pub error: Option<String>,
}

/// Everything one run produced.
#[derive(Debug)]
pub(crate) struct RunOutcome {
    pub results: BTreeMap<TableRef, NodeResult>,
    pub promoted: Vec<TableRef>,
    pub promotion_error: Option<String>,
    pub cancelled: bool,
}

impl RunOutcome {
    /// True when every node ended DONE or SKIPPED and publish succeeded.
    pub fn success(&self) -> bool {
        !self.cancelled
            && self.promotion_error.is_none()
            && self
                .results
                .values()
                .all(|r| matches!(r.status, NodeStatus::Done | NodeStatus::Skipped))
    }

    pub fn count(&self, status: NodeStatus) -> usize {
        self.results.values().filter(|r| r.status == status).count()
    }
}

/// Execute the active set and publish on total success.
pub(crate) async fn execute_active_set(
    dag: &ScriptDag,
    active: &BTreeSet<TableRef>,
    config: &RunConfig,
    warehouse: Arc<dyn Warehouse>,
    sql_parser: Arc<SqlParser>,
    sink: Arc<dyn ProgressSink>,
    cancel: Arc<AtomicBool>,
) -> Result<RunOutcome> {
    warehouse
        .prepare()
        .await
        .context("Failed to prepare warehouse namespace")?;

    if config.restart {
        for id in active {
            if !dag.script(id).is_some_and(|s| s.is_test()) {
                warehouse
                    .drop_table(id, true)
                    .await
                    .with_context(|| format!("Failed to drop audit table for {id}"))?;
            }
        }
    }

    let order: Vec<TableRef> = dag
        .topological_order()?
        .into_iter()
        .filter(|id| active.contains(id))
        .collect();

    let mut scheduler = Scheduler::new(dag, active, &order, config, warehouse.clone(), sql_parser, sink, cancel);
    scheduler.run().await;
    let (results, cancelled) = (scheduler.results, scheduler.cancelled);

    // Publish: all-or-nothing gate, per-table atomic, topological order.
    let mut promoted = Vec::new();
    let mut promotion_error = None;
    let publishable = !cancelled
        && results
            .values()
            .all(|r| matches!(r.status, NodeStatus::Done | NodeStatus::Skipped));

    if publishable && !config.dry_run {
        for id in &order {
            if dag.script(id).is_some_and(|s| s.is_test()) {
                continue;
            }
            // Safety: every node in `order` received a result above
            let Some(result) = results.get(id) else {
                continue;
            };
            let promotable = match result.status {
                NodeStatus::Done => true,
                // A skipped node's audit table is a checkpoint from an
                // earlier failed run; it still has to reach production.
                NodeStatus::Skipped => warehouse.exists(id, true).await.unwrap_or(false),
                _ => false,
            };
            if !promotable {
                continue;
            }
            if let Err(e) = warehouse.promote(id).await {
                promotion_error = Some(format!("failed to promote {id}: {e}"));
                break;
            }
            promoted.push(id.clone());
        }
    }

    Ok(RunOutcome {
        results,
        promoted,
        promotion_error,
        cancelled,
    })
}

/// Completion message from a worker.
type Completion = (TableRef, NodeOutcome, Duration);

struct Scheduler<'a> {
    dag: &'a ScriptDag,
    active: &'a BTreeSet<TableRef>,
    order: &'a [TableRef],
    config: &'a RunConfig,
    warehouse: Arc<dyn Warehouse>,
    sql_parser: Arc<SqlParser>,
    sink: Arc<dyn ProgressSink>,
    cancel: Arc<AtomicBool>,

    semaphore: Arc<Semaphore>,
    /// Shared with workers: set on fail-fast or cancellation so queued
    /// workers stand down before touching the warehouse.
    halt: Arc<AtomicBool>,
    remaining: HashMap<TableRef, usize>,
    children: HashMap<TableRef, Vec<TableRef>>,
    ready: VecDeque<TableRef>,
    results: BTreeMap<TableRef, NodeResult>,
    /// Set when fail-fast tripped or the run was cancelled.
    stopped: bool,
    cancelled: bool,
}

impl<'a> Scheduler<'a> {
    #[allow(clippy::too_many_arguments)]
    fn new(
        dag: &'a ScriptDag,
        active: &'a BTreeSet<TableRef>,
        order: &'a [TableRef],
        config: &'a RunConfig,
        warehouse: Arc<dyn Warehouse>,
        sql_parser: Arc<SqlParser>,
        sink: Arc<dyn ProgressSink>,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        let mut remaining: HashMap<TableRef, usize> = HashMap::new();
        let mut children: HashMap<TableRef, Vec<TableRef>> = HashMap::new();
        for id in order {
            let active_parents: Vec<TableRef> = dag
                .dependencies(id)
                .into_iter()
                .filter(|p| active.contains(p))
                .collect();
            remaining.insert(id.clone(), active_parents.len());
            for parent in active_parents {
                children.entry(parent).or_default().push(id.clone());
            }
        }

        let ready: VecDeque<TableRef> = order
            .iter()
            .filter(|id| remaining.get(*id).copied().unwrap_or(0) == 0)
            .cloned()
            .collect();

        Self {
            dag,
            active,
            order,
            config,
            warehouse,
            sql_parser,
            sink,
            cancel,
            semaphore: Arc::new(Semaphore::new(config.concurrency.max(1))),
            halt: Arc::new(AtomicBool::new(false)),
            remaining,
            children,
            ready,
            results: BTreeMap::new(),
            stopped: false,
            cancelled: false,
        }
    }

    async fn run(&mut self) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Completion>();
        let mut workers = JoinSet::new();

        loop {
            self.drain_ready(&tx, &mut workers);
            if self.results.len() == self.order.len() {
                break;
            }

            // Safety: at least one worker is in flight whenever results are
            // incomplete and the ready queue is empty, so recv() terminates.
            match rx.recv().await {
                Some((id, outcome, duration)) => self.complete(id, outcome, duration),
                None => break,
            }
        }

        while workers.join_next().await.is_some() {}
    }

    /// Schedule every ready node, inline-completing the ones that must not
    /// run (poisoned ancestors, fail-fast, cancellation).
    fn drain_ready(&mut self, tx: &mpsc::UnboundedSender<Completion>, workers: &mut JoinSet<()>) {
        while let Some(id) = self.ready.pop_front() {
            if self.cancel.load(Ordering::SeqCst) {
                self.cancelled = true;
                self.stopped = true;
            }

            if self.stopped {
                self.halt.store(true, Ordering::SeqCst);
                self.finish_inline(&id, NodeStatus::SkippedUpstream, "run stopped");
                continue;
            }
            if self.has_poisoned_parent(&id) {
                self.finish_inline(&id, NodeStatus::SkippedUpstream, "upstream error");
                continue;
            }

            self.spawn_worker(id, tx, workers);
        }
    }

    fn has_poisoned_parent(&self, id: &TableRef) -> bool {
        self.dag
            .dependencies(id)
            .into_iter()
            .filter(|p| self.active.contains(p))
            .any(|p| {
                self.results.get(&p).is_some_and(|r| {
                    matches!(r.status, NodeStatus::Errored | NodeStatus::SkippedUpstream)
                })
            })
    }

    fn spawn_worker(
        &mut self,
        id: TableRef,
        tx: &mpsc::UnboundedSender<Completion>,
        workers: &mut JoinSet<()>,
    ) {
        // Safety: ready nodes always come from the DAG
        let Some(script) = self.dag.script(&id).cloned() else {
            self.finish_inline(&id, NodeStatus::Errored, "script missing from DAG");
            return;
        };

        let dep_hints: Vec<DepHint> = self
            .dag
            .dependencies(&id)
            .into_iter()
            .map(|dep| DepHint {
                done_this_run: self
                    .results
                    .get(&dep)
                    .is_some_and(|r| r.status == NodeStatus::Done),
                frozen: self.config.freeze_unselected && !self.active.contains(&dep),
                id: dep,
            })
            .collect();
        let active_parents: Vec<&DepHint> = dep_hints
            .iter()
            .filter(|h| self.active.contains(&h.id))
            .collect();
        let has_active_parents = !active_parents.is_empty();
        let all_active_parents_skipped = has_active_parents
            && active_parents.iter().all(|h| {
                self.results
                    .get(&h.id)
                    .is_some_and(|r| r.status == NodeStatus::Skipped)
            });

        let plan = NodePlan {
            script,
            dep_hints,
            has_active_parents,
            all_active_parents_skipped,
        };

        let warehouse = self.warehouse.clone();
        let sql_parser = self.sql_parser.clone();
        let sink = self.sink.clone();
        let semaphore = self.semaphore.clone();
        let cancel = self.cancel.clone();
        let halt = self.halt.clone();
        let env = self.config.env.clone();
        let restart = self.config.restart;
        let timeout = self.config.timeout;
        let tx = tx.clone();

        workers.spawn(async move {
            // Semaphore closed means shutdown; stand down.
            let Ok(_permit) = semaphore.acquire_owned().await else {
                let _ = tx.send((id, NodeOutcome::Stopped, Duration::ZERO));
                return;
            };
            if halt.load(Ordering::SeqCst) || cancel.load(Ordering::SeqCst) {
                let _ = tx.send((id, NodeOutcome::Stopped, Duration::ZERO));
                return;
            }

            sink.emit(ProgressEvent::started(id.clone()));
            let start = Instant::now();
            let outcome = run_node(warehouse, sql_parser, env, plan, restart, timeout).await;
            let duration = start.elapsed();

            let event = match &outcome {
                NodeOutcome::Done { rows } => {
                    ProgressEvent::terminal(id.clone(), NodeStatus::Done, duration)
                        .with_rows(*rows)
                }
                NodeOutcome::Skipped => {
                    ProgressEvent::terminal(id.clone(), NodeStatus::Skipped, duration)
                }
                NodeOutcome::Failed { error } => {
                    ProgressEvent::terminal(id.clone(), NodeStatus::Errored, duration)
                        .with_message(error.clone())
                }
                NodeOutcome::Stopped => {
                    ProgressEvent::terminal(id.clone(), NodeStatus::SkippedUpstream, duration)
                        .with_message("run stopped")
                }
            };
            sink.emit(event);

            let _ = tx.send((id, outcome, duration));
        });
    }

    /// Record a terminal result and release the node's children.
    fn complete(&mut self, id: TableRef, outcome: NodeOutcome, duration: Duration) {
        let result = match outcome {
            NodeOutcome::Done { rows } => NodeResult {
                status: NodeStatus::Done,
                duration,
                rows: Some(rows),
                error: None,
            },
            NodeOutcome::Skipped => NodeResult {
                status: NodeStatus::Skipped,
                duration,
                rows: None,
                error: None,
            },
            NodeOutcome::Failed { error } => NodeResult {
                status: NodeStatus::Errored,
                duration,
                rows: None,
                error: Some(error),
            },
            NodeOutcome::Stopped => NodeResult {
                status: NodeStatus::SkippedUpstream,
                duration,
                rows: None,
                error: Some("run stopped".to_string()),
            },
        };

        if result.status == NodeStatus::Errored && self.config.fail_fast {
            self.stopped = true;
            self.halt.store(true, Ordering::SeqCst);
        }

        self.release_children(&id);
        self.results.insert(id, result);
    }

    /// Inline completion for nodes that never reach a worker.
    fn finish_inline(&mut self, id: &TableRef, status: NodeStatus, reason: &str) {
        self.sink.emit(ProgressEvent::started(id.clone()));
        self.sink.emit(
            ProgressEvent::terminal(id.clone(), status, Duration::ZERO)
                .with_message(reason.to_string()),
        );
        self.release_children(id);
        self.results.insert(
            id.clone(),
            NodeResult {
                status,
                duration: Duration::ZERO,
                rows: None,
                error: Some(reason.to_string()),
            },
        );
    }

    fn release_children(&mut self, id: &TableRef) {
        for child in self.children.get(id).cloned().unwrap_or_default() {
            if let Some(count) = self.remaining.get_mut(&child) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    self.ready.push_back(child);
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "execute_test.rs"]
mod tests;
