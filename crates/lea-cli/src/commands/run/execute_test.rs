use super::*;
use chrono::Utc;
use lea_core::config::Env;
use lea_core::progress::NullSink;
use lea_core::script::{Assertion, Script, ScriptKind};
use lea_db::DuckDbWarehouse;
use std::path::PathBuf;

fn table(dotted: &str) -> TableRef {
    TableRef::parse(dotted).unwrap().0
}

fn script(dotted: &str, sql: &str, deps: &[&str]) -> Script {
    Script {
        id: table(dotted),
        kind: ScriptKind::Regular,
        path: PathBuf::from(format!("{}.sql", dotted.replace('.', "/"))),
        sql: sql.to_string(),
        dependencies: deps.iter().map(|d| table(d)).collect(),
        external_dependencies: Default::default(),
        assertions: Vec::new(),
        mtime: Utc::now(),
        incremental_key: None,
        clustering_fields: Vec::new(),
    }
}

fn build_dag(mut scripts: Vec<Script>) -> ScriptDag {
    let tests: Vec<Script> = scripts
        .iter()
        .flat_map(lea_test::synthesize_assertion_tests)
        .collect();
    scripts.extend(tests);
    ScriptDag::build(scripts).unwrap()
}

fn all_active(dag: &ScriptDag) -> BTreeSet<TableRef> {
    dag.nodes().cloned().collect()
}

async fn run(
    dag: &ScriptDag,
    active: &BTreeSet<TableRef>,
    config: &RunConfig,
    warehouse: Arc<dyn Warehouse>,
) -> RunOutcome {
    execute_active_set(
        dag,
        active,
        config,
        warehouse,
        Arc::new(SqlParser::duckdb()),
        Arc::new(NullSink),
        Arc::new(AtomicBool::new(false)),
    )
    .await
    .unwrap()
}

fn jaffle() -> Vec<Script> {
    vec![
        script("staging.customers", "SELECT 1 AS id, 'ada' AS name", &[]),
        script("staging.orders", "SELECT 1 AS id, 1 AS customer_id", &[]),
        script("staging.payments", "SELECT 1 AS order_id, 10 AS amount", &[]),
        script(
            "core.customers",
            "SELECT c.id, c.name FROM staging.customers c \
             JOIN staging.orders o ON c.id = o.customer_id",
            &["staging.customers", "staging.orders"],
        ),
        script(
            "core.orders",
            "SELECT o.id, p.amount FROM staging.orders o \
             JOIN staging.payments p ON o.id = p.order_id",
            &["staging.orders", "staging.payments"],
        ),
    ]
}

#[tokio::test]
async fn test_clean_run_materialises_and_publishes() {
    let dag = build_dag(jaffle());
    let active = all_active(&dag);
    let warehouse = Arc::new(DuckDbWarehouse::in_memory(Env::Prod).unwrap());
    let config = RunConfig::new(Env::Prod, "scripts");

    let outcome = run(&dag, &active, &config, warehouse.clone()).await;

    assert!(outcome.success());
    assert_eq!(outcome.count(NodeStatus::Done), 5);
    assert_eq!(outcome.promoted.len(), 5);

    for id in ["staging.customers", "core.customers", "core.orders"] {
        let id = table(id);
        assert!(warehouse.exists(&id, false).await.unwrap(), "{id} missing");
        assert!(
            !warehouse.exists(&id, true).await.unwrap(),
            "{id} audit left behind"
        );
    }
}

#[tokio::test]
async fn test_second_run_skips_everything() {
    let dag = build_dag(jaffle());
    let active = all_active(&dag);
    let warehouse = Arc::new(DuckDbWarehouse::in_memory(Env::Prod).unwrap());
    let config = RunConfig::new(Env::Prod, "scripts");

    let first = run(&dag, &active, &config, warehouse.clone()).await;
    assert!(first.success());

    let second = run(&dag, &active, &config, warehouse.clone()).await;
    assert!(second.success());
    assert_eq!(second.count(NodeStatus::Skipped), 5);
    assert_eq!(second.count(NodeStatus::Done), 0);
    assert!(second.promoted.is_empty());
}

#[tokio::test]
async fn test_restart_forces_rerun() {
    let dag = build_dag(jaffle());
    let active = all_active(&dag);
    let warehouse = Arc::new(DuckDbWarehouse::in_memory(Env::Prod).unwrap());
    let config = RunConfig::new(Env::Prod, "scripts");

    run(&dag, &active, &config, warehouse.clone()).await;

    let mut restart_config = RunConfig::new(Env::Prod, "scripts");
    restart_config.restart = true;
    let outcome = run(&dag, &active, &restart_config, warehouse.clone()).await;
    assert_eq!(outcome.count(NodeStatus::Done), 5);
    assert_eq!(outcome.count(NodeStatus::Skipped), 0);
}

#[tokio::test]
async fn test_modified_script_reruns_alone() {
    let scripts = jaffle();
    let dag = build_dag(scripts.clone());
    let active = all_active(&dag);
    let warehouse = Arc::new(DuckDbWarehouse::in_memory(Env::Prod).unwrap());
    let config = RunConfig::new(Env::Prod, "scripts");
    run(&dag, &active, &config, warehouse.clone()).await;

    // Touch one staging script. The skip law is mtime-based per node, so
    // only the touched script re-runs; untouched dependents stay skipped.
    let mut scripts = scripts;
    for s in &mut scripts {
        if s.id == table("staging.orders") {
            s.mtime = Utc::now() + chrono::Duration::seconds(60);
        }
    }
    let dag = build_dag(scripts);
    let outcome = run(&dag, &active, &config, warehouse.clone()).await;

    assert!(outcome.success(), "outcome: {outcome:?}");
    assert_eq!(outcome.results[&table("staging.orders")].status, NodeStatus::Done);
    assert_eq!(outcome.results[&table("staging.customers")].status, NodeStatus::Skipped);
    assert_eq!(outcome.results[&table("core.orders")].status, NodeStatus::Skipped);
    assert_eq!(outcome.promoted, vec![table("staging.orders")]);
}

#[tokio::test]
async fn test_assertion_failure_blocks_publish() {
    let mut users = script("core.users", "SELECT 1 AS id, 'X' AS blood_type", &[]);
    users.assertions.push(Assertion::Set {
        column: "blood_type".into(),
        values: vec!["'A'".into(), "'B'".into(), "'AB'".into(), "'O'".into()],
    });
    let dag = build_dag(vec![users]);
    let active = all_active(&dag);
    let warehouse = Arc::new(DuckDbWarehouse::in_memory(Env::Prod).unwrap());
    let config = RunConfig::new(Env::Prod, "scripts");

    let outcome = run(&dag, &active, &config, warehouse.clone()).await;

    assert!(!outcome.success());
    let users_id = table("core.users");
    let test_id = table("tests.core__users__blood_type___set");
    assert_eq!(outcome.results[&users_id].status, NodeStatus::Done);
    assert_eq!(outcome.results[&test_id].status, NodeStatus::Errored);
    let error = outcome.results[&test_id].error.as_deref().unwrap();
    assert!(error.contains("assertion failed"), "error: {error}");
    assert!(error.contains('X'), "sample rows missing: {error}");

    // Production untouched, audit kept for inspection.
    assert!(outcome.promoted.is_empty());
    assert!(!warehouse.exists(&users_id, false).await.unwrap());
    assert!(warehouse.exists(&users_id, true).await.unwrap());
}

#[tokio::test]
async fn test_passing_assertions_publish() {
    let mut users = script("core.users", "SELECT 1 AS id, 'A' AS blood_type", &[]);
    users.assertions.push(Assertion::NoNulls { column: "id".into() });
    users.assertions.push(Assertion::Set {
        column: "blood_type".into(),
        values: vec!["'A'".into(), "'B'".into()],
    });
    let dag = build_dag(vec![users]);
    let active = all_active(&dag);
    let warehouse = Arc::new(DuckDbWarehouse::in_memory(Env::Prod).unwrap());
    let config = RunConfig::new(Env::Prod, "scripts");

    let outcome = run(&dag, &active, &config, warehouse.clone()).await;
    assert!(outcome.success(), "outcome: {outcome:?}");
    assert_eq!(outcome.promoted, vec![table("core.users")]);
}

#[tokio::test]
async fn test_error_poisons_descendants_not_siblings() {
    let scripts = vec![
        script("staging.good", "SELECT 1 AS id", &[]),
        script("staging.bad", "SELECT * FROM nowhere.missing", &[]),
        script(
            "core.downstream",
            "SELECT * FROM staging.bad",
            &["staging.bad"],
        ),
    ];
    let dag = build_dag(scripts);
    let active = all_active(&dag);
    let warehouse = Arc::new(DuckDbWarehouse::in_memory(Env::Prod).unwrap());
    let config = RunConfig::new(Env::Prod, "scripts");

    let outcome = run(&dag, &active, &config, warehouse.clone()).await;

    assert!(!outcome.success());
    assert_eq!(outcome.results[&table("staging.good")].status, NodeStatus::Done);
    assert_eq!(outcome.results[&table("staging.bad")].status, NodeStatus::Errored);
    assert_eq!(
        outcome.results[&table("core.downstream")].status,
        NodeStatus::SkippedUpstream
    );

    // All-or-nothing publish: even the healthy sibling stays unpromoted.
    assert!(outcome.promoted.is_empty());
    assert!(!warehouse.exists(&table("staging.good"), false).await.unwrap());
    assert!(warehouse.exists(&table("staging.good"), true).await.unwrap());
}

#[tokio::test]
async fn test_checkpoint_resume_after_failure() {
    let good = script("staging.good", "SELECT 1 AS id", &[]);
    let bad = script("staging.bad", "SELECT * FROM nowhere.missing", &[]);
    let dag = build_dag(vec![good.clone(), bad]);
    let active = all_active(&dag);
    let warehouse = Arc::new(DuckDbWarehouse::in_memory(Env::Prod).unwrap());
    let config = RunConfig::new(Env::Prod, "scripts");

    run(&dag, &active, &config, warehouse.clone()).await;

    // Fix the broken script, keeping the healthy one untouched: it resumes
    // from its audit checkpoint and still reaches production at publish.
    let fixed_bad = script("staging.bad", "SELECT 2 AS id", &[]);
    let dag = build_dag(vec![good, fixed_bad]);
    let outcome = run(&dag, &active, &config, warehouse.clone()).await;

    assert!(outcome.success(), "outcome: {outcome:?}");
    assert_eq!(outcome.results[&table("staging.good")].status, NodeStatus::Skipped);
    assert_eq!(outcome.results[&table("staging.bad")].status, NodeStatus::Done);
    // The skipped node's checkpoint audit table was promoted too.
    assert!(outcome.promoted.contains(&table("staging.good")));
    assert!(warehouse.exists(&table("staging.good"), false).await.unwrap());
}

#[tokio::test]
async fn test_fail_fast_stops_pending_work() {
    let scripts = vec![
        script("staging.bad", "SELECT * FROM nowhere.missing", &[]),
        script("core.child", "SELECT * FROM staging.bad", &["staging.bad"]),
        script(
            "mart.grandchild",
            "SELECT * FROM core.child",
            &["core.child"],
        ),
    ];
    let dag = build_dag(scripts);
    let active = all_active(&dag);
    let warehouse = Arc::new(DuckDbWarehouse::in_memory(Env::Prod).unwrap());
    let mut config = RunConfig::new(Env::Prod, "scripts");
    config.fail_fast = true;
    config.concurrency = 1;

    let outcome = run(&dag, &active, &config, warehouse.clone()).await;

    assert!(!outcome.success());
    assert_eq!(outcome.results[&table("staging.bad")].status, NodeStatus::Errored);
    for id in ["core.child", "mart.grandchild"] {
        assert_eq!(
            outcome.results[&table(id)].status,
            NodeStatus::SkippedUpstream,
            "{id}"
        );
    }
    assert!(outcome.promoted.is_empty());
}

#[tokio::test]
async fn test_cancellation_schedules_nothing() {
    let dag = build_dag(jaffle());
    let active = all_active(&dag);
    let warehouse: Arc<dyn Warehouse> =
        Arc::new(DuckDbWarehouse::in_memory(Env::Prod).unwrap());
    let config = RunConfig::new(Env::Prod, "scripts");

    let cancel = Arc::new(AtomicBool::new(true));
    let outcome = execute_active_set(
        &dag,
        &active,
        &config,
        warehouse.clone(),
        Arc::new(SqlParser::duckdb()),
        Arc::new(NullSink),
        cancel,
    )
    .await
    .unwrap();

    assert!(outcome.cancelled);
    assert!(!outcome.success());
    assert!(outcome.promoted.is_empty());
    assert!(!warehouse.exists(&table("staging.orders"), false).await.unwrap());
}

#[tokio::test]
async fn test_unselected_dependency_reads_production() {
    // Seed production for staging.orders, then run only core.orders with
    // the upstream left out of the active set.
    let scripts = vec![
        script("staging.orders", "SELECT 1 AS id, 10 AS amount", &[]),
        script(
            "core.orders",
            "SELECT id, amount FROM staging.orders",
            &["staging.orders"],
        ),
    ];
    let dag = build_dag(scripts);
    let warehouse = Arc::new(DuckDbWarehouse::in_memory(Env::Prod).unwrap());
    let config = RunConfig::new(Env::Prod, "scripts");

    let full = all_active(&dag);
    run(&dag, &full, &config, warehouse.clone()).await;

    let partial: BTreeSet<TableRef> = [table("core.orders")].into_iter().collect();
    let mut restart_config = RunConfig::new(Env::Prod, "scripts");
    restart_config.restart = true;
    let outcome = run(&dag, &partial, &restart_config, warehouse.clone()).await;

    assert!(outcome.success(), "outcome: {outcome:?}");
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.results[&table("core.orders")].status, NodeStatus::Done);
    assert_eq!(outcome.promoted, vec![table("core.orders")]);
}
