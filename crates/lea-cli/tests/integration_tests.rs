//! End-to-end pipeline tests: scripts directory -> parse -> synthesise ->
//! DAG -> selection.

use lea_core::dag::ScriptDag;
use lea_core::error::CoreError;
use lea_core::script::{Script, ScriptKind};
use lea_core::selector::resolve_active_set;
use lea_core::table_ref::TableRef;
use lea_sql::SqlParser;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_script(root: &Path, relative: &str, sql: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, sql).unwrap();
}

fn table(dotted: &str) -> TableRef {
    TableRef::parse(dotted).unwrap().0
}

/// The jaffle-shop layout from the scenario suite.
fn jaffle(root: &Path) {
    write_script(root, "staging/customers.sql", "SELECT 1 AS id, 'ada' AS name");
    write_script(root, "staging/orders.sql", "SELECT 1 AS id, 1 AS customer_id");
    write_script(root, "staging/payments.sql", "SELECT 1 AS order_id, 10 AS amount");
    write_script(
        root,
        "core/users.sql",
        "SELECT\n    -- #UNIQUE\n    -- #NO_NULLS\n    c.id,\n    c.name\n\
         FROM staging.customers c\n\
         JOIN staging.orders o ON c.id = o.customer_id\n\
         JOIN staging.payments p ON o.id = p.order_id",
    );
    write_script(
        root,
        "mart/funnel.sql",
        "SELECT COUNT(*) AS users FROM core.users",
    );
}

fn load(root: &Path) -> ScriptDag {
    let mut scripts = lea_parser::parse_scripts(root, &SqlParser::duckdb()).unwrap();
    let tests: Vec<Script> = scripts
        .iter()
        .flat_map(lea_test::synthesize_assertion_tests)
        .collect();
    scripts.extend(tests);
    ScriptDag::build(scripts).unwrap()
}

#[test]
fn test_full_pipeline_builds_dag_with_tests() {
    let dir = TempDir::new().unwrap();
    jaffle(dir.path());

    let dag = load(dir.path());
    // 5 scripts + 2 synthesised assertion tests on core.users.id
    assert_eq!(dag.len(), 7);

    let users = table("core.users");
    assert_eq!(dag.dependencies(&users).len(), 3);

    let test_ids: Vec<String> = dag
        .nodes()
        .filter(|n| dag.script(n).unwrap().kind == ScriptKind::TestAssertion)
        .map(|n| n.dotted())
        .collect();
    assert!(test_ids.contains(&"tests.core__users__id___unique".to_string()));
    assert!(test_ids.contains(&"tests.core__users__id___no_nulls".to_string()));

    // Tests depend on exactly their parent.
    let test_id = table("tests.core__users__id___unique");
    assert_eq!(dag.dependencies(&test_id), vec![users]);
}

#[test]
fn test_topological_order_is_dependency_first() {
    let dir = TempDir::new().unwrap();
    jaffle(dir.path());

    let dag = load(dir.path());
    let order = dag.topological_order().unwrap();
    let pos = |name: &str| order.iter().position(|r| r == &table(name)).unwrap();

    assert!(pos("staging.customers") < pos("core.users"));
    assert!(pos("staging.orders") < pos("core.users"));
    assert!(pos("staging.payments") < pos("core.users"));
    assert!(pos("core.users") < pos("mart.funnel"));
    assert!(pos("core.users") < pos("tests.core__users__id___unique"));
}

#[test]
fn test_cycle_detected_before_any_execution() {
    let dir = TempDir::new().unwrap();
    write_script(dir.path(), "a/x.sql", "SELECT * FROM a.y");
    write_script(dir.path(), "a/y.sql", "SELECT * FROM a.x");

    let scripts = lea_parser::parse_scripts(dir.path(), &SqlParser::duckdb()).unwrap();
    let err = ScriptDag::build(scripts).unwrap_err();
    match err {
        CoreError::CircularDependency { cycle } => {
            assert!(cycle.contains("a.x"));
            assert!(cycle.contains("a.y"));
        }
        other => panic!("expected CircularDependency, got {other}"),
    }
}

#[test]
fn test_selector_ancestors_and_descendants() {
    let dir = TempDir::new().unwrap();
    jaffle(dir.path());
    let dag = load(dir.path());

    let active = resolve_active_set(&dag, &["+core.users+".to_string()], &[], None).unwrap();
    let names: Vec<String> = active.iter().map(|r| r.dotted()).collect();
    assert_eq!(
        names,
        vec![
            "core.users",
            "mart.funnel",
            "staging.customers",
            "staging.orders",
            "staging.payments",
            "tests.core__users__id___no_nulls",
            "tests.core__users__id___unique",
        ]
    );
}

#[test]
fn test_selector_schema_and_unselect() {
    let dir = TempDir::new().unwrap();
    jaffle(dir.path());
    let dag = load(dir.path());

    let active = resolve_active_set(
        &dag,
        &["staging/".to_string()],
        &["staging.payments".to_string()],
        None,
    )
    .unwrap();
    let names: Vec<String> = active.iter().map(|r| r.dotted()).collect();
    assert_eq!(names, vec!["staging.customers", "staging.orders"]);
}

#[test]
fn test_selector_unknown_node_fails() {
    let dir = TempDir::new().unwrap();
    jaffle(dir.path());
    let dag = load(dir.path());

    let err = resolve_active_set(&dag, &["core.nope".to_string()], &[], None).unwrap_err();
    assert!(matches!(err, CoreError::ScriptNotFound { .. }));
}

#[test]
fn test_jinja_script_with_yaml_context() {
    let dir = TempDir::new().unwrap();
    write_script(dir.path(), "staging/fr.sql", "SELECT 'fr' AS country");
    write_script(dir.path(), "staging/de.sql", "SELECT 'de' AS country");
    fs::write(dir.path().join("countries.yaml"), "- fr\n- de\n").unwrap();
    write_script(
        dir.path(),
        "core/all_countries.sql.jinja",
        "{% set countries = load_yaml('countries.yaml') %}\
         {% for c in countries %}SELECT country FROM staging.{{ c }}\
         {% if not loop.last %} UNION ALL {% endif %}{% endfor %}",
    );

    let dag = load(dir.path());
    let all = table("core.all_countries");
    let mut deps: Vec<String> = dag
        .dependencies(&all)
        .iter()
        .map(|d| d.dotted())
        .collect();
    deps.sort();
    assert_eq!(deps, vec!["staging.de", "staging.fr"]);
}

#[test]
fn test_singular_test_classified_and_wired() {
    let dir = TempDir::new().unwrap();
    jaffle(dir.path());
    write_script(
        dir.path(),
        "tests/users_have_names.sql",
        "SELECT id FROM core.users WHERE name IS NULL",
    );

    let dag = load(dir.path());
    let test = table("tests.users_have_names");
    assert_eq!(dag.script(&test).unwrap().kind, ScriptKind::TestSingular);
    assert_eq!(dag.dependencies(&test), vec![table("core.users")]);
}
