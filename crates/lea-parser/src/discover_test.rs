use super::*;
use std::fs;
use tempfile::TempDir;

fn write_script(root: &Path, relative: &str, sql: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, sql).unwrap();
}

fn parse(root: &Path) -> ParserResult<Vec<Script>> {
    parse_scripts(root, &SqlParser::duckdb())
}

fn jaffle(root: &Path) {
    write_script(root, "staging/customers.sql", "SELECT 1 AS id, 'ada' AS name");
    write_script(root, "staging/orders.sql", "SELECT 1 AS id, 1 AS customer_id");
    write_script(
        root,
        "core/customers.sql",
        "SELECT c.id, c.name FROM staging.customers c JOIN staging.orders o ON c.id = o.customer_id",
    );
}

#[test]
fn test_discovery_and_dependencies() {
    let dir = TempDir::new().unwrap();
    jaffle(dir.path());

    let scripts = parse(dir.path()).unwrap();
    assert_eq!(scripts.len(), 3);

    let core = scripts
        .iter()
        .find(|s| s.id.dotted() == "core.customers")
        .unwrap();
    assert_eq!(core.kind, ScriptKind::Regular);
    let deps: Vec<String> = core.dependencies.iter().map(|d| d.dotted()).collect();
    assert_eq!(deps, vec!["staging.customers", "staging.orders"]);
    assert!(core.external_dependencies.is_empty());
}

#[test]
fn test_external_references_kept_aside() {
    let dir = TempDir::new().unwrap();
    write_script(
        dir.path(),
        "staging/events.sql",
        "SELECT * FROM raw.app_events",
    );

    let scripts = parse(dir.path()).unwrap();
    assert!(scripts[0].dependencies.is_empty());
    assert!(scripts[0].external_dependencies.contains("raw.app_events"));
}

#[test]
fn test_file_under_root_rejected() {
    let dir = TempDir::new().unwrap();
    write_script(dir.path(), "loose.sql", "SELECT 1");
    let err = parse(dir.path()).unwrap_err();
    assert!(matches!(err, ParserError::ScriptOutsideSchema { .. }));
}

#[test]
fn test_duplicate_id_rejected() {
    let dir = TempDir::new().unwrap();
    write_script(dir.path(), "core/users.sql", "SELECT 1 AS id");
    write_script(dir.path(), "core/users.sql.jinja", "SELECT 2 AS id");
    let err = parse(dir.path()).unwrap_err();
    assert!(matches!(err, ParserError::DuplicateScript { .. }));
}

#[test]
fn test_nested_schema_and_stem_folding() {
    let dir = TempDir::new().unwrap();
    write_script(dir.path(), "core/eu/users.sql", "SELECT 1 AS id");
    write_script(dir.path(), "core/us__users.sql", "SELECT 1 AS id");

    let scripts = parse(dir.path()).unwrap();
    let ids: Vec<String> = scripts.iter().map(|s| s.id.dotted()).collect();
    assert_eq!(ids, vec!["core.eu__users", "core.us__users"]);
}

#[test]
fn test_tests_dir_is_singular() {
    let dir = TempDir::new().unwrap();
    write_script(dir.path(), "core/users.sql", "SELECT 1 AS id");
    write_script(
        dir.path(),
        "tests/orphan_users.sql",
        "SELECT id FROM core.users WHERE id IS NULL",
    );

    let scripts = parse(dir.path()).unwrap();
    let test = scripts
        .iter()
        .find(|s| s.id.dotted() == "tests.orphan_users")
        .unwrap();
    assert_eq!(test.kind, ScriptKind::TestSingular);
    assert!(test
        .dependencies
        .iter()
        .any(|d| d.dotted() == "core.users"));
}

#[test]
fn test_annotations_collected_on_regular_only() {
    let dir = TempDir::new().unwrap();
    write_script(
        dir.path(),
        "core/users.sql",
        "SELECT\n    -- #NO_NULLS\n    email,\n    -- #SET{'A', 'B'}\n    grade\nFROM staging.users",
    );
    write_script(
        dir.path(),
        "tests/check.sql",
        "SELECT\n    -- #NO_NULLS\n    id\nFROM core.users WHERE false",
    );

    let scripts = parse(dir.path()).unwrap();
    let users = scripts
        .iter()
        .find(|s| s.id.dotted() == "core.users")
        .unwrap();
    assert_eq!(users.assertions.len(), 2);

    let check = scripts
        .iter()
        .find(|s| s.id.dotted() == "tests.check")
        .unwrap();
    assert!(check.assertions.is_empty());
}

#[test]
fn test_incremental_key() {
    let dir = TempDir::new().unwrap();
    write_script(
        dir.path(),
        "core/events.sql",
        "SELECT\n    -- #INCREMENTAL\n    day,\n    amount\nFROM staging.events",
    );

    let scripts = parse(dir.path()).unwrap();
    assert_eq!(scripts[0].incremental_key.as_deref(), Some("day"));
    assert!(scripts[0].is_incremental());
}

#[test]
fn test_self_reference_is_not_an_edge() {
    let dir = TempDir::new().unwrap();
    write_script(
        dir.path(),
        "core/events.sql",
        "SELECT * FROM staging.events WHERE id NOT IN (SELECT id FROM core.events)",
    );
    write_script(dir.path(), "staging/events.sql", "SELECT 1 AS id");

    let scripts = parse(dir.path()).unwrap();
    let core = scripts
        .iter()
        .find(|s| s.id.dotted() == "core.events")
        .unwrap();
    let deps: Vec<String> = core.dependencies.iter().map(|d| d.dotted()).collect();
    assert_eq!(deps, vec!["staging.events"]);
}

#[test]
fn test_jinja_rendering_with_env() {
    let dir = TempDir::new().unwrap();
    // Render with a literal loop rather than env vars so the test does not
    // depend on the process environment.
    write_script(
        dir.path(),
        "core/unioned.sql.jinja",
        "{% for s in ['a', 'b'] %}SELECT * FROM staging.{{ s }}{% if not loop.last %} UNION ALL {% endif %}{% endfor %}",
    );
    write_script(dir.path(), "staging/a.sql", "SELECT 1 AS id");
    write_script(dir.path(), "staging/b.sql", "SELECT 2 AS id");

    let scripts = parse(dir.path()).unwrap();
    let unioned = scripts
        .iter()
        .find(|s| s.id.dotted() == "core.unioned")
        .unwrap();
    assert_eq!(unioned.dependencies.len(), 2);
    assert!(unioned.sql.contains("UNION ALL"));
}

#[test]
fn test_malformed_set_reports_file() {
    let dir = TempDir::new().unwrap();
    write_script(
        dir.path(),
        "core/users.sql",
        "SELECT\n    -- #SET{'A'\n    grade\nFROM staging.users",
    );
    let err = parse(dir.path()).unwrap_err();
    match err {
        ParserError::Script { path, source } => {
            assert!(path.ends_with("core/users.sql"));
            assert!(matches!(source, lea_sql::SqlError::MalformedAnnotation { .. }));
        }
        other => panic!("expected Script error, got {other}"),
    }
}

#[test]
fn test_missing_root() {
    let err = parse(Path::new("/nonexistent/lea-scripts")).unwrap_err();
    assert!(matches!(err, ParserError::RootNotFound { .. }));
}

#[test]
fn test_audit_reference_resolves_to_base_table() {
    let dir = TempDir::new().unwrap();
    write_script(dir.path(), "core/users.sql", "SELECT 1 AS id");
    write_script(
        dir.path(),
        "mart/summary.sql",
        "SELECT COUNT(*) AS n FROM core.users___audit",
    );

    let scripts = parse(dir.path()).unwrap();
    let mart = scripts
        .iter()
        .find(|s| s.id.dotted() == "mart.summary")
        .unwrap();
    assert!(mart.dependencies.iter().any(|d| d.dotted() == "core.users"));
}
