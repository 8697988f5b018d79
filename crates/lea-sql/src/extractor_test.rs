use super::*;
use crate::parser::SqlParser;

fn deps(sql: &str) -> HashSet<String> {
    let stmts = SqlParser::duckdb().parse(sql).unwrap();
    extract_dependencies(&stmts)
}

#[test]
fn test_simple_from() {
    let d = deps("SELECT * FROM staging.orders");
    assert_eq!(d, ["staging.orders".to_string()].into_iter().collect());
}

#[test]
fn test_joins() {
    let d = deps(
        "SELECT o.id FROM staging.orders o \
         JOIN staging.payments p ON o.id = p.order_id \
         LEFT JOIN staging.customers c ON o.customer_id = c.id",
    );
    assert_eq!(d.len(), 3);
    assert!(d.contains("staging.payments"));
}

#[test]
fn test_cte_names_excluded() {
    let d = deps(
        "WITH orders AS (SELECT * FROM staging.orders), \
         totals AS (SELECT order_id, SUM(amount) AS total FROM orders GROUP BY order_id) \
         SELECT * FROM totals",
    );
    assert_eq!(d, ["staging.orders".to_string()].into_iter().collect());
}

#[test]
fn test_nested_cte_excluded() {
    let d = deps(
        "WITH outer_cte AS ( \
           WITH inner_cte AS (SELECT * FROM staging.raw_events) \
           SELECT * FROM inner_cte \
         ) \
         SELECT * FROM outer_cte",
    );
    assert_eq!(d, ["staging.raw_events".to_string()].into_iter().collect());
}

#[test]
fn test_subquery() {
    let d = deps(
        "SELECT * FROM core.users WHERE id IN (SELECT user_id FROM staging.events)",
    );
    assert!(d.contains("core.users"));
    assert!(d.contains("staging.events"));
}

#[test]
fn test_set_operation() {
    let d = deps("SELECT id FROM staging.a UNION ALL SELECT id FROM staging.b");
    assert_eq!(d.len(), 2);
}

#[test]
fn test_sub_schema_reference_preserved() {
    let d = deps("SELECT * FROM core.eu__users");
    assert!(d.contains("core.eu__users"));
}

#[test]
fn test_audit_reference_preserved() {
    let d = deps("SELECT * FROM core.users___audit");
    assert!(d.contains("core.users___audit"));
}
