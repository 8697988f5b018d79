//! Table dependency extraction from SQL AST

use sqlparser::ast::{visit_relations, Query, SetExpr, Statement, With};
use std::collections::HashSet;

/// Collect CTE names from a WITH clause, recursing into the CTE bodies
/// themselves (a CTE may define further CTEs).
fn collect_cte_names(with: &With, names: &mut HashSet<String>) {
    for cte in &with.cte_tables {
        names.insert(cte.alias.name.value.clone());
        collect_query_cte_names(&cte.query, names);
    }
}

/// Collect CTE names from a query, including set-operation branches and
/// nested query expressions.
fn collect_query_cte_names(query: &Query, names: &mut HashSet<String>) {
    if let Some(with) = &query.with {
        collect_cte_names(with, names);
    }
    collect_body_cte_names(&query.body, names);
}

fn collect_body_cte_names(body: &SetExpr, names: &mut HashSet<String>) {
    match body {
        SetExpr::Query(query) => collect_query_cte_names(query, names),
        SetExpr::SetOperation { left, right, .. } => {
            collect_body_cte_names(left, names);
            collect_body_cte_names(right, names);
        }
        _ => {}
    }
}

/// CTE names defined anywhere in a statement.
fn get_cte_names(stmt: &Statement) -> HashSet<String> {
    let mut names = HashSet::new();
    if let Statement::Query(query) = stmt {
        collect_query_cte_names(query, &mut names);
    }
    names
}

/// Extract all table references from SQL statements.
///
/// Uses `visit_relations` to walk the AST and collect every `ObjectName`
/// appearing in FROM clauses, JOINs, subqueries and set operations. Names
/// defined as CTEs in the same statements are filtered out.
///
/// References are returned in source dotted syntax; classifying them as
/// project tables or external tables is the caller's concern.
pub fn extract_dependencies(statements: &[Statement]) -> HashSet<String> {
    let all_cte_names: HashSet<String> = statements.iter().flat_map(get_cte_names).collect();

    let mut deps = HashSet::new();
    for stmt in statements {
        let _ = visit_relations(stmt, |relation| {
            deps.insert(crate::object_name_to_string(relation));
            std::ops::ControlFlow::<()>::Continue(())
        });
    }

    deps.retain(|dep: &String| {
        // A bare reference to a CTE has no schema qualifier; compare on the
        // last path component to also drop self-qualified CTE refs.
        // Safety: str::split() always yields at least one element
        let normalized = dep.split('.').next_back().unwrap_or(dep);
        !all_cte_names.contains(normalized)
    });

    deps
}

#[cfg(test)]
#[path = "extractor_test.rs"]
mod tests;
