//! Dependency reference rewriting for compiled SQL
//!
//! Rewrites project table references to their warehouse forms (audit,
//! dev-suffixed, or production) using AST manipulation via
//! `visit_relations_mut`, so string lookalikes in literals or comments are
//! never touched.

use sqlparser::ast::{visit_relations_mut, Ident, ObjectName, ObjectNamePart, Statement};
use std::collections::HashMap;

use crate::dialect::SqlDialect;
use crate::error::SqlResult;

/// Parse `sql` and rewrite table references according to `resolution`.
///
/// `resolution` maps lowercase source dotted references (exactly as they
/// appear in the script, e.g. `staging.orders`) to rendered warehouse names
/// (e.g. `staging.orders___audit` or `prod.staging.orders`). References not
/// present in the map are left unchanged.
pub fn rewrite_statements(
    sql: &str,
    dialect: &dyn SqlDialect,
    resolution: &HashMap<String, String>,
) -> SqlResult<Vec<Statement>> {
    let mut statements = dialect.parse(sql)?;

    for stmt in &mut statements {
        let _ = visit_relations_mut(stmt, |name: &mut ObjectName| {
            let dotted = crate::object_name_to_string(name).to_lowercase();
            if let Some(target) = resolution.get(&dotted) {
                name.0 = target
                    .split('.')
                    .map(|part| ObjectNamePart::Identifier(Ident::new(part)))
                    .collect();
            }
            std::ops::ControlFlow::<()>::Continue(())
        });
    }

    Ok(statements)
}

/// [`rewrite_statements`], rendered back to SQL text.
pub fn rewrite_references(
    sql: &str,
    dialect: &dyn SqlDialect,
    resolution: &HashMap<String, String>,
) -> SqlResult<String> {
    if resolution.is_empty() {
        return Ok(sql.to_string());
    }

    Ok(rewrite_statements(sql, dialect, resolution)?
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(";\n"))
}
