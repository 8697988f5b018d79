//! Assertion expansion into test scripts.

use lea_core::script::{Assertion, Script, ScriptKind};
use lea_core::sql_quote::{quote_ident, quote_qualified};
use lea_core::table_ref::TableRef;

/// Schema the synthesised tests live under.
const TESTS_SCHEMA: &str = "tests";

/// Generate SQL for a no-nulls assertion.
///
/// Returns the rows where the column is NULL.
pub fn generate_no_nulls_sql(audit_table: &str, column: &str) -> String {
    let qt = quote_qualified(audit_table);
    let qc = quote_ident(column);
    format!("SELECT {qc}\nFROM {qt}\nWHERE {qc} IS NULL")
}

/// Generate SQL for a uniqueness assertion.
///
/// Returns the non-NULL values appearing more than once.
pub fn generate_unique_sql(audit_table: &str, column: &str) -> String {
    let qt = quote_qualified(audit_table);
    let qc = quote_ident(column);
    format!(
        "SELECT {qc}\nFROM {qt}\nWHERE {qc} IS NOT NULL\nGROUP BY {qc}\nHAVING COUNT(*) > 1"
    )
}

/// Generate SQL for a grouped-uniqueness assertion.
///
/// Returns the (group, value) pairs where the value appears more than once
/// within its group.
pub fn generate_unique_by_sql(audit_table: &str, column: &str, by: &[String]) -> String {
    let qt = quote_qualified(audit_table);
    let qc = quote_ident(column);
    let group_cols: Vec<String> = by.iter().map(|c| quote_ident(c)).collect();
    let group_list = group_cols.join(", ");
    format!(
        "SELECT {group_list}, {qc}\nFROM {qt}\nWHERE {qc} IS NOT NULL\nGROUP BY {group_list}, {qc}\nHAVING COUNT(*) > 1"
    )
}

/// Generate SQL for a value-set assertion.
///
/// Returns the distinct non-NULL values outside the allowed set. The
/// values are SQL literals exactly as written in the annotation.
pub fn generate_set_sql(audit_table: &str, column: &str, values: &[String]) -> String {
    let qt = quote_qualified(audit_table);
    let qc = quote_ident(column);
    let values_list = values.join(", ");
    format!(
        "SELECT {qc}\nFROM {qt}\nWHERE {qc} IS NOT NULL AND {qc} NOT IN ({values_list})\nGROUP BY {qc}"
    )
}

/// The table reference of the test synthesised for `assertion` on `parent`.
///
/// Follows `tests.<schema__…__table>__<column>___<kind>`, e.g.
/// `tests.core__users__email___no_nulls`. Grouped-uniqueness tests append
/// their group columns so two `#UNIQUE_BY` on the same column stay distinct.
pub fn test_table_ref(parent: &TableRef, assertion: &Assertion) -> TableRef {
    let mut segments: Vec<&str> = parent.schema().iter().map(String::as_str).collect();
    segments.push(parent.name());
    let mut name = format!(
        "{}__{}___{}",
        segments.join("__"),
        assertion.column(),
        assertion.kind_tag()
    );
    if let Assertion::UniqueBy { by, .. } = assertion {
        name.push_str("___");
        name.push_str(&by.join("_"));
    }

    // Safety: parent schema and name are non-empty, so the built name is too
    TableRef::new(vec![TESTS_SCHEMA.to_string()], name)
        .expect("synthesised test name is non-empty")
}

/// Expand every assertion of `parent` into a test script.
///
/// The synthesised SQL reads the parent's audit table, so the tests run in
/// the write phase against uncommitted data. Each test depends on exactly
/// its parent.
pub fn synthesize_assertion_tests(parent: &Script) -> Vec<Script> {
    if parent.kind != ScriptKind::Regular {
        return Vec::new();
    }

    parent
        .assertions
        .iter()
        .map(|assertion| {
            let audit = parent.id.dotted_audit();
            let sql = match assertion {
                Assertion::NoNulls { column } => generate_no_nulls_sql(&audit, column),
                Assertion::Unique { column } => generate_unique_sql(&audit, column),
                Assertion::UniqueBy { column, by } => {
                    generate_unique_by_sql(&audit, column, by)
                }
                Assertion::Set { column, values } => generate_set_sql(&audit, column, values),
            };

            Script {
                id: test_table_ref(&parent.id, assertion),
                kind: ScriptKind::TestAssertion,
                path: parent.path.clone(),
                sql,
                dependencies: [parent.id.clone()].into_iter().collect(),
                external_dependencies: Default::default(),
                assertions: Vec::new(),
                mtime: parent.mtime,
                incremental_key: None,
                clustering_fields: Vec::new(),
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "synthesize_test.rs"]
mod tests;
