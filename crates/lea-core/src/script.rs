//! Parsed scripts and their inline assertions.

use crate::table_ref::TableRef;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

/// What kind of node a script contributes to the DAG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptKind {
    /// Produces a production table.
    Regular,
    /// A hand-written test under `tests/`; passes iff it returns zero rows.
    TestSingular,
    /// Synthesised from an inline assertion annotation; passes iff it
    /// returns zero rows.
    TestAssertion,
}

impl fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptKind::Regular => write!(f, "regular"),
            ScriptKind::TestSingular => write!(f, "test"),
            ScriptKind::TestAssertion => write!(f, "assertion"),
        }
    }
}

/// An inline assertion attached to a SELECT-list column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Assertion {
    /// `#NO_NULLS` — the column must contain no NULL values.
    NoNulls { column: String },
    /// `#UNIQUE` — non-NULL values of the column must be unique.
    Unique { column: String },
    /// `#UNIQUE_BY(c1, …)` — the column must be unique within each group.
    UniqueBy { column: String, by: Vec<String> },
    /// `#SET{v1, …}` — non-NULL values must come from the allowed set.
    Set { column: String, values: Vec<String> },
}

impl Assertion {
    /// The column the assertion is attached to.
    pub fn column(&self) -> &str {
        match self {
            Assertion::NoNulls { column }
            | Assertion::Unique { column }
            | Assertion::UniqueBy { column, .. }
            | Assertion::Set { column, .. } => column,
        }
    }

    /// Short kind tag used in synthesised test names.
    pub fn kind_tag(&self) -> &'static str {
        match self {
            Assertion::NoNulls { .. } => "no_nulls",
            Assertion::Unique { .. } => "unique",
            Assertion::UniqueBy { .. } => "unique_by",
            Assertion::Set { .. } => "set",
        }
    }
}

/// One SQL file, post-Jinja, producing exactly one table.
///
/// Constructed by the parser and immutable afterwards. `dependencies` holds
/// only references produced by other scripts in the project; references to
/// pre-existing warehouse tables land in `external_dependencies` and create
/// no graph edges.
#[derive(Debug, Clone)]
pub struct Script {
    /// Table this script produces, derived from its path under the scripts root.
    pub id: TableRef,

    /// Node kind.
    pub kind: ScriptKind,

    /// Source file path (the template file for `.sql.jinja` scripts).
    pub path: PathBuf,

    /// SQL text, after Jinja expansion where applicable.
    pub sql: String,

    /// Graph-internal dependencies.
    pub dependencies: BTreeSet<TableRef>,

    /// References to tables not produced by any script (informational;
    /// kept in source syntax since they may not follow project conventions).
    pub external_dependencies: BTreeSet<String>,

    /// Inline assertion annotations.
    pub assertions: Vec<Assertion>,

    /// Effective source modification time. For Jinja scripts this is the
    /// max of the template file and every YAML file loaded during render.
    pub mtime: DateTime<Utc>,

    /// Merge key column when the script carries `#INCREMENTAL`.
    pub incremental_key: Option<String>,

    /// Columns flagged `#CLUSTERING_FIELD` — warehouse hint, opaque here.
    pub clustering_fields: Vec<String>,
}

impl Script {
    /// True when the script is materialised by merging on its key rather
    /// than by replacement.
    pub fn is_incremental(&self) -> bool {
        self.incremental_key.is_some()
    }

    /// True for both singular and assertion test scripts.
    pub fn is_test(&self) -> bool {
        matches!(self.kind, ScriptKind::TestSingular | ScriptKind::TestAssertion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(kind: ScriptKind, key: Option<&str>) -> Script {
        Script {
            id: TableRef::new(vec!["core".into()], "users").unwrap(),
            kind,
            path: PathBuf::from("core/users.sql"),
            sql: "SELECT 1".to_string(),
            dependencies: BTreeSet::new(),
            external_dependencies: BTreeSet::new(),
            assertions: Vec::new(),
            mtime: Utc::now(),
            incremental_key: key.map(String::from),
            clustering_fields: Vec::new(),
        }
    }

    #[test]
    fn test_is_incremental() {
        assert!(!script(ScriptKind::Regular, None).is_incremental());
        assert!(script(ScriptKind::Regular, Some("id")).is_incremental());
    }

    #[test]
    fn test_is_test() {
        assert!(!script(ScriptKind::Regular, None).is_test());
        assert!(script(ScriptKind::TestSingular, None).is_test());
        assert!(script(ScriptKind::TestAssertion, None).is_test());
    }

    #[test]
    fn test_assertion_column() {
        let a = Assertion::UniqueBy {
            column: "id".into(),
            by: vec!["day".into()],
        };
        assert_eq!(a.column(), "id");
        assert_eq!(a.kind_tag(), "unique_by");
    }
}
