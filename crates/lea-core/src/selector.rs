//! Selector parsing and active-set resolution.
//!
//! A selection expression is a disjunction of atoms, each optionally
//! wrapped in `+` markers:
//!
//! - `core.users` — one node
//! - `+core.users` — the node and all its ancestors
//! - `core.users+` — the node and all its descendants
//! - `staging/` — every node whose schema chain starts with `staging`
//! - `git` — nodes whose source files changed in the working tree
//!
//! Multiple expressions combine by union; an `unselect` list subtracts from
//! the result. Assertion tests ride along with their parent: whenever a
//! regular node is selected, its synthesised tests join the active set so
//! publish stays gated on them.

use crate::dag::ScriptDag;
use crate::error::{CoreError, CoreResult};
use crate::script::ScriptKind;
use crate::table_ref::TableRef;
use std::collections::{BTreeSet, HashSet};

/// A parsed selector atom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorAtom {
    /// A single node by dotted reference.
    Node { id: TableRef },
    /// Every node under a schema chain prefix.
    Schema { segments: Vec<String> },
    /// Nodes whose source files changed relative to the base branch.
    Git,
}

/// An atom with its ancestor/descendant expansion markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    pub atom: SelectorAtom,
    pub ancestors: bool,
    pub descendants: bool,
}

impl Selector {
    /// Parse one selector expression.
    pub fn parse(expression: &str) -> CoreResult<Self> {
        let trimmed = expression.trim();
        let ancestors = trimmed.starts_with('+');
        let descendants = trimmed.ends_with('+') && trimmed.len() > 1;
        let body = trimmed.trim_start_matches('+').trim_end_matches('+');

        if body.is_empty() {
            return Err(CoreError::InvalidSelector {
                selector: expression.to_string(),
                reason: "selector body cannot be empty".to_string(),
            });
        }

        let atom = if body == "git" {
            SelectorAtom::Git
        } else if let Some(prefix) = body.strip_suffix('/') {
            let segments: Vec<String> = prefix.split('.').map(String::from).collect();
            if segments.iter().any(|s| s.is_empty()) {
                return Err(CoreError::InvalidSelector {
                    selector: expression.to_string(),
                    reason: "empty schema segment".to_string(),
                });
            }
            SelectorAtom::Schema { segments }
        } else {
            let (id, audit) =
                TableRef::parse(body).map_err(|e| CoreError::InvalidSelector {
                    selector: expression.to_string(),
                    reason: e.to_string(),
                })?;
            if audit {
                return Err(CoreError::InvalidSelector {
                    selector: expression.to_string(),
                    reason: "audit tables cannot be selected directly".to_string(),
                });
            }
            SelectorAtom::Node { id }
        };

        Ok(Self {
            atom,
            ancestors,
            descendants,
        })
    }

    /// The set of nodes this atom matches, before expansion.
    fn matched(
        &self,
        dag: &ScriptDag,
        git_changed: Option<&HashSet<TableRef>>,
    ) -> CoreResult<Vec<TableRef>> {
        match &self.atom {
            SelectorAtom::Node { id } => {
                if !dag.contains(id) {
                    return Err(CoreError::ScriptNotFound { name: id.dotted() });
                }
                Ok(vec![id.clone()])
            }
            SelectorAtom::Schema { segments } => Ok(dag
                .nodes()
                .filter(|n| n.in_schema(segments))
                .cloned()
                .collect()),
            SelectorAtom::Git => match git_changed {
                Some(changed) => Ok(changed.iter().filter(|n| dag.contains(n)).cloned().collect()),
                None => Err(CoreError::InvalidSelector {
                    selector: "git".to_string(),
                    reason: "no git change resolver available".to_string(),
                }),
            },
        }
    }

    /// Resolve the atom against the DAG, applying `+` expansion.
    pub fn resolve(
        &self,
        dag: &ScriptDag,
        git_changed: Option<&HashSet<TableRef>>,
    ) -> CoreResult<BTreeSet<TableRef>> {
        let matched = self.matched(dag, git_changed)?;
        let mut selected: BTreeSet<TableRef> = matched.iter().cloned().collect();

        if self.ancestors {
            for node in &matched {
                selected.extend(dag.ancestors(node));
            }
        }
        if self.descendants {
            for node in &matched {
                selected.extend(dag.descendants(node));
            }
        }

        Ok(selected)
    }
}

/// Resolve the active set from select/unselect expression lists.
///
/// An empty select list means "everything". Assertion-test children of every
/// selected node are pulled in afterwards so their results gate promotion.
pub fn resolve_active_set(
    dag: &ScriptDag,
    select: &[String],
    unselect: &[String],
    git_changed: Option<&HashSet<TableRef>>,
) -> CoreResult<BTreeSet<TableRef>> {
    let mut active: BTreeSet<TableRef> = if select.is_empty() {
        dag.nodes().cloned().collect()
    } else {
        let mut set = BTreeSet::new();
        for expression in select {
            set.extend(Selector::parse(expression)?.resolve(dag, git_changed)?);
        }
        set
    };

    for expression in unselect {
        let removed = Selector::parse(expression)?.resolve(dag, git_changed)?;
        active.retain(|n| !removed.contains(n));
    }

    // Tests travel with their parents. They are dependents of the parent in
    // the graph, so this only ever adds leaves.
    let with_tests: Vec<TableRef> = active
        .iter()
        .flat_map(|n| dag.dependents(n))
        .filter(|d| {
            dag.script(d)
                .is_some_and(|s| s.kind == ScriptKind::TestAssertion)
        })
        .collect();
    active.extend(with_tests);

    Ok(active)
}

#[cfg(test)]
#[path = "selector_test.rs"]
mod tests;
