//! DAG building and topological traversal.

use crate::error::{CoreError, CoreResult};
use crate::script::Script;
use crate::table_ref::TableRef;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, HashSet};

/// A directed acyclic graph of script dependencies.
///
/// Nodes are keyed by [`TableRef`] and carry their [`Script`]. Edges point
/// from a dependency to its dependents, so a topological sort yields
/// dependencies first.
#[derive(Debug)]
pub struct ScriptDag {
    graph: DiGraph<TableRef, ()>,
    node_map: HashMap<TableRef, NodeIndex>,
    scripts: HashMap<TableRef, Script>,
}

impl ScriptDag {
    /// Build the DAG from a set of parsed scripts.
    ///
    /// Dependency edges are materialised only for references that another
    /// script in the set produces. Rejects duplicate ids and cycles.
    pub fn build(scripts: Vec<Script>) -> CoreResult<Self> {
        let mut graph = DiGraph::new();
        let mut node_map: HashMap<TableRef, NodeIndex> = HashMap::new();
        let mut by_id: HashMap<TableRef, Script> = HashMap::new();

        for script in scripts {
            if let Some(existing) = by_id.get(&script.id) {
                return Err(CoreError::DuplicateScript {
                    id: script.id.dotted(),
                    path: existing.path.display().to_string(),
                });
            }
            let idx = graph.add_node(script.id.clone());
            node_map.insert(script.id.clone(), idx);
            by_id.insert(script.id.clone(), script);
        }

        for script in by_id.values() {
            // Safety: every script id was inserted above
            let Some(&to) = node_map.get(&script.id) else {
                continue;
            };
            for dep in &script.dependencies {
                if let Some(&from) = node_map.get(dep) {
                    graph.add_edge(from, to, ());
                }
            }
        }

        let dag = Self {
            graph,
            node_map,
            scripts: by_id,
        };
        dag.validate()?;
        Ok(dag)
    }

    /// Validate acyclicity, reporting one cycle on failure.
    pub fn validate(&self) -> CoreResult<()> {
        match toposort(&self.graph, None) {
            Ok(_) => Ok(()),
            Err(cycle) => Err(CoreError::CircularDependency {
                cycle: self.find_cycle_path(cycle.node_id()),
            }),
        }
    }

    /// Follow edges from a node known to sit on a cycle, producing a
    /// readable `a -> b -> a` path for the error message.
    fn find_cycle_path(&self, start: NodeIndex) -> String {
        let mut path: Vec<String> = vec![self.graph[start].dotted()];
        let mut current = start;
        let mut visited = HashSet::new();
        visited.insert(current);

        while let Some(edge) = self.graph.edges(current).next() {
            let target = edge.target();
            path.push(self.graph[target].dotted());
            if target == start || visited.contains(&target) {
                break;
            }
            visited.insert(target);
            current = target;
        }

        path.join(" -> ")
    }

    /// All nodes in topological order (dependencies first).
    pub fn topological_order(&self) -> CoreResult<Vec<TableRef>> {
        match toposort(&self.graph, None) {
            Ok(indices) => Ok(indices
                .into_iter()
                .map(|idx| self.graph[idx].clone())
                .collect()),
            Err(cycle) => Err(CoreError::CircularDependency {
                cycle: self.find_cycle_path(cycle.node_id()),
            }),
        }
    }

    /// Direct dependencies of a node.
    pub fn dependencies(&self, id: &TableRef) -> Vec<TableRef> {
        self.neighbors(id, petgraph::Direction::Incoming)
    }

    /// Direct dependents of a node.
    pub fn dependents(&self, id: &TableRef) -> Vec<TableRef> {
        self.neighbors(id, petgraph::Direction::Outgoing)
    }

    fn neighbors(&self, id: &TableRef, dir: petgraph::Direction) -> Vec<TableRef> {
        match self.node_map.get(id) {
            Some(&idx) => self
                .graph
                .edges_directed(idx, dir)
                .map(|e| match dir {
                    petgraph::Direction::Incoming => self.graph[e.source()].clone(),
                    petgraph::Direction::Outgoing => self.graph[e.target()].clone(),
                })
                .collect(),
            None => Vec::new(),
        }
    }

    /// All transitive dependencies of a node.
    pub fn ancestors(&self, id: &TableRef) -> Vec<TableRef> {
        self.walk(id, petgraph::Direction::Incoming)
    }

    /// All transitive dependents of a node.
    pub fn descendants(&self, id: &TableRef) -> Vec<TableRef> {
        self.walk(id, petgraph::Direction::Outgoing)
    }

    fn walk(&self, id: &TableRef, dir: petgraph::Direction) -> Vec<TableRef> {
        let mut result = Vec::new();
        let mut visited = HashSet::new();
        let Some(&start) = self.node_map.get(id) else {
            return result;
        };
        let mut stack = vec![start];
        visited.insert(start);

        while let Some(idx) = stack.pop() {
            for edge in self.graph.edges_directed(idx, dir) {
                let next = match dir {
                    petgraph::Direction::Incoming => edge.source(),
                    petgraph::Direction::Outgoing => edge.target(),
                };
                if visited.insert(next) {
                    result.push(self.graph[next].clone());
                    stack.push(next);
                }
            }
        }

        result
    }

    /// Look up a node's script.
    pub fn script(&self, id: &TableRef) -> Option<&Script> {
        self.scripts.get(id)
    }

    /// Whether the DAG contains a node.
    pub fn contains(&self, id: &TableRef) -> bool {
        self.node_map.contains_key(id)
    }

    /// All node ids, in arbitrary order.
    pub fn nodes(&self) -> impl Iterator<Item = &TableRef> {
        self.scripts.keys()
    }

    /// All scripts, in arbitrary order.
    pub fn scripts(&self) -> impl Iterator<Item = &Script> {
        self.scripts.values()
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    /// Whether the DAG is empty.
    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }
}

#[cfg(test)]
#[path = "dag_test.rs"]
mod tests;
