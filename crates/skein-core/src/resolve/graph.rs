//! Dependency graph over declarations.
//!
//! Design:
//! - Forward edges: node -> nodes it depends on (must be initialized first)
//! - Reverse edges: node -> nodes that depend on it
//! - Invariant: edges and reverse_edges must be kept in sync
//!
//! Nodes are declaration positions, so every iteration order below is the
//! source declaration order.

use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

#[derive(Debug, Default)]
pub struct DependencyGraph {
    edges: BTreeMap<usize, BTreeSet<usize>>,
    reverse_edges: BTreeMap<usize, BTreeSet<usize>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dependency: `node` depends on `depends_on`.
    ///
    /// Example: add_dependency(b, a) means "b waits for a"
    pub fn add_dependency(&mut self, node: usize, depends_on: usize) {
        self.edges.entry(node).or_default().insert(depends_on);
        self.reverse_edges
            .entry(depends_on)
            .or_default()
            .insert(node);
    }

    /// Nodes waiting for `node`, in declaration order.
    pub fn dependents(&self, node: usize) -> Vec<usize> {
        self.reverse_edges
            .get(&node)
            .map(|waiting| waiting.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn dependency_count(&self, node: usize) -> usize {
        self.edges.get(&node).map(BTreeSet::len).unwrap_or(0)
    }

    pub fn dependencies(&self, node: usize) -> Vec<usize> {
        self.edges
            .get(&node)
            .map(|deps| deps.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Detect a cycle among `nodes` with a three-color DFS.
    ///
    /// Returns the path of the first cycle found, closed by repeating its first
    /// node (`[a, b, a]`; a self-reference is `[a, a]`), or None for a DAG.
    pub fn detect_cycle<I>(&self, nodes: I) -> Option<Vec<usize>>
    where
        I: IntoIterator<Item = usize>,
    {
        let mut color: BTreeMap<usize, Color> = BTreeMap::new();
        for start in nodes {
            if color.get(&start).copied().unwrap_or(Color::White) != Color::White {
                continue;
            }
            let mut path = Vec::new();
            if let Some(cycle) = self.dfs_cycle(start, &mut color, &mut path) {
                return Some(cycle);
            }
        }
        None
    }

    fn dfs_cycle(
        &self,
        node: usize,
        color: &mut BTreeMap<usize, Color>,
        path: &mut Vec<usize>,
    ) -> Option<Vec<usize>> {
        color.insert(node, Color::Gray);
        path.push(node);
        for dep in self.dependencies(node) {
            match color.get(&dep).copied().unwrap_or(Color::White) {
                Color::Gray => {
                    let from = path.iter().position(|&n| n == dep).unwrap_or(0);
                    let mut cycle = path[from..].to_vec();
                    cycle.push(dep);
                    return Some(cycle);
                }
                Color::White => {
                    if let Some(cycle) = self.dfs_cycle(dep, color, path) {
                        return Some(cycle);
                    }
                }
                Color::Black => {}
            }
        }
        color.insert(node, Color::Black);
        path.pop();
        None
    }
}
