//! Initialization order of top-level declarations.
//!
//! Kahn's algorithm with a min-heap keyed by declaration position, so any two
//! declarations without an ordering constraint keep their source order and
//! the result is identical on every run.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use tracing::debug;

use super::graph::DependencyGraph;
use crate::domain::{DeclHeader, DeclKind, ResolveError};

/// The resolved order: declaration positions, functions first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitOrder {
    positions: Vec<usize>,
    names: Vec<String>,
}

impl InitOrder {
    /// Positions into the slice passed to [`resolve`].
    pub fn positions(&self) -> &[usize] {
        &self.positions
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Resolve the initialization order of `decls`.
///
/// - Functions are hoisted in declaration order; their bodies add no edges.
/// - A variable comes after every declared name its initializer references.
/// - Names that are not declared here (builtins, imports) are ignored.
/// - Any cycle, including a variable referencing itself, is an error and no
///   partial order is returned.
pub fn resolve(decls: &[DeclHeader]) -> Result<InitOrder, ResolveError> {
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(decls.len());
    for (pos, decl) in decls.iter().enumerate() {
        if index.insert(decl.name(), pos).is_some() {
            return Err(ResolveError::DuplicateDeclaration(decl.name().to_string()));
        }
    }

    let mut positions: Vec<usize> = decls
        .iter()
        .enumerate()
        .filter(|(_, d)| d.kind() == DeclKind::Function)
        .map(|(pos, _)| pos)
        .collect();

    let mut graph = DependencyGraph::new();
    let variables: Vec<usize> = decls
        .iter()
        .enumerate()
        .filter(|(_, d)| d.kind() == DeclKind::Variable)
        .map(|(pos, _)| pos)
        .collect();

    for &pos in &variables {
        for name in decls[pos].references() {
            match index.get(name) {
                Some(&dep) if decls[dep].kind() == DeclKind::Variable => {
                    graph.add_dependency(pos, dep);
                }
                Some(_) => {}
                None => debug!(decl = decls[pos].name(), name, "ignoring undeclared reference"),
            }
        }
    }

    let mut remaining: HashMap<usize, usize> = variables
        .iter()
        .map(|&pos| (pos, graph.dependency_count(pos)))
        .collect();
    let mut ready: BinaryHeap<Reverse<usize>> = variables
        .iter()
        .filter(|&&pos| remaining[&pos] == 0)
        .map(|&pos| Reverse(pos))
        .collect();

    while let Some(Reverse(pos)) = ready.pop() {
        positions.push(pos);
        remaining.remove(&pos);
        for waiting in graph.dependents(pos) {
            if let Some(count) = remaining.get_mut(&waiting) {
                *count -= 1;
                if *count == 0 {
                    ready.push(Reverse(waiting));
                }
            }
        }
    }

    if !remaining.is_empty() {
        let mut stuck: Vec<usize> = remaining.into_keys().collect();
        stuck.sort_unstable();
        let cycle = graph
            .detect_cycle(stuck.iter().copied())
            .unwrap_or(stuck);
        let members = cycle
            .into_iter()
            .map(|pos| decls[pos].name().to_string())
            .collect();
        return Err(ResolveError::Cycle { members });
    }

    let names: Vec<String> = positions
        .iter()
        .map(|&pos| decls[pos].name().to_string())
        .collect();
    debug!(order = ?names, "resolved global declaration order");
    Ok(InitOrder { positions, names })
}
