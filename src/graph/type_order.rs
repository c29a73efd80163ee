// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Type ordering with deterministic cycle breaking.
//!
//! Declared type edges (`meta_routing.dst_types`) routinely contain cycles:
//! a cache type may route back to the type that feeds it. The presentation
//! layer still needs one layer index per type, so a cycle is never an error
//! here. Instead the order is resolved by repeating:
//!
//! 1. Attempt a depth-first topological sort.
//! 2. On a cycle, the sort reports the node it re-entered.
//! 3. Remove the **first edge in input order whose destination is that node**.
//!
//! The tie-break is simple and reproducible, not a minimum feedback edge set.
//!
//! ## Sort order
//! Nodes are visited in reverse input order and each node's successors in
//! reverse insertion order; a node is placed once everything reachable from
//! it is placed. For an acyclic graph with no constraints between two types,
//! the one declared first therefore appears first.
//!
//! **Time Complexity**: O(C · (V + E)) where C = edges removed to break cycles

use std::collections::{HashMap, HashSet};

use crate::errors::GraphError;
use crate::graph::{TypeId, TypeNode, TypeOrder, TypeRank};
use crate::observability::messages::graph::CycleEdgeRemoved;
use crate::observability::messages::StructuredLog;

/// A declared `from -> to` successor edge between types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeEdge {
    pub from: TypeId,
    pub to: TypeId,
}

impl TypeEdge {
    pub fn new(from: impl Into<TypeId>, to: impl Into<TypeId>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// All successor edges declared by `types`, in declaration order.
pub fn declared_edges(types: &[TypeNode]) -> Vec<TypeEdge> {
    types
        .iter()
        .flat_map(|t| t.successors.iter().map(move |&to| TypeEdge { from: t.id, to }))
        .collect()
}

/// Resolve a total order over `types`, breaking any cycles in `edges`.
///
/// # Errors
/// * [`GraphError::UnknownSuccessorType`] if an edge names an undeclared type.
/// * [`GraphError::CycleUnresolvable`] if a reported cycle node has no
///   incoming edge left to remove (internal inconsistency).
pub fn resolve_type_order(types: &[TypeNode], edges: &[TypeEdge]) -> Result<TypeOrder, GraphError> {
    let nodes: Vec<TypeId> = types.iter().map(|t| t.id).collect();
    let declared: HashSet<TypeId> = nodes.iter().copied().collect();

    for edge in edges {
        for endpoint in [edge.from, edge.to] {
            if !declared.contains(&endpoint) {
                return Err(GraphError::UnknownSuccessorType {
                    type_id: edge.from,
                    missing: endpoint,
                });
            }
        }
    }

    let mut remaining = edges.to_vec();
    let sorted = loop {
        match depth_first_sort(&nodes, &remaining) {
            Ok(sorted) => break sorted,
            Err(cycle_node) => {
                let position = remaining
                    .iter()
                    .position(|edge| edge.to == cycle_node)
                    .ok_or(GraphError::CycleUnresolvable { node: cycle_node })?;
                let removed = remaining.remove(position);
                CycleEdgeRemoved {
                    cycle_node: cycle_node.0,
                    from: removed.from.0,
                    to: removed.to.0,
                }
                .log();
            }
        }
    };

    let names: HashMap<TypeId, &str> = types.iter().map(|t| (t.id, t.name.as_str())).collect();
    Ok(TypeOrder(
        sorted
            .into_iter()
            .enumerate()
            .map(|(order, id)| TypeRank {
                id,
                name: names.get(&id).copied().unwrap_or_default().to_string(),
                order,
            })
            .collect(),
    ))
}

/// One sort attempt. `Err` carries the node that closed a cycle.
fn depth_first_sort(nodes: &[TypeId], edges: &[TypeEdge]) -> Result<Vec<TypeId>, TypeId> {
    let mut successors: HashMap<TypeId, Vec<TypeId>> = HashMap::new();
    for edge in edges {
        let targets = successors.entry(edge.from).or_default();
        if !targets.contains(&edge.to) {
            targets.push(edge.to);
        }
    }

    let mut state = SortState {
        successors: &successors,
        visited: HashSet::with_capacity(nodes.len()),
        placed: Vec::with_capacity(nodes.len()),
    };

    for &node in nodes.iter().rev() {
        if !state.visited.contains(&node) {
            let mut path = HashSet::new();
            state.visit(node, &mut path)?;
        }
    }

    // Nodes are placed after everything they reach, so reverse for the order.
    state.placed.reverse();
    Ok(state.placed)
}

struct SortState<'a> {
    successors: &'a HashMap<TypeId, Vec<TypeId>>,
    visited: HashSet<TypeId>,
    placed: Vec<TypeId>,
}

impl SortState<'_> {
    fn visit(&mut self, node: TypeId, path: &mut HashSet<TypeId>) -> Result<(), TypeId> {
        if path.contains(&node) {
            return Err(node);
        }
        if !self.visited.insert(node) {
            return Ok(());
        }

        let successors = self.successors;
        if let Some(children) = successors.get(&node) {
            path.insert(node);
            for &child in children.iter().rev() {
                self.visit(child, path)?;
            }
            path.remove(&node);
        }

        self.placed.push(node);
        Ok(())
    }
}
