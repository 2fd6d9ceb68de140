//! Compound states: node/edge selections over the transition graph of two
//! existing states.

use crate::graph::{NodeLabel, Transition, existing_nodes_and_edges, selected_ranges};
use crate::runs::{Run, summarize_by_key};
use crate::table::Table;
use crate::types::{ComputationError, IndexRange, StateId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompoundState {
    /// The two combined states, A then B.
    pub states: [StateId; 2],
    /// Labels observed when the state was set up.
    #[serde(default)]
    pub possible_nodes: BTreeSet<NodeLabel>,
    /// Transitions observed when the state was set up, sentinels included.
    #[serde(default)]
    pub possible_edges: BTreeSet<Transition>,
    #[serde(default)]
    pub nodes: BTreeSet<NodeLabel>,
    #[serde(default)]
    pub edges: BTreeSet<Transition>,
}

impl CompoundState {
    /// A compound state with nothing possible and nothing selected.
    #[must_use]
    pub fn new(a: StateId, b: StateId) -> Self {
        Self {
            states: [a, b],
            possible_nodes: BTreeSet::new(),
            possible_edges: BTreeSet::new(),
            nodes: BTreeSet::new(),
            edges: BTreeSet::new(),
        }
    }

    /// A compound state whose possible nodes and edges are those observed in
    /// `table`, with nothing selected yet.
    pub fn for_table(a: StateId, b: StateId, table: &Table) -> Result<Self, ComputationError> {
        let runs = label_runs(table, &a, &b)?;
        let graph = existing_nodes_and_edges(&runs);
        Ok(Self {
            possible_edges: graph.edges_with_terminals(),
            possible_nodes: graph.nodes,
            ..Self::new(a, b)
        })
    }

    /// Replace the selection wholesale.
    #[must_use]
    pub fn with_selection(
        mut self,
        nodes: BTreeSet<NodeLabel>,
        edges: BTreeSet<Transition>,
    ) -> Self {
        self.nodes = nodes;
        self.edges = edges;
        self
    }

    /// Select or deselect a node.
    ///
    /// Selecting also selects every possible edge touching the node.
    /// Deselecting drops the selected edges left without a selected endpoint.
    #[must_use]
    pub fn toggle_node(&self, node: NodeLabel) -> Self {
        let mut next = self.clone();
        if next.nodes.insert(node) {
            next.edges = self
                .possible_edges
                .iter()
                .filter(|e| self.edges.contains(e) || e.touches(node))
                .copied()
                .collect();
            next.edges.extend(self.edges.iter().copied());
        } else {
            next.nodes.remove(&node);
            let nodes = &next.nodes;
            next.edges = self
                .edges
                .iter()
                .filter(|e| e.labels().any(|l| nodes.contains(&l)))
                .copied()
                .collect();
        }
        next
    }

    /// Select or deselect an edge.
    ///
    /// Selecting is ignored unless one endpoint is a selected node.
    /// Deselecting drops the selected nodes left without a selected edge.
    #[must_use]
    pub fn toggle_edge(&self, edge: Transition) -> Self {
        let mut next = self.clone();
        if !self.edges.contains(&edge) {
            if !edge.labels().any(|l| self.nodes.contains(&l)) {
                return next;
            }
            next.edges.insert(edge);
        } else {
            next.edges.remove(&edge);
            let edges = &next.edges;
            next.nodes = self
                .nodes
                .iter()
                .filter(|&&n| edges.iter().any(|e| e.touches(n)))
                .copied()
                .collect();
        }
        next
    }

    /// Runs of the two states' label in `table`.
    pub fn runs(&self, table: &Table) -> Result<Vec<Run<NodeLabel>>, ComputationError> {
        let [a, b] = &self.states;
        label_runs(table, a, b)
    }

    /// Ranges the current selection chooses (the highlight output).
    pub fn chosen_ranges(&self, table: &Table) -> Result<Vec<IndexRange>, ComputationError> {
        let runs = self.runs(table)?;
        Ok(selected_ranges(&runs, &self.nodes, &self.edges))
    }

    pub fn compute(&self, table: &Table) -> Result<Vec<bool>, ComputationError> {
        let ranges = self.chosen_ranges(table)?;
        Ok(super::membership(table, &ranges))
    }
}

/// Summarize `table` by the pair (A, B) into labelled runs.
pub fn label_runs(
    table: &Table,
    a: &StateId,
    b: &StateId,
) -> Result<Vec<Run<NodeLabel>>, ComputationError> {
    let a_values = table.boolean_column(a)?;
    let b_values = table.boolean_column(b)?;
    Ok(summarize_by_key(
        table
            .index_values()
            .iter()
            .zip(a_values.iter().zip(&b_values))
            .map(|(&index, (&a, &b))| (index, NodeLabel::from_pair(a, b))),
    ))
}
