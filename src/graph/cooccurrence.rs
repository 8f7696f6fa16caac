//! Windowed co-occurrence graph.
//!
//! The document sequence is cut into consecutive windows of `window_size`
//! twice: once from the first document, and once shifted by half a window
//! so that a pair split by a window boundary in the first cut still meets
//! in the second. Two entities are linked when both are mentioned somewhere
//! in the same window of either cut. Edges are unweighted and undirected.
//!
//! Every entity also carries a self-loop: it shares a window with itself.
//! A loop counts once toward the node's degree, like a 1 on the diagonal
//! of the adjacency matrix.

use std::collections::{BTreeMap, BTreeSet};

use crate::graph::{GraphError, PresenceMatrix};

/// Undirected, unweighted graph over the entities of a presence matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CooccurrenceGraph {
    neighbors: Vec<BTreeSet<usize>>,
}

impl CooccurrenceGraph {
    /// Builds the graph from both windowings.
    pub fn from_presence(presence: &PresenceMatrix, window_size: usize) -> Result<Self, GraphError> {
        if window_size == 0 {
            return Err(GraphError::InvalidWindow(window_size));
        }

        let mut graph = Self::with_nodes(presence.len());
        for entity in 0..presence.len() {
            graph.add_edge(entity, entity);
        }
        for shift in [0, window_size / 2] {
            let mut windows: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
            for entity in 0..presence.len() {
                let touched: BTreeSet<usize> = presence
                    .documents_of(entity)
                    .map(|doc| (doc + shift) / window_size)
                    .collect();
                for window in touched {
                    windows.entry(window).or_default().push(entity);
                }
            }

            for members in windows.values() {
                for (i, &a) in members.iter().enumerate() {
                    for &b in &members[i + 1..] {
                        graph.add_edge(a, b);
                    }
                }
            }
        }

        tracing::debug!(
            "Co-occurrence graph: {} nodes, {} links (window {window_size})",
            graph.node_count(),
            graph.link_count()
        );
        Ok(graph)
    }

    /// A graph of isolated nodes.
    #[must_use]
    pub fn with_nodes(nodes: usize) -> Self {
        Self {
            neighbors: vec![BTreeSet::new(); nodes],
        }
    }

    /// Links two nodes; `a == b` adds a self-loop.
    pub fn add_edge(&mut self, a: usize, b: usize) {
        self.neighbors[a].insert(b);
        self.neighbors[b].insert(a);
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.neighbors.len()
    }

    /// Undirected edges, self-loops included.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        let ends: usize = self.neighbors.iter().map(BTreeSet::len).sum();
        (ends + self.loop_count()) / 2
    }

    #[must_use]
    pub fn loop_count(&self) -> usize {
        self.neighbors
            .iter()
            .enumerate()
            .filter(|(node, n)| n.contains(node))
            .count()
    }

    /// Edges between distinct nodes.
    #[must_use]
    pub fn link_count(&self) -> usize {
        self.edge_count() - self.loop_count()
    }

    #[must_use]
    pub fn has_edge(&self, a: usize, b: usize) -> bool {
        self.neighbors.get(a).is_some_and(|n| n.contains(&b))
    }

    #[must_use]
    pub fn degree(&self, node: usize) -> usize {
        self.neighbors[node].len()
    }

    pub fn neighbors(&self, node: usize) -> impl Iterator<Item = usize> + '_ {
        self.neighbors[node].iter().copied()
    }
}
