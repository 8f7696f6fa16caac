//! PageRank and HITS over a co-occurrence graph.
//!
//! Both are plain power iterations with fixed, documented constants. Every
//! node gets a score, including isolated ones.

use serde::{Deserialize, Serialize};

use crate::graph::CooccurrenceGraph;

/// Iteration parameters shared by both algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CentralityOptions {
    /// PageRank damping factor.
    pub damping: f64,
    pub max_iter: usize,
    /// Stop once the L1 change between iterations drops below this.
    pub tolerance: f64,
}

impl Default for CentralityOptions {
    fn default() -> Self {
        Self {
            damping: 0.9,
            max_iter: 1000,
            tolerance: 1e-10,
        }
    }
}

/// PageRank scores, summing to 1.
///
/// Each edge is followed in both directions and a self-loop keeps a share
/// of a node's rank on itself. The rank held by nodes without any edge is
/// spread evenly over all nodes.
#[must_use]
pub fn pagerank(graph: &CooccurrenceGraph, options: CentralityOptions) -> Vec<f64> {
    let n = graph.node_count();
    if n == 0 {
        return Vec::new();
    }

    let uniform = 1.0 / n as f64;
    let mut rank = vec![uniform; n];

    for iteration in 0..options.max_iter {
        let dangling: f64 = (0..n)
            .filter(|&node| graph.degree(node) == 0)
            .map(|node| rank[node])
            .sum();
        let base = (1.0 - options.damping) * uniform + options.damping * dangling * uniform;

        let mut next = vec![base; n];
        for (node, &score) in rank.iter().enumerate() {
            let degree = graph.degree(node);
            if degree == 0 {
                continue;
            }
            let share = options.damping * score / degree as f64;
            for neighbor in graph.neighbors(node) {
                next[neighbor] += share;
            }
        }

        let change: f64 = next.iter().zip(&rank).map(|(a, b)| (a - b).abs()).sum();
        rank = next;
        if change < options.tolerance {
            tracing::trace!("PageRank converged after {} iterations", iteration + 1);
            return rank;
        }
    }

    tracing::warn!(
        "PageRank stopped at the iteration cap ({})",
        options.max_iter
    );
    rank
}

/// Hub and authority scores, each summing to 1.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HitsScores {
    pub hubs: Vec<f64>,
    pub authorities: Vec<f64>,
}

/// HITS from a uniform start.
///
/// On an undirected graph hubs and authorities coincide. A graph without
/// edges gets uniform scores.
#[must_use]
pub fn hits(graph: &CooccurrenceGraph, options: CentralityOptions) -> HitsScores {
    let n = graph.node_count();
    if n == 0 {
        return HitsScores {
            hubs: Vec::new(),
            authorities: Vec::new(),
        };
    }
    if graph.edge_count() == 0 {
        let uniform = vec![1.0 / n as f64; n];
        return HitsScores {
            hubs: uniform.clone(),
            authorities: uniform,
        };
    }

    let spread = |scores: &[f64]| -> Vec<f64> {
        (0..n)
            .map(|node| graph.neighbors(node).map(|m| scores[m]).sum())
            .collect()
    };

    let mut hubs = vec![1.0 / n as f64; n];
    let mut authorities = hubs.clone();

    for iteration in 0..options.max_iter {
        authorities = spread(&hubs);
        let mut next = spread(&authorities);
        normalize_max(&mut next);
        normalize_max(&mut authorities);

        let change: f64 = next.iter().zip(&hubs).map(|(a, b)| (a - b).abs()).sum();
        hubs = next;
        if change < options.tolerance {
            tracing::trace!("HITS converged after {} iterations", iteration + 1);
            break;
        }
    }

    normalize_sum(&mut hubs);
    normalize_sum(&mut authorities);
    HitsScores { hubs, authorities }
}

fn normalize_max(scores: &mut [f64]) {
    let max = scores.iter().copied().fold(0.0f64, f64::max);
    if max > 0.0 {
        scores.iter_mut().for_each(|s| *s /= max);
    }
}

fn normalize_sum(scores: &mut [f64]) {
    let total: f64 = scores.iter().sum();
    if total > 0.0 {
        scores.iter_mut().for_each(|s| *s /= total);
    }
}
