//! The merged entity ranking table and query-time lookups.

use serde::{Deserialize, Serialize};

use crate::corpus::normalize;
use crate::graph::{
    CentralityOptions, CooccurrenceGraph, EntityPattern, GraphError, PresenceMatrix, hits,
    pagerank,
};

/// Parameters of one entity graph.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GraphOptions {
    pub window_size: usize,
    pub min_mentions: usize,
    pub centrality: CentralityOptions,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            window_size: 5,
            min_mentions: 1,
            centrality: CentralityOptions::default(),
        }
    }
}

/// One row of the ranking table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntity {
    pub name: String,
    pub pattern: String,
    pub mentions: usize,
    pub degree: usize,
    pub pagerank: f64,
    pub hub: f64,
    pub authority: f64,
}

/// An entity implied by a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityMatch {
    pub name: String,
    pub category: String,
    pub pagerank: f64,
    pub hub: f64,
}

/// Ranking of one entity category over the corpus.
#[derive(Debug, Clone)]
pub struct EntityRanker {
    category: String,
    /// Sorted by descending PageRank, ties in pattern order.
    table: Vec<RankedEntity>,
    /// Aligned with `table`.
    patterns: Vec<EntityPattern>,
    link_count: usize,
}

impl EntityRanker {
    /// Builds the presence matrix, the co-occurrence graph and both
    /// centrality tables, then merges them by entity.
    pub fn build(
        category: impl Into<String>,
        documents: &[&str],
        patterns: Vec<EntityPattern>,
        options: GraphOptions,
    ) -> Result<Self, GraphError> {
        let category = category.into();
        if options.window_size == 0 {
            return Err(GraphError::InvalidWindow(0));
        }

        let presence = PresenceMatrix::build(documents, patterns, options.min_mentions);
        let graph = CooccurrenceGraph::from_presence(&presence, options.window_size)?;
        let ranks = pagerank(&graph, options.centrality);
        let scores = hits(&graph, options.centrality);

        let mut rows: Vec<(RankedEntity, EntityPattern)> = presence
            .entities()
            .iter()
            .enumerate()
            .map(|(i, pattern)| {
                let entity = RankedEntity {
                    name: pattern.display_name().to_string(),
                    pattern: pattern.pattern().to_string(),
                    mentions: presence.mention_count(i),
                    degree: graph.neighbors(i).filter(|&n| n != i).count(),
                    pagerank: ranks[i],
                    hub: scores.hubs[i],
                    authority: scores.authorities[i],
                };
                (entity, pattern.clone())
            })
            .collect();
        rows.sort_by(|a, b| b.0.pagerank.total_cmp(&a.0.pagerank));

        let (table, patterns): (Vec<_>, Vec<_>) = rows.into_iter().unzip();

        tracing::info!(
            "Ranked {} '{category}' entities ({} links)",
            table.len(),
            graph.link_count()
        );

        Ok(Self {
            category,
            table,
            patterns,
            link_count: graph.link_count(),
        })
    }

    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    /// The full table in rank order.
    #[must_use]
    pub fn table(&self) -> &[RankedEntity] {
        &self.table
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Edges between distinct entities.
    #[must_use]
    pub fn link_count(&self) -> usize {
        self.link_count
    }

    /// Entities whose pattern occurs in the query, in rank order.
    #[must_use]
    pub fn query_ranks(&self, query: &str) -> Vec<EntityMatch> {
        let query = normalize(query);
        self.table
            .iter()
            .zip(&self.patterns)
            .filter(|(_, pattern)| pattern.is_match(&query))
            .map(|(entity, _)| EntityMatch {
                name: entity.name.clone(),
                category: self.category.clone(),
                pagerank: entity.pagerank,
                hub: entity.hub,
            })
            .collect()
    }

    /// Rows whose pattern text contains `fragment`.
    pub fn lookup<'a>(&'a self, fragment: &'a str) -> impl Iterator<Item = &'a RankedEntity> + 'a {
        self.table
            .iter()
            .filter(move |entity| entity.pattern.contains(fragment))
    }
}
