//! Table formatting utilities for structured output.

use comfy_table::{
    Attribute, Cell, CellAlignment, Color, Row, Table, modifiers::UTF8_ROUND_CORNERS,
    presets::UTF8_FULL,
};

use crate::cluster::ClusterPrediction;
use crate::context::SearchHit;
use crate::embedding::{BuildOutcome, BuildReport};
use crate::graph::EntityMatch;

/// A rounded UTF-8 table with bold headers, filled row by row.
pub struct TableBuilder {
    table: Table,
}

impl TableBuilder {
    pub fn with_headers(headers: &[&str]) -> Self {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.apply_modifier(UTF8_ROUND_CORNERS);
        table.set_header(
            headers
                .iter()
                .map(|h| Cell::new(h).add_attribute(Attribute::Bold)),
        );
        Self { table }
    }

    /// Appends a row of strings or prepared cells.
    pub fn row(mut self, row: impl Into<Row>) -> Self {
        self.table.add_row(row);
        self
    }

    pub fn build(self) -> String {
        self.table.to_string()
    }
}

/// Ranked couplets, one per row.
pub fn create_hits_table(hits: &[SearchHit]) -> String {
    hits.iter()
        .enumerate()
        .fold(
            TableBuilder::with_headers(&["#", "Score", "Couplet", "Topic"]),
            |table, (rank, hit)| {
                let couplet = if hit.second_hemistich.is_empty() {
                    hit.first_hemistich.clone()
                } else {
                    format!("{}\n{}", hit.first_hemistich, hit.second_hemistich)
                };
                table.row(vec![
                    Cell::new(rank + 1),
                    Cell::new(format!("{:.4}", hit.score)).set_alignment(CellAlignment::Right),
                    Cell::new(couplet),
                    Cell::new(&hit.topic_label),
                ])
            },
        )
        .build()
}

/// Entities implied by a query with their centrality scores.
pub fn create_entity_table(entities: &[EntityMatch]) -> String {
    entities
        .iter()
        .fold(
            TableBuilder::with_headers(&["Entity", "Category", "PageRank", "Hub"]),
            |table, entity| {
                table.row(vec![
                    entity.name.clone(),
                    entity.category.clone(),
                    format!("{:.5}", entity.pagerank),
                    format!("{:.5}", entity.hub),
                ])
            },
        )
        .build()
}

/// The predicted cluster and its dominant topic labels.
pub fn create_cluster_table(prediction: &ClusterPrediction) -> String {
    let mut table = TableBuilder::with_headers(&["Cluster", "Label", "Documents"]);
    if prediction.top_labels.is_empty() {
        table = table.row(vec![
            prediction.cluster_id.to_string(),
            "-".to_string(),
            "0".to_string(),
        ]);
    }
    for label in &prediction.top_labels {
        table = table.row(vec![
            prediction.cluster_id.to_string(),
            label.label.clone(),
            label.count.to_string(),
        ]);
    }
    table.build()
}

/// Outcome of each strategy in a build.
pub fn create_build_table(report: &BuildReport) -> String {
    let mut table = TableBuilder::with_headers(&["Strategy", "Status", "Details"]);
    for build in &report.strategies {
        let (status, color, details) = match &build.outcome {
            BuildOutcome::Built { shards, documents } => (
                "built",
                Color::Green,
                format!("{documents} documents in {shards} shards"),
            ),
            BuildOutcome::Skipped => ("up to date", Color::Cyan, String::new()),
            BuildOutcome::Failed { reason } => ("failed", Color::Red, reason.clone()),
        };
        table = table.row(vec![
            Cell::new(build.strategy),
            Cell::new(status).fg(color).add_attribute(Attribute::Bold),
            Cell::new(details),
        ]);
    }
    table.build()
}
