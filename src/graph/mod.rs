//! Co-occurrence Graph Ranking Engine.
//!
//! Entities (characters, places) are found in documents with curated
//! regexes. Entities mentioned near each other in the document sequence are
//! linked, and the resulting graph is scored with PageRank and HITS. At
//! query time every entity whose regex occurs in the query is reported with
//! its scores.
//!
//! Graphs are cheap to build and are rebuilt from the corpus on every start;
//! nothing here is persisted.

mod centrality;
mod cooccurrence;
mod patterns;
mod presence;
mod ranking;

pub use centrality::{CentralityOptions, HitsScores, hits, pagerank};
pub use cooccurrence::CooccurrenceGraph;
pub use patterns::{EntityPattern, compile_patterns, load_patterns};
pub use presence::PresenceMatrix;
pub use ranking::{EntityMatch, EntityRanker, GraphOptions, RankedEntity};

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading entity patterns or building graphs.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Window size must be at least 1, got {0}\nSuggestion: Set graph.window_size in settings.toml")]
    InvalidWindow(usize),

    #[error("Empty entity pattern")]
    EmptyPattern,

    #[error("Invalid entity pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },

    #[error("Failed to read entity list '{}': {source}", path.display())]
    Read { path: PathBuf, source: csv::Error },

    #[error(
        "Malformed row {row} in '{}': {source}\nSuggestion: Entity lists need a 'regex' column",
        path.display()
    )]
    Row {
        path: PathBuf,
        row: usize,
        source: csv::Error,
    },
}
