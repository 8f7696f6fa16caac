//! Terminal display utilities for the CLI.
//!
//! Provides styled tables, progress bars and a small color theme.

pub mod progress;
pub mod tables;
pub mod theme;

pub use progress::{shard_progress_bar, with_spinner};
pub use tables::{
    TableBuilder, create_build_table, create_cluster_table, create_entity_table, create_hits_table,
};
pub use theme::{THEME, Theme};
