//! Progress indicators for shard builds and model loading.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::embedding::Strategy;

/// A bar counting the shards of one strategy's build.
pub fn shard_progress_bar(strategy: Strategy, shards: usize) -> ProgressBar {
    let pb = ProgressBar::new(shards as u64);
    let style = ProgressStyle::default_bar()
        .template("{prefix:>12.cyan.bold} [{bar:40.cyan/blue}] {pos}/{len} shards {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb.set_prefix(strategy.as_str());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Shows a spinner on stderr while `operation` runs.
pub fn with_spinner<F, T>(message: &str, operation: F) -> T
where
    F: FnOnce() -> T,
{
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));

    let result = operation();
    spinner.finish_and_clear();
    result
}
