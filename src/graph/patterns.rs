//! Entity patterns: externally curated regexes naming characters or places.

use std::path::Path;

use regex::Regex;
use serde::Deserialize;

use crate::corpus::normalize_pattern;
use crate::graph::GraphError;

/// A compiled entity regex.
///
/// The pattern is normalized like documents are, and its display name is the
/// text before the first `|` (the first spelling of the name).
#[derive(Debug, Clone)]
pub struct EntityPattern {
    pattern: String,
    display_name: String,
    regex: Regex,
}

impl PartialEq for EntityPattern {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

impl EntityPattern {
    pub fn new(raw: &str) -> Result<Self, GraphError> {
        let pattern = normalize_pattern(raw);
        if pattern.is_empty() {
            return Err(GraphError::EmptyPattern);
        }

        let regex = Regex::new(&pattern).map_err(|source| GraphError::InvalidPattern {
            pattern: pattern.clone(),
            source,
        })?;
        let display_name = pattern
            .split('|')
            .next()
            .unwrap_or(&pattern)
            .trim()
            .to_string();

        Ok(Self {
            pattern,
            display_name,
            regex,
        })
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Regex search anywhere in `text`, not a full match.
    #[must_use]
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// Compiles patterns in order, skipping invalid ones with a warning.
pub fn compile_patterns<I, S>(raw: I) -> Vec<EntityPattern>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter()
        .filter_map(|raw| match EntityPattern::new(raw.as_ref()) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                tracing::warn!("Skipping entity pattern: {e}");
                None
            }
        })
        .collect()
}

#[derive(Deserialize)]
struct PatternRow {
    regex: String,
}

/// Loads a CSV file with a `regex` column.
pub fn load_patterns(path: impl AsRef<Path>) -> Result<Vec<EntityPattern>, GraphError> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|source| GraphError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    let mut raw = Vec::new();
    for (row, record) in reader.deserialize::<PatternRow>().enumerate() {
        let record = record.map_err(|source| GraphError::Row {
            path: path.to_path_buf(),
            row: row + 1,
            source,
        })?;
        raw.push(record.regex);
    }

    let patterns = compile_patterns(raw);
    tracing::info!(
        "Loaded {} entity patterns from {}",
        patterns.len(),
        path.display()
    );
    Ok(patterns)
}
