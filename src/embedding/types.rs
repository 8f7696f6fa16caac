//! Type-safe wrappers and the error type of the embedding store.
//!
//! Newtypes keep shard positions, widths and scores from being mixed up
//! with plain integers and floats as they move between build and query code.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Zero-based position of a shard within one strategy's shard sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShardIndex(u32);

impl ShardIndex {
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ShardIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:05}", self.0)
    }
}

/// Width of the vectors produced by one encoder.
///
/// Zero is legal: a lexical vocabulary fit on an empty corpus has no
/// features, and every score against such an index is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VectorDimension(usize);

impl VectorDimension {
    #[must_use]
    pub const fn new(dim: usize) -> Self {
        Self(dim)
    }

    #[must_use]
    pub const fn get(&self) -> usize {
        self.0
    }

    /// Validates that a vector has the expected width.
    pub fn validate_vector(&self, vector: &[f32]) -> Result<(), StoreError> {
        if vector.len() != self.0 {
            return Err(StoreError::DimensionMismatch {
                expected: self.0,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for VectorDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A cosine similarity score.
///
/// Never NaN, so it can be totally ordered. Values lie in [-1, 1] up to
/// the epsilon in the denominator.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct Score(f32);

impl Score {
    /// Creates a score, rejecting NaN.
    pub fn new(value: f32) -> Result<Self, StoreError> {
        if value.is_nan() {
            return Err(StoreError::InvalidScore {
                value,
                reason: "Score cannot be NaN",
            });
        }
        Ok(Self(value))
    }

    #[must_use]
    pub const fn zero() -> Self {
        Self(0.0)
    }

    #[must_use]
    pub fn get(&self) -> f32 {
        self.0
    }
}

impl Eq for Score {}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// The interchangeable text-to-vector encoding methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Strategy {
    /// Sublinear tf-idf over the fitted n-gram vocabulary.
    Lexical,
    /// 0/1 term presence over the same vocabulary.
    Boolean,
    /// Idf-weighted mean of static word vectors.
    WordVector,
    /// Mean-pooled output of a neural sentence encoder.
    Sentence,
}

impl Strategy {
    pub const ALL: [Strategy; 4] = [
        Strategy::Lexical,
        Strategy::Boolean,
        Strategy::WordVector,
        Strategy::Sentence,
    ];

    /// Identifier used in file names, settings and the CLI.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Strategy::Lexical => "lexical",
            Strategy::Boolean => "boolean",
            Strategy::WordVector => "word-vector",
            Strategy::Sentence => "sentence",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lexical" | "tfidf" => Ok(Strategy::Lexical),
            "boolean" | "bool" => Ok(Strategy::Boolean),
            "word-vector" | "word_vector" | "word" => Ok(Strategy::WordVector),
            "sentence" | "sent" => Ok(Strategy::Sentence),
            other => Err(StoreError::UnknownStrategy(other.to_string())),
        }
    }
}

impl serde::Serialize for Strategy {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for Strategy {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Errors that can occur while building or reading the embedding store.
///
/// All error messages include actionable suggestions for resolution.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error(
        "Vector dimension mismatch: expected {expected}, got {actual}\nSuggestion: The encoder changed since the index was built; run 'shahnameh build' again"
    )]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid score value: {value}\nReason: {reason}")]
    InvalidScore { value: f32, reason: &'static str },

    #[error(
        "Unknown strategy '{0}'\nSuggestion: Use one of lexical, boolean, word-vector, sentence"
    )]
    UnknownStrategy(String),

    #[error(
        "Strategy '{strategy}' is not available: {reason}\nSuggestion: Check the [embeddings] section of settings.toml"
    )]
    StrategyUnavailable { strategy: Strategy, reason: String },

    #[error(
        "Index for strategy '{strategy}' was built with encoder '{indexed}', not '{current}'\nSuggestion: Run 'shahnameh build' so the index and queries share one space"
    )]
    EncoderMismatch {
        strategy: Strategy,
        indexed: String,
        current: String,
    },

    #[error("Index for strategy '{0}' has not been built\nSuggestion: Run 'shahnameh build'")]
    NotBuilt(Strategy),

    #[error("Storage error: {0}\nSuggestion: Check disk space and file permissions")]
    Storage(#[from] std::io::Error),

    #[error("Invalid shard file '{path}': {reason}\nSuggestion: Delete the file and rebuild")]
    InvalidFormat { path: String, reason: String },

    #[error(
        "Embedding generation failed: {0}\nSuggestion: Verify the embedding model is properly initialized"
    )]
    EmbeddingFailed(String),

    #[error(
        "Serialization error: {0}\nSuggestion: Check that the artifact is valid and not corrupted"
    )]
    Serialization(String),

    #[error(
        "Invalid storage version: expected {expected}, got {actual}\nSuggestion: Rebuild the index with this version of shahnameh"
    )]
    VersionMismatch { expected: u32, actual: u32 },

    #[error("Failed to load word vectors from '{path}': {reason}")]
    WordVectors { path: String, reason: String },
}
