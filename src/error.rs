//! Crate-level error type.
//!
//! Each subsystem has its own `thiserror` enum; [`EngineError`] wraps them
//! for callers that drive the whole engine, and adds stable status codes for
//! JSON output.

use thiserror::Error;

use crate::cluster::ClusterError;
use crate::corpus::CorpusError;
use crate::embedding::StoreError;
use crate::graph::GraphError;

/// Main error type for engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Corpus(#[from] CorpusError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Configuration errors
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    #[error("Cluster model is disabled or has no sentence encoder")]
    ClusteringUnavailable,
}

impl From<Box<figment::Error>> for EngineError {
    fn from(error: Box<figment::Error>) -> Self {
        Self::Config {
            reason: error.to_string(),
        }
    }
}

impl EngineError {
    /// Get a stable status code for this error type.
    ///
    /// Returns a string identifier that can be used in JSON responses
    /// for programmatic error handling.
    pub fn status_code(&self) -> String {
        match self {
            Self::Corpus(_) => "CORPUS_ERROR",
            Self::Store(e) => match e {
                StoreError::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
                StoreError::EncoderMismatch { .. } => "ENCODER_MISMATCH",
                StoreError::NotBuilt(_) => "INDEX_NOT_BUILT",
                StoreError::VersionMismatch { .. } => "VERSION_MISMATCH",
                StoreError::UnknownStrategy(_) => "UNKNOWN_STRATEGY",
                StoreError::StrategyUnavailable { .. } => "STRATEGY_UNAVAILABLE",
                StoreError::EmbeddingFailed(_) => "EMBEDDING_FAILED",
                _ => "STORE_ERROR",
            },
            Self::Cluster(e) => match e {
                ClusterError::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
                ClusterError::VersionMismatch { .. } => "VERSION_MISMATCH",
                ClusterError::MissingArtifact(_) | ClusterError::StaleArtifact { .. } => {
                    "CLUSTER_MODEL_STALE"
                }
                _ => "CLUSTER_ERROR",
            },
            Self::Graph(_) => "GRAPH_ERROR",
            Self::Config { .. } => "CONFIG_ERROR",
            Self::ClusteringUnavailable => "CLUSTERING_UNAVAILABLE",
        }
        .to_string()
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::Store(StoreError::NotBuilt(_))
            | Self::Store(StoreError::VersionMismatch { .. })
            | Self::Cluster(ClusterError::VersionMismatch { .. }) => vec![
                "Run 'shahnameh build' to (re)build the index",
                "Delete the data directory if the problem persists",
            ],
            Self::Store(StoreError::DimensionMismatch { .. })
            | Self::Store(StoreError::EncoderMismatch { .. })
            | Self::Cluster(ClusterError::DimensionMismatch { .. }) => vec![
                "The encoder changed since the index was built",
                "Run 'shahnameh build' so shards and query vectors share one space",
            ],
            Self::Store(StoreError::StrategyUnavailable { .. }) => vec![
                "Set embeddings.word_vectors for the word-vector strategy",
                "Check embeddings.model and network access for the sentence strategy",
            ],
            Self::Corpus(_) => vec![
                "Check corpus.path in settings.toml",
                "The corpus CSV needs a header row with 'text' and 'labels' columns",
            ],
            Self::Graph(GraphError::Read { .. } | GraphError::Row { .. }) => vec![
                "Check the [[graph.entities]] paths in settings.toml",
                "Entity lists need a 'regex' column",
            ],
            Self::Config { .. } => vec![
                "Run 'shahnameh init --force' to regenerate the settings file",
            ],
            Self::ClusteringUnavailable => vec![
                "Set clustering.enabled = true and make sure the sentence model loads",
            ],
            _ => vec![],
        }
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
