//! Cluster Assignment Engine.
//!
//! Document embeddings are reduced with PCA and partitioned with k-means.
//! Each cluster is described by the topic labels most common among its
//! documents, and a query is described by the cluster it lands in.

mod engine;
mod kmeans;
mod model;
mod pca;

pub use engine::{ClusterEngine, ClusterPrediction};
pub use kmeans::{KMeansModel, KMeansOptions};
pub use model::{
    ARTIFACT_VERSION, ArtifactSource, CLUSTER_IDS_FILE, ClusterModel, ClusterOptions, EMBEDDINGS_FILE,
    KMEANS_FILE, LabelCount, PCA_FILE, SUMMARY_LABELS, summarize_labels,
};
pub use pca::PcaProjection;

use std::path::PathBuf;

use thiserror::Error;

use crate::embedding::StoreError;

/// Errors that can occur while fitting, loading or querying cluster models.
#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("No vectors to cluster")]
    EmptyInput,

    #[error("Invalid cluster count: {0}\nSuggestion: Set clustering.k to at least 1")]
    InvalidClusterCount(usize),

    #[error(
        "Dimension mismatch: expected {expected}, got {actual}\nSuggestion: The sentence encoder changed since the model was fit; run 'shahnameh build'"
    )]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Got {embeddings} embeddings for {documents} documents")]
    RowCountMismatch { documents: usize, embeddings: usize },

    #[error("Missing cluster artifact '{}'", .0.display())]
    MissingArtifact(PathBuf),

    #[error("Cluster artifact '{artifact}' is stale: {reason}")]
    StaleArtifact {
        artifact: String,
        reason: &'static str,
    },

    #[error(
        "Cluster artifact '{artifact}' has format version {actual}, expected {expected}\nSuggestion: Delete the clustering directory and rebuild"
    )]
    VersionMismatch {
        artifact: String,
        expected: u32,
        actual: u32,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage error: {0}\nSuggestion: Check disk space and file permissions")]
    Storage(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}
