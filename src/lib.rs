//! Multi-signal verse search over the Shahnameh.
//!
//! A labeled corpus of couplets is embedded under several strategies into
//! sharded vector files, clustered into topics, and scanned for characters
//! and places whose co-occurrence graph is ranked by centrality. A
//! [`SearchContext`] runs every offline build and answers queries.

pub mod cluster;
pub mod config;
pub mod context;
pub mod corpus;
pub mod display;
pub mod embedding;
pub mod error;
pub mod graph;
pub mod persist;
pub mod search;

// Explicit exports for better API clarity
pub use cluster::{ClusterEngine, ClusterError, ClusterPrediction};
pub use config::Settings;
pub use context::{
    RetrieveResponse, SearchContext, SearchContextBuilder, SearchHit, StrategyHits,
    UnavailableStrategy,
};
pub use corpus::{Corpus, CorpusError, Document, DocumentId};
pub use embedding::{EmbeddingStore, StoreError, Strategy, StrategyEncoder, TextEncoder};
pub use error::{EngineError, EngineResult};
pub use graph::{EntityMatch, EntityRanker, GraphError};
pub use search::SimilarityHit;
