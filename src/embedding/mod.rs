//! Embedding Store: sharded, persisted document vectors per strategy.
//!
//! Four interchangeable strategies turn text into vectors:
//! - `lexical`: sublinear tf-idf over a fitted n-gram vocabulary
//! - `boolean`: term presence over the same vocabulary
//! - `word-vector`: idf-weighted mean of static word vectors
//! - `sentence`: a neural sentence encoder behind [`TextEncoder`]
//!
//! A build writes one shard per `shard_size` documents and a manifest last.
//! A strategy is reused only when its manifest matches the corpus and the
//! encoder, so an interrupted build is never mistaken for a finished one.

pub mod encoder;
mod manifest;
mod shard;
mod store;
mod strategy;
mod types;
mod vocabulary;
mod word_vectors;

pub use encoder::{FastEmbedEncoder, TextEncoder, parse_embedding_model};
pub use manifest::StrategyManifest;
pub use shard::{EmbeddingShard, SHARD_VERSION};
pub use store::{BuildOutcome, BuildReport, DEFAULT_SHARD_SIZE, EmbeddingStore, StrategyBuild};
pub use strategy::StrategyEncoder;
pub use types::{Score, ShardIndex, StoreError, Strategy, VectorDimension};
pub use vocabulary::{TermVocabulary, VOCABULARY_FILE, VocabularyOptions};
pub use word_vectors::StaticWordVectors;
