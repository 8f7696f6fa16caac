//! Completion manifests for strategy shard sets.
//!
//! The manifest is written after the last shard, so its presence is the
//! only signal that a strategy's shard set is complete.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::embedding::{EmbeddingShard, ShardIndex, StoreError, Strategy};
use crate::persist::{atomic_write, utc_timestamp};

/// Metadata describing one complete shard set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyManifest {
    /// Version of the manifest format
    pub version: u32,

    pub strategy: Strategy,

    /// Width of every stored vector
    pub dimension: usize,

    /// Rows per shard; the last shard may be shorter
    pub shard_size: usize,

    pub shard_count: usize,

    pub document_count: usize,

    /// Fingerprint of the corpus the shards were built from
    pub corpus_fingerprint: String,

    /// Identity of the encoder's vector space
    pub encoder_fingerprint: String,

    /// Unix timestamp when the build finished
    pub created_at: u64,
}

impl StrategyManifest {
    /// Current manifest version
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new(
        strategy: Strategy,
        dimension: usize,
        shard_size: usize,
        document_count: usize,
        corpus_fingerprint: impl Into<String>,
        encoder_fingerprint: impl Into<String>,
    ) -> Self {
        let shard_count = if shard_size == 0 {
            0
        } else {
            document_count.div_ceil(shard_size)
        };
        Self {
            version: Self::CURRENT_VERSION,
            strategy,
            dimension,
            shard_size,
            shard_count,
            document_count,
            corpus_fingerprint: corpus_fingerprint.into(),
            encoder_fingerprint: encoder_fingerprint.into(),
            created_at: utc_timestamp(),
        }
    }

    #[must_use]
    pub fn file_name(strategy: Strategy) -> String {
        format!("{strategy}.manifest.json")
    }

    #[must_use]
    pub fn path_for(directory: &Path, strategy: Strategy) -> PathBuf {
        directory.join(Self::file_name(strategy))
    }

    /// Save the manifest next to the shards
    pub fn save(&self, directory: &Path) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| StoreError::Serialization(format!("Failed to serialize manifest: {e}")))?;
        atomic_write(&Self::path_for(directory, self.strategy), json.as_bytes())?;
        Ok(())
    }

    /// Load a strategy's manifest.
    ///
    /// Returns `NotBuilt` when no manifest exists and `VersionMismatch` when
    /// it was written by another format version.
    pub fn load(directory: &Path, strategy: Strategy) -> Result<Self, StoreError> {
        let path = Self::path_for(directory, strategy);
        if !path.exists() {
            return Err(StoreError::NotBuilt(strategy));
        }

        let json = std::fs::read_to_string(&path)?;
        let manifest: Self = serde_json::from_str(&json).map_err(|e| {
            StoreError::Serialization(format!("Failed to parse {}: {e}", path.display()))
        })?;

        if manifest.version != Self::CURRENT_VERSION {
            return Err(StoreError::VersionMismatch {
                expected: Self::CURRENT_VERSION,
                actual: manifest.version,
            });
        }
        if manifest.strategy != strategy {
            return Err(StoreError::InvalidFormat {
                path: path.display().to_string(),
                reason: format!("manifest describes strategy '{}'", manifest.strategy),
            });
        }

        Ok(manifest)
    }

    /// Check if a manifest file exists
    #[must_use]
    pub fn exists(directory: &Path, strategy: Strategy) -> bool {
        Self::path_for(directory, strategy).exists()
    }

    /// Shard indices this manifest promises, in order.
    pub fn shard_indices(&self) -> impl Iterator<Item = ShardIndex> {
        (0..self.shard_count as u32).map(ShardIndex::new)
    }

    /// True when the manifest matches the given inputs and every promised
    /// shard file is present.
    #[must_use]
    pub fn is_current(
        &self,
        directory: &Path,
        corpus_fingerprint: &str,
        encoder_fingerprint: &str,
    ) -> bool {
        self.corpus_fingerprint == corpus_fingerprint
            && self.encoder_fingerprint == encoder_fingerprint
            && self
                .shard_indices()
                .all(|index| EmbeddingShard::path_for(directory, self.strategy, index).exists())
    }
}
