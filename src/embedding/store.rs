//! Building and serving sharded embeddings for every strategy.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::corpus::Corpus;
use crate::display::progress::shard_progress_bar;
use crate::embedding::{
    EmbeddingShard, ShardIndex, StoreError, Strategy, StrategyEncoder, StrategyManifest,
};

/// Default number of documents per shard.
pub const DEFAULT_SHARD_SIZE: usize = 5000;

/// What happened to one strategy during a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BuildOutcome {
    Built { shards: usize, documents: usize },
    /// A complete, current shard set was already on disk.
    Skipped,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrategyBuild {
    pub strategy: Strategy,
    pub outcome: BuildOutcome,
}

/// Per-strategy results of [`EmbeddingStore::build`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub strategies: Vec<StrategyBuild>,
}

impl BuildReport {
    #[must_use]
    pub fn outcome(&self, strategy: Strategy) -> Option<&BuildOutcome> {
        self.strategies
            .iter()
            .find(|s| s.strategy == strategy)
            .map(|s| &s.outcome)
    }

    /// Strategies whose build failed, with the reason.
    pub fn failures(&self) -> impl Iterator<Item = (Strategy, &str)> {
        self.strategies.iter().filter_map(|s| match &s.outcome {
            BuildOutcome::Failed { reason } => Some((s.strategy, reason.as_str())),
            _ => None,
        })
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// On-disk home of every strategy's shards, manifests and fit artifacts.
#[derive(Debug, Clone)]
pub struct EmbeddingStore {
    directory: PathBuf,
    shard_size: usize,
    show_progress: bool,
}

impl EmbeddingStore {
    pub fn new(directory: impl Into<PathBuf>, shard_size: usize) -> Self {
        Self {
            directory: directory.into(),
            shard_size: shard_size.max(1),
            show_progress: false,
        }
    }

    /// Draw a terminal progress bar per strategy while building.
    #[must_use]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    #[must_use]
    pub fn shard_size(&self) -> usize {
        self.shard_size
    }

    /// Builds every strategy that lacks a complete, current shard set.
    ///
    /// Strategies fail independently: an error in one is recorded in the
    /// report and the remaining strategies are still built.
    pub fn build(&self, corpus: &Corpus, encoders: &[StrategyEncoder]) -> BuildReport {
        let mut report = BuildReport::default();

        if let Err(e) = std::fs::create_dir_all(&self.directory) {
            for encoder in encoders {
                report.strategies.push(StrategyBuild {
                    strategy: encoder.strategy(),
                    outcome: BuildOutcome::Failed {
                        reason: format!("cannot create {}: {e}", self.directory.display()),
                    },
                });
            }
            return report;
        }

        let corpus_fingerprint = corpus.fingerprint();
        for encoder in encoders {
            let strategy = encoder.strategy();
            let outcome = match self.build_strategy(corpus, &corpus_fingerprint, encoder) {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::warn!("Building '{strategy}' failed: {e}");
                    if let Err(cleanup) = self.remove_strategy_files(strategy) {
                        tracing::warn!("Could not clean up '{strategy}' shards: {cleanup}");
                    }
                    BuildOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            report.strategies.push(StrategyBuild { strategy, outcome });
        }

        report
    }

    fn build_strategy(
        &self,
        corpus: &Corpus,
        corpus_fingerprint: &str,
        encoder: &StrategyEncoder,
    ) -> Result<BuildOutcome, StoreError> {
        let strategy = encoder.strategy();
        let encoder_fingerprint = encoder.fingerprint();
        let dimension = encoder.dimension();

        match StrategyManifest::load(&self.directory, strategy) {
            Ok(manifest)
                if manifest.dimension == dimension.get()
                    && manifest.shard_size == self.shard_size
                    && manifest.is_current(
                        &self.directory,
                        corpus_fingerprint,
                        &encoder_fingerprint,
                    ) =>
            {
                tracing::info!("Strategy '{strategy}' is up to date; skipping");
                return Ok(BuildOutcome::Skipped);
            }
            Ok(_) => tracing::warn!("Strategy '{strategy}' shards are stale; rebuilding"),
            Err(StoreError::NotBuilt(_)) => {
                tracing::debug!("Strategy '{strategy}' has no manifest; building");
            }
            Err(e) => tracing::warn!("Strategy '{strategy}' manifest unusable ({e}); rebuilding"),
        }

        self.remove_strategy_files(strategy)?;

        let texts = corpus.texts();
        let shard_count = texts.len().div_ceil(self.shard_size);
        let progress = self
            .show_progress
            .then(|| shard_progress_bar(strategy, shard_count));

        for (i, chunk) in texts.chunks(self.shard_size).enumerate() {
            let vectors = encoder.embed(chunk)?;
            EmbeddingShard::write(
                &self.directory,
                strategy,
                ShardIndex::new(i as u32),
                dimension,
                &vectors,
            )?;
            if let Some(bar) = &progress {
                bar.inc(1);
            }
        }

        StrategyManifest::new(
            strategy,
            dimension.get(),
            self.shard_size,
            corpus.len(),
            corpus_fingerprint,
            encoder_fingerprint,
        )
        .save(&self.directory)?;

        if let Some(bar) = progress {
            bar.finish_with_message("done");
        }
        tracing::info!(
            "Built '{strategy}': {} documents in {shard_count} shards",
            corpus.len()
        );

        Ok(BuildOutcome::Built {
            shards: shard_count,
            documents: corpus.len(),
        })
    }

    /// Deletes a strategy's manifest first, then its shards.
    fn remove_strategy_files(&self, strategy: Strategy) -> Result<(), StoreError> {
        let manifest = StrategyManifest::path_for(&self.directory, strategy);
        if manifest.exists() {
            std::fs::remove_file(&manifest)?;
        }

        let prefix = format!("{strategy}.");
        for entry in std::fs::read_dir(&self.directory)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(&prefix) && name.ends_with(".shard") {
                std::fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }

    /// Manifest of a built strategy.
    pub fn manifest(&self, strategy: Strategy) -> Result<StrategyManifest, StoreError> {
        StrategyManifest::load(&self.directory, strategy)
    }

    /// Whether a complete shard set exists for this strategy.
    #[must_use]
    pub fn is_built(&self, strategy: Strategy) -> bool {
        self.manifest(strategy).is_ok()
    }

    /// Opens a strategy's shards in shard-index order.
    pub fn load_shards(&self, strategy: Strategy) -> Result<Vec<EmbeddingShard>, StoreError> {
        let manifest = self.manifest(strategy)?;
        let mut shards = Vec::with_capacity(manifest.shard_count);

        for index in manifest.shard_indices() {
            let shard = EmbeddingShard::open(&self.directory, strategy, index)?;
            if shard.dimension().get() != manifest.dimension {
                return Err(StoreError::InvalidFormat {
                    path: shard.path().display().to_string(),
                    reason: format!(
                        "shard width {} disagrees with manifest width {}",
                        shard.dimension(),
                        manifest.dimension
                    ),
                });
            }
            shards.push(shard);
        }

        Ok(shards)
    }

    /// Every vector of a strategy in document-id order.
    pub fn load_matrix(&self, strategy: Strategy) -> Result<Vec<Vec<f32>>, StoreError> {
        let mut matrix = Vec::new();
        for shard in self.load_shards(strategy)? {
            matrix.extend(shard.iter_rows());
        }
        Ok(matrix)
    }
}
