//! Offline build and online prediction of topic clusters.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::cluster::{ArtifactSource, ClusterError, ClusterModel, ClusterOptions, LabelCount};
use crate::corpus::Corpus;
use crate::embedding::{EmbeddingStore, StrategyEncoder, StrategyManifest};

/// The cluster a query falls into and that cluster's dominant labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterPrediction {
    pub cluster_id: usize,
    pub top_labels: Vec<LabelCount>,
}

/// Owns the cluster model and the encoder that produced its space.
#[derive(Debug)]
pub struct ClusterEngine {
    directory: PathBuf,
    encoder: StrategyEncoder,
    /// `None` for an empty corpus.
    model: Option<ClusterModel>,
}

impl ClusterEngine {
    /// Loads the persisted model for this corpus and encoder, or fits and
    /// saves a new one when any artifact is missing, stale or unreadable.
    ///
    /// Document embeddings come from `store` when it holds a current shard
    /// set for the encoder, and from the encoder directly otherwise.
    pub fn open_or_build(
        directory: impl Into<PathBuf>,
        corpus: &Corpus,
        encoder: StrategyEncoder,
        options: ClusterOptions,
        store: Option<&EmbeddingStore>,
    ) -> Result<Self, ClusterError> {
        let directory = directory.into();

        if corpus.is_empty() {
            tracing::info!("Corpus is empty; no cluster model to build");
            return Ok(Self {
                directory,
                encoder,
                model: None,
            });
        }

        let model = match ClusterModel::load(&directory, corpus, &encoder.fingerprint()) {
            Ok(model) if model.input_dimension() == encoder.dimension().get() => {
                tracing::info!(
                    "Loaded cluster model ({} clusters) from {}",
                    model.k(),
                    directory.display()
                );
                model
            }
            Ok(_) => {
                tracing::warn!("Cluster model was fit with another encoder; rebuilding");
                Self::build(&directory, corpus, &encoder, options, store)?
            }
            Err(e) => {
                tracing::warn!("Cluster model unavailable ({e}); rebuilding");
                Self::build(&directory, corpus, &encoder, options, store)?
            }
        };

        Ok(Self {
            directory,
            encoder,
            model: Some(model),
        })
    }

    fn build(
        directory: &Path,
        corpus: &Corpus,
        encoder: &StrategyEncoder,
        options: ClusterOptions,
        store: Option<&EmbeddingStore>,
    ) -> Result<ClusterModel, ClusterError> {
        let embeddings = document_embeddings(corpus, encoder, store)?;
        let model = ClusterModel::fit(corpus, embeddings, options)?;
        model.save(
            directory,
            ArtifactSource {
                corpus_fingerprint: &corpus.fingerprint(),
                encoder_fingerprint: &encoder.fingerprint(),
            },
        )?;
        Ok(model)
    }

    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    #[must_use]
    pub fn model(&self) -> Option<&ClusterModel> {
        self.model.as_ref()
    }

    /// Assigns a query to a cluster. `None` when there is no model.
    pub fn predict(&self, query: &str) -> Result<Option<ClusterPrediction>, ClusterError> {
        let Some(model) = &self.model else {
            return Ok(None);
        };

        let embedding = self.encoder.embed_one(query)?;
        let cluster_id = model.assign(&embedding)?;
        Ok(Some(ClusterPrediction {
            cluster_id,
            top_labels: model.labels_for(cluster_id).to_vec(),
        }))
    }
}

fn document_embeddings(
    corpus: &Corpus,
    encoder: &StrategyEncoder,
    store: Option<&EmbeddingStore>,
) -> Result<Vec<Vec<f32>>, ClusterError> {
    let strategy = encoder.strategy();
    if let Some(store) = store {
        let reusable = StrategyManifest::load(store.directory(), strategy).is_ok_and(|m| {
            m.dimension == encoder.dimension().get()
                && m.is_current(
                    store.directory(),
                    &corpus.fingerprint(),
                    &encoder.fingerprint(),
                )
        });
        if reusable {
            tracing::debug!("Reusing '{strategy}' shards for clustering");
            return Ok(store.load_matrix(strategy)?);
        }
    }

    tracing::info!("Embedding {} documents for clustering", corpus.len());
    Ok(encoder.embed(&corpus.texts())?)
}
