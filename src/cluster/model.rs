//! The fitted cluster model and its on-disk artifacts.
//!
//! Four artifacts are written, each in its own file so each can be loaded
//! on its own:
//! - `pca_model.bin`: the projection
//! - `raw_embeddings.bin`: document embeddings before projection
//! - `kmeans_model.bin`: the centroids
//! - `cluster_ids.bin`: one cluster id per document
//!
//! Every file is a bincode-encoded [`ArtifactEnvelope`] whose header carries
//! the format version, the corpus fingerprint and the fingerprint of the
//! encoder that produced the embedding space. The label summary is not
//! stored; it is recomputed from the cluster ids and the corpus labels.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::cluster::{ClusterError, KMeansModel, KMeansOptions, PcaProjection};
use crate::corpus::Corpus;
use crate::persist::atomic_write;

pub const PCA_FILE: &str = "pca_model.bin";
pub const EMBEDDINGS_FILE: &str = "raw_embeddings.bin";
pub const KMEANS_FILE: &str = "kmeans_model.bin";
pub const CLUSTER_IDS_FILE: &str = "cluster_ids.bin";

/// Labels kept per cluster in the summary.
pub const SUMMARY_LABELS: usize = 3;

/// Fit parameters for a cluster model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterOptions {
    pub pca_dim: usize,
    pub kmeans: KMeansOptions,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            pca_dim: 8,
            kmeans: KMeansOptions::default(),
        }
    }
}

/// A topic label and how many documents of a cluster carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCount {
    pub label: String,
    pub count: usize,
}

/// Header shared by every artifact file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ArtifactHeader {
    version: u32,
    kind: String,
    corpus_fingerprint: String,
    encoder_fingerprint: String,
}

#[derive(Serialize, Deserialize)]
struct ArtifactEnvelope<T> {
    header: ArtifactHeader,
    payload: T,
}

/// Current artifact format version.
pub const ARTIFACT_VERSION: u32 = 2;

/// What a set of artifacts was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactSource<'a> {
    pub corpus_fingerprint: &'a str,
    pub encoder_fingerprint: &'a str,
}

fn write_artifact<T: Serialize>(
    directory: &Path,
    file: &str,
    source: ArtifactSource<'_>,
    payload: &T,
) -> Result<(), ClusterError> {
    let envelope = ArtifactEnvelope {
        header: ArtifactHeader {
            version: ARTIFACT_VERSION,
            kind: file.to_string(),
            corpus_fingerprint: source.corpus_fingerprint.to_string(),
            encoder_fingerprint: source.encoder_fingerprint.to_string(),
        },
        payload,
    };
    let bytes = bincode::serde::encode_to_vec(&envelope, bincode::config::standard())
        .map_err(|e| ClusterError::Serialization(format!("{file}: {e}")))?;
    atomic_write(&directory.join(file), &bytes)?;
    Ok(())
}

fn read_artifact<T: DeserializeOwned>(
    directory: &Path,
    file: &str,
    source: ArtifactSource<'_>,
) -> Result<T, ClusterError> {
    let path = directory.join(file);
    if !path.exists() {
        return Err(ClusterError::MissingArtifact(path));
    }
    let bytes = std::fs::read(&path)?;
    let config = bincode::config::standard();

    // The header decodes on its own, so a version change is reported before
    // the payload layout matters.
    let (header, _): (ArtifactHeader, usize) = bincode::serde::decode_from_slice(&bytes, config)
        .map_err(|e| ClusterError::Serialization(format!("{file}: {e}")))?;
    if header.version != ARTIFACT_VERSION {
        return Err(ClusterError::VersionMismatch {
            artifact: file.to_string(),
            expected: ARTIFACT_VERSION,
            actual: header.version,
        });
    }
    if header.corpus_fingerprint != source.corpus_fingerprint {
        return Err(ClusterError::StaleArtifact {
            artifact: file.to_string(),
            reason: "built from a different corpus",
        });
    }
    if header.encoder_fingerprint != source.encoder_fingerprint {
        return Err(ClusterError::StaleArtifact {
            artifact: file.to_string(),
            reason: "built with a different encoder",
        });
    }

    let (envelope, _): (ArtifactEnvelope<T>, usize) =
        bincode::serde::decode_from_slice(&bytes, config)
            .map_err(|e| ClusterError::Serialization(format!("{file}: {e}")))?;
    Ok(envelope.payload)
}

/// Groups documents by cluster and keeps each cluster's most frequent
/// labels, by descending count and then by label.
///
/// Every id in `0..k` gets an entry, possibly empty.
#[must_use]
pub fn summarize_labels(
    cluster_ids: &[usize],
    labels: &[&str],
    k: usize,
) -> BTreeMap<usize, Vec<LabelCount>> {
    let mut counts: Vec<HashMap<&str, usize>> = vec![HashMap::new(); k];
    for (&cluster, &label) in cluster_ids.iter().zip(labels) {
        if let Some(bucket) = counts.get_mut(cluster) {
            *bucket.entry(label).or_default() += 1;
        }
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(cluster, bucket)| {
            let mut ranked: Vec<LabelCount> = bucket
                .into_iter()
                .map(|(label, count)| LabelCount {
                    label: label.to_string(),
                    count,
                })
                .collect();
            ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
            ranked.truncate(SUMMARY_LABELS);
            (cluster, ranked)
        })
        .collect()
}

/// Projection, partition and per-document assignments of one corpus.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterModel {
    pca: PcaProjection,
    kmeans: KMeansModel,
    raw_embeddings: Vec<Vec<f32>>,
    cluster_ids: Vec<usize>,
    label_summary: BTreeMap<usize, Vec<LabelCount>>,
}

impl ClusterModel {
    /// Fits PCA and k-means over `embeddings`, one row per corpus document.
    pub fn fit(
        corpus: &Corpus,
        embeddings: Vec<Vec<f32>>,
        options: ClusterOptions,
    ) -> Result<Self, ClusterError> {
        if embeddings.len() != corpus.len() {
            return Err(ClusterError::RowCountMismatch {
                documents: corpus.len(),
                embeddings: embeddings.len(),
            });
        }

        let pca = PcaProjection::fit(&embeddings, options.pca_dim)?;
        let projected = pca.transform_all(&embeddings)?;
        let kmeans = KMeansModel::fit(&projected, options.kmeans)?;
        let cluster_ids = kmeans.predict_all(&projected)?;

        tracing::info!(
            "Clustered {} documents into {} clusters (inertia {:.4})",
            corpus.len(),
            kmeans.k(),
            kmeans.inertia()
        );

        Ok(Self::assemble(pca, kmeans, embeddings, cluster_ids, corpus))
    }

    fn assemble(
        pca: PcaProjection,
        kmeans: KMeansModel,
        raw_embeddings: Vec<Vec<f32>>,
        cluster_ids: Vec<usize>,
        corpus: &Corpus,
    ) -> Self {
        let labels: Vec<&str> = corpus
            .documents()
            .iter()
            .map(|d| d.topic_label.as_str())
            .collect();
        let label_summary = summarize_labels(&cluster_ids, &labels, kmeans.k());
        Self {
            pca,
            kmeans,
            raw_embeddings,
            cluster_ids,
            label_summary,
        }
    }

    /// Writes all four artifacts.
    pub fn save(&self, directory: &Path, source: ArtifactSource<'_>) -> Result<(), ClusterError> {
        std::fs::create_dir_all(directory)?;
        write_artifact(directory, PCA_FILE, source, &self.pca)?;
        write_artifact(directory, EMBEDDINGS_FILE, source, &self.raw_embeddings)?;
        write_artifact(directory, KMEANS_FILE, source, &self.kmeans)?;
        write_artifact(directory, CLUSTER_IDS_FILE, source, &self.cluster_ids)?;
        Ok(())
    }

    /// Loads the four artifacts written for this corpus and encoder.
    ///
    /// Fails when any artifact is missing, has another format version, was
    /// built from another corpus or encoder, or disagrees with the others in
    /// shape.
    pub fn load(
        directory: &Path,
        corpus: &Corpus,
        encoder_fingerprint: &str,
    ) -> Result<Self, ClusterError> {
        let corpus_fingerprint = corpus.fingerprint();
        let source = ArtifactSource {
            corpus_fingerprint: &corpus_fingerprint,
            encoder_fingerprint,
        };
        let pca: PcaProjection = read_artifact(directory, PCA_FILE, source)?;
        let raw_embeddings: Vec<Vec<f32>> = read_artifact(directory, EMBEDDINGS_FILE, source)?;
        let kmeans: KMeansModel = read_artifact(directory, KMEANS_FILE, source)?;
        let cluster_ids: Vec<usize> = read_artifact(directory, CLUSTER_IDS_FILE, source)?;

        if cluster_ids.len() != corpus.len() || raw_embeddings.len() != corpus.len() {
            return Err(ClusterError::RowCountMismatch {
                documents: corpus.len(),
                embeddings: raw_embeddings.len(),
            });
        }
        if let Some(&bad) = cluster_ids.iter().find(|&&id| id >= kmeans.k()) {
            return Err(ClusterError::Serialization(format!(
                "{CLUSTER_IDS_FILE}: cluster id {bad} out of range for k = {}",
                kmeans.k()
            )));
        }
        let projected_width = kmeans.centroids().first().map_or(0, Vec::len);
        if projected_width != pca.output_dimension() {
            return Err(ClusterError::DimensionMismatch {
                expected: pca.output_dimension(),
                actual: projected_width,
            });
        }

        Ok(Self::assemble(pca, kmeans, raw_embeddings, cluster_ids, corpus))
    }

    #[must_use]
    pub fn k(&self) -> usize {
        self.kmeans.k()
    }

    /// Width of the embeddings the model was fit on.
    #[must_use]
    pub fn input_dimension(&self) -> usize {
        self.pca.input_dimension()
    }

    #[must_use]
    pub fn cluster_ids(&self) -> &[usize] {
        &self.cluster_ids
    }

    #[must_use]
    pub fn raw_embeddings(&self) -> &[Vec<f32>] {
        &self.raw_embeddings
    }

    #[must_use]
    pub fn label_summary(&self) -> &BTreeMap<usize, Vec<LabelCount>> {
        &self.label_summary
    }

    #[must_use]
    pub fn labels_for(&self, cluster: usize) -> &[LabelCount] {
        self.label_summary.get(&cluster).map_or(&[], Vec::as_slice)
    }

    /// Projects an embedding and returns its nearest cluster.
    pub fn assign(&self, embedding: &[f32]) -> Result<usize, ClusterError> {
        let projected = self.pca.transform(embedding)?;
        self.kmeans.predict(&projected)
    }
}
