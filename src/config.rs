//! Configuration module for the verse search engine.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `SH_` and use double underscores
//! to separate nested levels:
//! - `SH_CLUSTERING__K=12` sets `clustering.k`
//! - `SH_EMBEDDINGS__SHARD_SIZE=2000` sets `embeddings.shard_size`
//! - `SH_GRAPH__WINDOW_SIZE=7` sets `graph.window_size`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cluster::{ClusterOptions, KMeansOptions};
use crate::embedding::{DEFAULT_SHARD_SIZE, Strategy, VocabularyOptions};
use crate::graph::{CentralityOptions, GraphOptions};

/// Directory holding settings and every built artifact.
pub const DATA_DIR: &str = ".shahnameh";
const SETTINGS_FILE: &str = "settings.toml";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Directory holding the data directory. Relative paths in these
    /// settings resolve against it; detected from the settings file location
    /// when not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,

    /// Root of the built artifacts
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Global debug mode
    #[serde(default)]
    pub debug: bool,

    #[serde(default)]
    pub corpus: CorpusConfig,

    #[serde(default)]
    pub embeddings: EmbeddingsConfig,

    #[serde(default)]
    pub clustering: ClusteringConfig,

    #[serde(default)]
    pub graph: GraphConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CorpusConfig {
    /// CSV file with `text` and `labels` columns
    #[serde(default = "default_corpus_path")]
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EmbeddingsConfig {
    /// Documents per shard file
    #[serde(default = "default_shard_size")]
    pub shard_size: usize,

    /// Texts per call into the neural encoder
    #[serde(default = "default_neural_batch_size")]
    pub neural_batch_size: usize,

    #[serde(default = "default_max_features")]
    pub max_features: usize,

    #[serde(default = "default_ngram_min")]
    pub ngram_min: usize,

    #[serde(default = "default_ngram_max")]
    pub ngram_max: usize,

    #[serde(default)]
    pub extra_stop_words: Vec<String>,

    /// word2vec text file for the word-vector strategy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_vectors: Option<PathBuf>,

    /// fastembed model for the sentence strategy
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Strategies to build and serve
    #[serde(default = "default_strategies")]
    pub strategies: Vec<Strategy>,

    /// Worker threads for embedding and scoring
    #[serde(default = "default_threads")]
    pub threads: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ClusteringConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_k")]
    pub k: usize,

    #[serde(default = "default_pca_dim")]
    pub pca_dim: usize,

    #[serde(default = "default_kmeans_max_iter")]
    pub max_iter: usize,

    #[serde(default = "default_n_init")]
    pub n_init: usize,

    #[serde(default = "default_seed")]
    pub seed: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct GraphConfig {
    /// Documents per co-occurrence window
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Documents an entity must appear in to enter the graph
    #[serde(default = "default_min_mentions")]
    pub min_mentions: usize,

    #[serde(default = "default_damping")]
    pub damping: f64,

    #[serde(default = "default_graph_max_iter")]
    pub max_iter: usize,

    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// One graph per list, queried in this order
    #[serde(default = "default_entity_lists")]
    pub entities: Vec<EntityList>,
}

/// A category of entities and the CSV file (`regex` column) listing them.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct EntityList {
    pub category: String,
    pub path: PathBuf,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_data_dir() -> PathBuf {
    PathBuf::from(DATA_DIR)
}
fn default_true() -> bool {
    true
}
fn default_corpus_path() -> PathBuf {
    PathBuf::from("data/corpus.csv")
}
fn default_shard_size() -> usize {
    DEFAULT_SHARD_SIZE
}
fn default_neural_batch_size() -> usize {
    1000
}
fn default_max_features() -> usize {
    VocabularyOptions::default().max_features
}
fn default_ngram_min() -> usize {
    1
}
fn default_ngram_max() -> usize {
    2
}
fn default_embedding_model() -> String {
    "ParaphraseMLMiniLML12V2".to_string()
}
fn default_strategies() -> Vec<Strategy> {
    Strategy::ALL.to_vec()
}
fn default_threads() -> usize {
    num_cpus::get()
}
fn default_k() -> usize {
    KMeansOptions::default().k
}
fn default_pca_dim() -> usize {
    ClusterOptions::default().pca_dim
}
fn default_kmeans_max_iter() -> usize {
    KMeansOptions::default().max_iter
}
fn default_n_init() -> usize {
    KMeansOptions::default().n_init
}
fn default_seed() -> u64 {
    KMeansOptions::default().seed
}
fn default_window_size() -> usize {
    GraphOptions::default().window_size
}
fn default_min_mentions() -> usize {
    GraphOptions::default().min_mentions
}
fn default_damping() -> f64 {
    CentralityOptions::default().damping
}
fn default_graph_max_iter() -> usize {
    CentralityOptions::default().max_iter
}
fn default_tolerance() -> f64 {
    CentralityOptions::default().tolerance
}
fn default_entity_lists() -> Vec<EntityList> {
    vec![
        EntityList {
            category: "characters".to_string(),
            path: PathBuf::from("data/characters.csv"),
        },
        EntityList {
            category: "places".to_string(),
            path: PathBuf::from("data/places.csv"),
        },
    ]
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            workspace_root: None,
            data_dir: default_data_dir(),
            debug: false,
            corpus: CorpusConfig::default(),
            embeddings: EmbeddingsConfig::default(),
            clustering: ClusteringConfig::default(),
            graph: GraphConfig::default(),
        }
    }
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            path: default_corpus_path(),
        }
    }
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            shard_size: default_shard_size(),
            neural_batch_size: default_neural_batch_size(),
            max_features: default_max_features(),
            ngram_min: default_ngram_min(),
            ngram_max: default_ngram_max(),
            extra_stop_words: Vec::new(),
            word_vectors: None,
            model: default_embedding_model(),
            strategies: default_strategies(),
            threads: default_threads(),
        }
    }
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            k: default_k(),
            pca_dim: default_pca_dim(),
            max_iter: default_kmeans_max_iter(),
            n_init: default_n_init(),
            seed: default_seed(),
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            min_mentions: default_min_mentions(),
            damping: default_damping(),
            max_iter: default_graph_max_iter(),
            tolerance: default_tolerance(),
            entities: default_entity_lists(),
        }
    }
}

impl EmbeddingsConfig {
    #[must_use]
    pub fn vocabulary_options(&self) -> VocabularyOptions {
        VocabularyOptions {
            max_features: self.max_features,
            ngram_range: (self.ngram_min, self.ngram_max.max(self.ngram_min)),
            extra_stop_words: self.extra_stop_words.clone(),
        }
    }

    #[must_use]
    pub fn is_enabled(&self, strategy: Strategy) -> bool {
        self.strategies.contains(&strategy)
    }
}

impl ClusteringConfig {
    #[must_use]
    pub fn options(&self) -> ClusterOptions {
        ClusterOptions {
            pca_dim: self.pca_dim,
            kmeans: KMeansOptions {
                k: self.k,
                max_iter: self.max_iter,
                n_init: self.n_init,
                seed: self.seed,
            },
        }
    }
}

impl GraphConfig {
    #[must_use]
    pub fn options(&self) -> GraphOptions {
        GraphOptions {
            window_size: self.window_size,
            min_mentions: self.min_mentions,
            centrality: CentralityOptions {
                damping: self.damping,
                max_iter: self.max_iter,
                tolerance: self.tolerance,
            },
        }
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let current = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::load_for(&current)
    }

    /// Load the settings that apply inside `directory`: those of the nearest
    /// ancestor holding a data directory, or defaults rooted at `directory`
    pub fn load_for(directory: &Path) -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config(directory)
            .unwrap_or_else(|| directory.join(DATA_DIR).join(SETTINGS_FILE));
        Self::load_from(config_path)
    }

    /// Load configuration from a specific file, still layering the
    /// environment on top
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        let path = path.as_ref();
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            // Double underscore separates nested levels; single underscores
            // stay inside field names
            .merge(Env::prefixed("SH_").map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(Box::new)
            .map(|mut settings: Settings| {
                if settings.workspace_root.is_none() {
                    settings.workspace_root = Self::workspace_of(path);
                }
                settings
            })
    }

    /// Find the settings file by looking for the data directory from
    /// `start` up to the root
    fn find_workspace_config(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|ancestor| ancestor.join(DATA_DIR))
            .find(|dir| dir.is_dir())
            .map(|dir| dir.join(SETTINGS_FILE))
    }

    /// The directory above the data directory a settings file lives in.
    /// `None` for a file kept anywhere else.
    fn workspace_of(config_path: &Path) -> Option<PathBuf> {
        let data_dir = config_path.parent()?;
        if data_dir.file_name()? != DATA_DIR {
            return None;
        }
        data_dir
            .parent()
            .filter(|root| !root.as_os_str().is_empty())
            .map(Path::to_path_buf)
    }

    /// `path` as seen from the workspace root. Absolute paths, and every
    /// path when no root is known, are returned unchanged.
    #[must_use]
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        match &self.workspace_root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// The resolved data directory
    #[must_use]
    pub fn data_path(&self) -> PathBuf {
        self.resolve_path(&self.data_dir)
    }

    /// The resolved corpus CSV
    #[must_use]
    pub fn corpus_path(&self) -> PathBuf {
        self.resolve_path(&self.corpus.path)
    }

    /// The resolved word2vec file, if one is configured
    #[must_use]
    pub fn word_vectors_path(&self) -> Option<PathBuf> {
        self.embeddings
            .word_vectors
            .as_deref()
            .map(|path| self.resolve_path(path))
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Where shards, manifests and the vocabulary live
    #[must_use]
    pub fn embeddings_dir(&self) -> PathBuf {
        self.data_path().join("embeddings")
    }

    /// Where the four cluster artifacts live
    #[must_use]
    pub fn clustering_dir(&self) -> PathBuf {
        self.data_path().join("clustering")
    }

    /// fastembed download cache
    #[must_use]
    pub fn model_cache_dir(&self) -> PathBuf {
        self.data_path().join("models")
    }

    /// Create a default settings file with helpful comments
    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        Self::init_config_file_in(Path::new("."), force)
    }

    /// Same as [`Settings::init_config_file`] below an explicit root
    pub fn init_config_file_in(
        root: &Path,
        force: bool,
    ) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = root.join(DATA_DIR).join(SETTINGS_FILE);

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let template = format!(
            r#"# Shahnameh verse search configuration

# Version of the configuration schema
version = 1

# Root of every built artifact (shards, cluster model, model cache)
data_dir = "{DATA_DIR}"

# Global debug mode
debug = false

[corpus]
# CSV with a header row and `text`, `labels` columns.
# Couplets are written as "first half-line - second half-line".
path = "data/corpus.csv"

[embeddings]
# Documents per shard file
shard_size = {DEFAULT_SHARD_SIZE}

# Texts per call into the neural encoder
neural_batch_size = 1000

# Vocabulary for the lexical and boolean strategies
max_features = 20000
ngram_min = 1
ngram_max = 2
extra_stop_words = []

# word2vec text file; the word-vector strategy is unavailable without it
# word_vectors = "data/word2vec.txt"

# fastembed model for the sentence strategy
model = "ParaphraseMLMiniLML12V2"

# Any of: lexical, boolean, word-vector, sentence
strategies = ["lexical", "boolean", "word-vector", "sentence"]

# Worker threads (defaults to CPU count)
# threads = {}

[clustering]
# Topic clusters over sentence embeddings
enabled = true
k = 9
pca_dim = 8
max_iter = 2000
n_init = 10
seed = 42

[graph]
# Entities mentioned within the same window of documents are linked
window_size = 5
min_mentions = 1
damping = 0.9
max_iter = 1000
tolerance = 1e-10

# One graph per entity list; each CSV needs a `regex` column
[[graph.entities]]
category = "characters"
path = "data/characters.csv"

[[graph.entities]]
category = "places"
path = "data/places.csv"
"#,
            num_cpus::get()
        );

        std::fs::write(&config_path, template)?;

        if force {
            println!("Overwrote configuration at: {}", config_path.display());
        } else {
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
        }

        Ok(config_path)
    }
}
