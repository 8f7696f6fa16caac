//! The engine context: every offline build, then the four query paths.
//!
//! A [`SearchContext`] is constructed once, explicitly, from settings and
//! whatever optional inputs are at hand (a neural encoder, static word
//! vectors, entity lists). Construction fits the vocabulary, brings every
//! enabled strategy's shards up to date, loads or fits the cluster model
//! and ranks each entity category. Afterwards the context is read-only and
//! can be shared between threads.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::cluster::{ClusterEngine, ClusterPrediction};
use crate::config::Settings;
use crate::corpus::{Corpus, DocumentId, normalize};
use crate::embedding::{
    BuildReport, EmbeddingStore, StaticWordVectors, StoreError, Strategy, StrategyEncoder,
    TermVocabulary, TextEncoder,
};
use crate::error::{EngineError, EngineResult};
use crate::graph::{EntityMatch, EntityPattern, EntityRanker, load_patterns};
use crate::search;

/// One retrieved couplet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub document_id: DocumentId,
    pub score: f32,
    pub text: String,
    #[serde(rename = "mesra1")]
    pub first_hemistich: String,
    #[serde(rename = "mesra2")]
    pub second_hemistich: String,
    pub topic_label: String,
}

/// Hits of one strategy inside a [`RetrieveResponse`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyHits {
    pub strategy: Strategy,
    pub hits: Vec<SearchHit>,
}

/// A strategy that could not answer, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnavailableStrategy {
    pub strategy: Strategy,
    pub reason: String,
}

/// Every signal for one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrieveResponse {
    pub query: String,
    pub results: Vec<StrategyHits>,
    pub unavailable: Vec<UnavailableStrategy>,
    pub cluster: Option<ClusterPrediction>,
    /// Why `cluster` is missing, when it is not just an empty corpus.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_unavailable: Option<String>,
    pub entities: Vec<EntityMatch>,
}

/// Collects the inputs of a [`SearchContext`].
pub struct SearchContextBuilder {
    settings: Settings,
    corpus: Option<Corpus>,
    sentence_encoder: Option<Arc<dyn TextEncoder>>,
    word_vectors: Option<Arc<StaticWordVectors>>,
    entity_lists: Vec<(String, Vec<EntityPattern>)>,
    show_progress: bool,
}

impl SearchContextBuilder {
    /// Uses this corpus instead of reading `corpus.path`.
    #[must_use]
    pub fn corpus(mut self, corpus: Corpus) -> Self {
        self.corpus = Some(corpus);
        self
    }

    /// Enables the sentence strategy and the cluster model.
    #[must_use]
    pub fn sentence_encoder(mut self, encoder: Arc<dyn TextEncoder>) -> Self {
        self.sentence_encoder = Some(encoder);
        self
    }

    /// Uses these vectors instead of reading `embeddings.word_vectors`.
    #[must_use]
    pub fn word_vectors(mut self, vectors: Arc<StaticWordVectors>) -> Self {
        self.word_vectors = Some(vectors);
        self
    }

    /// Adds an entity category. Once any category is given here, the
    /// `graph.entities` lists of the settings are ignored.
    #[must_use]
    pub fn entities(mut self, category: impl Into<String>, patterns: Vec<EntityPattern>) -> Self {
        self.entity_lists.push((category.into(), patterns));
        self
    }

    #[must_use]
    pub fn show_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Runs every offline build.
    ///
    /// Strategies whose inputs are missing, including a vocabulary that can
    /// be neither loaded nor saved, are recorded as unavailable; only corpus,
    /// cluster and entity-list failures abort construction.
    pub fn build(self) -> EngineResult<SearchContext> {
        let settings = self.settings;
        let corpus = match self.corpus {
            Some(corpus) => corpus,
            None => Corpus::load_csv(settings.corpus_path())?,
        };

        let embeddings_dir = settings.embeddings_dir();
        // Only the vocabulary-backed strategies depend on this
        let vocabulary = TermVocabulary::load_or_fit(
            &embeddings_dir,
            &corpus,
            settings.embeddings.vocabulary_options(),
        )
        .map(Arc::new)
        .map_err(|e| format!("vocabulary unavailable: {e}"));

        let word_vectors = match self.word_vectors {
            Some(vectors) => Ok(vectors),
            None => load_word_vectors(settings.word_vectors_path().as_deref()),
        };

        let mut encoders = BTreeMap::new();
        let mut unavailable = BTreeMap::new();
        for &strategy in &settings.embeddings.strategies {
            let encoder = match strategy {
                Strategy::Lexical => vocabulary
                    .as_ref()
                    .map(|v| StrategyEncoder::Lexical(Arc::clone(v)))
                    .map_err(Clone::clone),
                Strategy::Boolean => vocabulary
                    .as_ref()
                    .map(|v| StrategyEncoder::Boolean(Arc::clone(v)))
                    .map_err(Clone::clone),
                Strategy::WordVector => match (&word_vectors, &vocabulary) {
                    (Ok(vectors), Ok(vocabulary)) => Ok(StrategyEncoder::WordVector {
                        vectors: Arc::clone(vectors),
                        vocabulary: Arc::clone(vocabulary),
                    }),
                    (Err(reason), _) | (_, Err(reason)) => Err(reason.clone()),
                },
                Strategy::Sentence => match &self.sentence_encoder {
                    Some(encoder) => Ok(StrategyEncoder::sentence(
                        Arc::clone(encoder),
                        settings.embeddings.neural_batch_size,
                    )),
                    None => Err("no sentence encoder was loaded".to_string()),
                },
            };
            match encoder {
                Ok(encoder) => {
                    encoders.insert(strategy, encoder);
                }
                Err(reason) => {
                    tracing::warn!("Strategy '{strategy}' is unavailable: {reason}");
                    unavailable.insert(strategy, reason);
                }
            }
        }

        let store = EmbeddingStore::new(&embeddings_dir, settings.embeddings.shard_size)
            .with_progress(self.show_progress);
        let to_build: Vec<StrategyEncoder> = encoders.values().cloned().collect();
        let report = store.build(&corpus, &to_build);
        for (strategy, reason) in report.failures() {
            encoders.remove(&strategy);
            unavailable.insert(strategy, reason.to_string());
        }

        let cluster = match (&self.sentence_encoder, settings.clustering.enabled) {
            (Some(encoder), true) => Some(ClusterEngine::open_or_build(
                settings.clustering_dir(),
                &corpus,
                StrategyEncoder::sentence(
                    Arc::clone(encoder),
                    settings.embeddings.neural_batch_size,
                ),
                settings.clustering.options(),
                Some(&store),
            )?),
            (None, true) => {
                tracing::warn!("Clustering needs a sentence encoder; skipping");
                None
            }
            (_, false) => None,
        };

        let entity_lists = if self.entity_lists.is_empty() {
            configured_entity_lists(&settings)?
        } else {
            self.entity_lists
        };
        let texts = corpus.texts();
        let rankers = entity_lists
            .into_iter()
            .map(|(category, patterns)| {
                EntityRanker::build(category, &texts, patterns, settings.graph.options())
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(
            "Search context ready: {} documents, {} strategies, {} entity categories",
            corpus.len(),
            encoders.len(),
            rankers.len()
        );

        Ok(SearchContext {
            settings,
            corpus,
            store,
            report,
            encoders,
            unavailable,
            cluster,
            rankers,
        })
    }
}

fn load_word_vectors(path: Option<&Path>) -> Result<Arc<StaticWordVectors>, String> {
    let Some(path) = path else {
        return Err("embeddings.word_vectors is not set".to_string());
    };
    StaticWordVectors::load_word2vec_text(path)
        .map(Arc::new)
        .map_err(|e| e.to_string())
}

/// Entity lists named in the settings. A list whose file does not exist is
/// skipped with a warning; a malformed file is an error.
fn configured_entity_lists(
    settings: &Settings,
) -> EngineResult<Vec<(String, Vec<EntityPattern>)>> {
    let mut lists = Vec::new();
    for list in &settings.graph.entities {
        let path = settings.resolve_path(&list.path);
        if !path.exists() {
            tracing::warn!(
                "Entity list '{}' not found at {}; skipping",
                list.category,
                path.display()
            );
            continue;
        }
        lists.push((list.category.clone(), load_patterns(&path)?));
    }
    Ok(lists)
}

/// Built engine state shared by every query.
#[derive(Debug)]
pub struct SearchContext {
    settings: Settings,
    corpus: Corpus,
    store: EmbeddingStore,
    report: BuildReport,
    encoders: BTreeMap<Strategy, StrategyEncoder>,
    unavailable: BTreeMap<Strategy, String>,
    cluster: Option<ClusterEngine>,
    rankers: Vec<EntityRanker>,
}

impl SearchContext {
    #[must_use]
    pub fn builder(settings: Settings) -> SearchContextBuilder {
        SearchContextBuilder {
            settings,
            corpus: None,
            sentence_encoder: None,
            word_vectors: None,
            entity_lists: Vec::new(),
            show_progress: false,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    #[must_use]
    pub fn store(&self) -> &EmbeddingStore {
        &self.store
    }

    /// What the construction-time build did per strategy.
    #[must_use]
    pub fn build_report(&self) -> &BuildReport {
        &self.report
    }

    /// Strategies that can answer queries, in canonical order.
    pub fn available_strategies(&self) -> impl Iterator<Item = Strategy> + '_ {
        self.encoders.keys().copied()
    }

    /// Enabled strategies that cannot answer, with the reason.
    #[must_use]
    pub fn unavailable_strategies(&self) -> &BTreeMap<Strategy, String> {
        &self.unavailable
    }

    #[must_use]
    pub fn cluster_engine(&self) -> Option<&ClusterEngine> {
        self.cluster.as_ref()
    }

    /// One ranker per entity category, in configuration order.
    #[must_use]
    pub fn rankers(&self) -> &[EntityRanker] {
        &self.rankers
    }

    /// The `n` couplets most similar to `query` under `strategy`.
    pub fn search(&self, query: &str, strategy: Strategy, n: usize) -> EngineResult<Vec<SearchHit>> {
        let encoder = self.encoders.get(&strategy).ok_or_else(|| {
            StoreError::StrategyUnavailable {
                strategy,
                reason: self
                    .unavailable
                    .get(&strategy)
                    .cloned()
                    .unwrap_or_else(|| "not enabled in settings".to_string()),
            }
        })?;

        let query = normalize(query);
        let hits = search::search(&self.store, encoder, &query, n)?;
        Ok(hits
            .into_iter()
            .filter_map(|hit| {
                let document = self.corpus.get(hit.document_id)?;
                let (first, second) = document.hemistichs();
                Some(SearchHit {
                    document_id: hit.document_id,
                    score: hit.score.get(),
                    text: document.text.clone(),
                    first_hemistich: first.to_string(),
                    second_hemistich: second.to_string(),
                    topic_label: document.topic_label.clone(),
                })
            })
            .collect())
    }

    /// The topic cluster of `query`; `None` for an empty corpus.
    ///
    /// # Errors
    /// `ClusteringUnavailable` when clustering is disabled or no sentence
    /// encoder was given.
    pub fn predict_cluster(&self, query: &str) -> EngineResult<Option<ClusterPrediction>> {
        let engine = self
            .cluster
            .as_ref()
            .ok_or(EngineError::ClusteringUnavailable)?;
        Ok(engine.predict(&normalize(query))?)
    }

    /// Entities implied by `query`, category by category, each category in
    /// its own rank order.
    #[must_use]
    pub fn entity_ranks(&self, query: &str) -> Vec<EntityMatch> {
        self.rankers
            .iter()
            .flat_map(|ranker| ranker.query_ranks(query))
            .collect()
    }

    /// Every available strategy, the cluster and the entities for one query.
    ///
    /// A strategy failing at query time is reported in `unavailable` next
    /// to the ones that were never built, and a cluster failure in
    /// `cluster_unavailable`; the other signals still answer.
    pub fn retrieve(&self, query: &str, n: usize) -> EngineResult<RetrieveResponse> {
        let mut results = Vec::new();
        let mut unavailable: Vec<UnavailableStrategy> = self
            .unavailable
            .iter()
            .map(|(&strategy, reason)| UnavailableStrategy {
                strategy,
                reason: reason.clone(),
            })
            .collect();

        for strategy in self.available_strategies() {
            match self.search(query, strategy, n) {
                Ok(hits) => results.push(StrategyHits { strategy, hits }),
                Err(e) => {
                    tracing::warn!("'{strategy}' search failed: {e}");
                    unavailable.push(UnavailableStrategy {
                        strategy,
                        reason: e.to_string(),
                    });
                }
            }
        }
        unavailable.sort_by_key(|u| u.strategy);

        let (cluster, cluster_unavailable) = match self.predict_cluster(query) {
            Ok(cluster) => (cluster, None),
            Err(EngineError::ClusteringUnavailable) => {
                (None, Some(EngineError::ClusteringUnavailable.to_string()))
            }
            Err(e) => {
                tracing::warn!("Cluster prediction failed: {e}");
                (None, Some(e.to_string()))
            }
        };

        Ok(RetrieveResponse {
            query: query.to_string(),
            results,
            unavailable,
            cluster,
            cluster_unavailable,
            entities: self.entity_ranks(query),
        })
    }
}
