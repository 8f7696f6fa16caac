//! The engine context end to end: builds, all four query paths, retrieve.

use std::sync::Arc;

use shahnameh::embedding::{
    BuildOutcome, StoreError, Strategy, TextEncoder, VOCABULARY_FILE, VectorDimension,
};
use shahnameh::{EngineError, SearchContext};
use tempfile::TempDir;

use crate::common::{
    KEYWORDS, KeywordEncoder, character_patterns, fixture_corpus, fixture_word_vectors,
    keyword_encoder, place_patterns, test_settings,
};

/// Embeds like [`KeywordEncoder`] but fails on any text containing `trigger`.
struct FailingEncoder {
    inner: KeywordEncoder,
    trigger: &'static str,
}

impl TextEncoder for FailingEncoder {
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, StoreError> {
        if texts.iter().any(|text| text.contains(self.trigger)) {
            return Err(StoreError::EmbeddingFailed("model crashed".to_string()));
        }
        self.inner.embed(texts)
    }

    fn dimension(&self) -> VectorDimension {
        self.inner.dimension()
    }

    fn name(&self) -> String {
        format!("failing:{}", self.inner.name())
    }
}

fn full_context(data_dir: &std::path::Path) -> SearchContext {
    SearchContext::builder(test_settings(data_dir))
        .corpus(fixture_corpus())
        .sentence_encoder(keyword_encoder())
        .word_vectors(fixture_word_vectors())
        .entities("characters", character_patterns())
        .entities("places", place_patterns())
        .build()
        .unwrap()
}

#[test]
fn test_every_strategy_answers() {
    let temp_dir = TempDir::new().unwrap();
    let context = full_context(temp_dir.path());

    assert!(context.unavailable_strategies().is_empty());
    assert_eq!(context.available_strategies().count(), 4);

    for strategy in Strategy::ALL {
        let hits = context.search("رستم و سهراب", strategy, 3).unwrap();
        assert_eq!(hits.len(), 3, "strategy {strategy}");
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
        for hit in &hits {
            let document = context.corpus().get(hit.document_id).unwrap();
            assert_eq!(hit.text, document.text);
            assert!(!hit.second_hemistich.is_empty());
        }
    }
}

#[test]
fn test_second_context_reuses_everything() {
    let temp_dir = TempDir::new().unwrap();
    full_context(temp_dir.path());

    let again = full_context(temp_dir.path());
    assert!(
        again
            .build_report()
            .strategies
            .iter()
            .all(|s| s.outcome == BuildOutcome::Skipped)
    );
}

#[test]
fn test_retrieve_combines_all_signals() {
    let temp_dir = TempDir::new().unwrap();
    let context = full_context(temp_dir.path());

    let response = context.retrieve("رستم در توران", 2).unwrap();
    let strategies: Vec<Strategy> = response.results.iter().map(|r| r.strategy).collect();
    assert_eq!(strategies, Strategy::ALL.to_vec());
    assert!(response.results.iter().all(|r| r.hits.len() == 2));
    assert!(response.unavailable.is_empty());

    assert!(response.cluster_unavailable.is_none());
    let cluster = response.cluster.unwrap();
    assert!(cluster.cluster_id < 3);
    assert_eq!(
        Some(cluster),
        context.predict_cluster("رستم در توران").unwrap()
    );

    let categories: Vec<&str> = response
        .entities
        .iter()
        .map(|e| e.category.as_str())
        .collect();
    assert_eq!(categories, vec!["characters", "places"]);
    assert_eq!(response.entities[0].name, "رستم");
    assert_eq!(response.entities[1].name, "توران");
    assert_eq!(response.entities, context.entity_ranks("رستم در توران"));
}

#[test]
fn test_missing_inputs_are_reported_not_fatal() {
    let temp_dir = TempDir::new().unwrap();
    let mut settings = test_settings(temp_dir.path());
    settings.clustering.enabled = false;

    let context = SearchContext::builder(settings)
        .corpus(fixture_corpus())
        .build()
        .unwrap();

    let unavailable = context.unavailable_strategies();
    assert!(unavailable.contains_key(&Strategy::WordVector));
    assert!(unavailable.contains_key(&Strategy::Sentence));
    assert!(context.search("رستم", Strategy::Lexical, 2).is_ok());
    assert!(matches!(
        context.search("رستم", Strategy::Sentence, 2),
        Err(EngineError::Store(StoreError::StrategyUnavailable {
            strategy: Strategy::Sentence,
            ..
        }))
    ));
    assert!(matches!(
        context.predict_cluster("رستم"),
        Err(EngineError::ClusteringUnavailable)
    ));

    let response = context.retrieve("رستم", 2).unwrap();
    assert_eq!(response.results.len(), 2);
    assert_eq!(response.unavailable.len(), 2);
    assert!(response.cluster.is_none());
    assert!(response.cluster_unavailable.is_some());
    assert!(response.entities.is_empty());
}

#[test]
fn test_disabled_strategy_is_not_built() {
    let temp_dir = TempDir::new().unwrap();
    let mut settings = test_settings(temp_dir.path());
    settings.embeddings.strategies = vec![Strategy::Boolean];
    settings.clustering.enabled = false;

    let context = SearchContext::builder(settings)
        .corpus(fixture_corpus())
        .build()
        .unwrap();

    assert_eq!(context.build_report().strategies.len(), 1);
    assert!(!context.store().is_built(Strategy::Lexical));
    assert!(matches!(
        context.search("رستم", Strategy::Lexical, 2),
        Err(EngineError::Store(StoreError::StrategyUnavailable { .. }))
    ));
}

#[test]
fn test_empty_corpus() {
    let temp_dir = TempDir::new().unwrap();
    let context = SearchContext::builder(test_settings(temp_dir.path()))
        .corpus(shahnameh::Corpus::default())
        .sentence_encoder(keyword_encoder())
        .entities("characters", character_patterns())
        .build()
        .unwrap();

    assert!(context.search("رستم", Strategy::Sentence, 5).unwrap().is_empty());
    assert_eq!(context.predict_cluster("رستم").unwrap(), None);
    assert!(context.entity_ranks("رستم").is_empty());
}

#[test]
fn test_vocabulary_failure_leaves_sentence_and_clusters() {
    let temp_dir = TempDir::new().unwrap();
    let settings = test_settings(temp_dir.path());
    // A directory where the vocabulary file belongs can be neither read nor
    // replaced
    std::fs::create_dir_all(settings.embeddings_dir().join(VOCABULARY_FILE)).unwrap();

    let context = SearchContext::builder(settings)
        .corpus(fixture_corpus())
        .sentence_encoder(keyword_encoder())
        .word_vectors(fixture_word_vectors())
        .build()
        .unwrap();

    let unavailable = context.unavailable_strategies();
    for strategy in [Strategy::Lexical, Strategy::Boolean, Strategy::WordVector] {
        assert!(unavailable[&strategy].contains("vocabulary"), "{strategy}");
    }
    assert_eq!(
        context.available_strategies().collect::<Vec<_>>(),
        vec![Strategy::Sentence]
    );
    assert_eq!(context.search("رستم", Strategy::Sentence, 3).unwrap().len(), 3);
    assert!(context.predict_cluster("رستم").unwrap().is_some());
}

#[test]
fn test_query_time_failures_do_not_hide_other_signals() {
    let temp_dir = TempDir::new().unwrap();
    let encoder = FailingEncoder {
        inner: KeywordEncoder::new(&KEYWORDS),
        trigger: "خطا",
    };
    let context = SearchContext::builder(test_settings(temp_dir.path()))
        .corpus(fixture_corpus())
        .sentence_encoder(Arc::new(encoder))
        .entities("characters", character_patterns())
        .build()
        .unwrap();
    assert!(context.predict_cluster("رستم").unwrap().is_some());

    let response = context.retrieve("رستم خطا", 2).unwrap();
    assert!(response.cluster.is_none());
    assert!(response.cluster_unavailable.unwrap().contains("model crashed"));
    assert!(
        response
            .unavailable
            .iter()
            .any(|u| u.strategy == Strategy::Sentence && u.reason.contains("model crashed"))
    );
    let answered: Vec<Strategy> = response.results.iter().map(|r| r.strategy).collect();
    assert_eq!(answered, vec![Strategy::Lexical, Strategy::Boolean]);
    assert_eq!(response.entities[0].name, "رستم");
}
