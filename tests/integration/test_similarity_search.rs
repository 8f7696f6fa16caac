//! Two-stage top-n search over built shards.

use std::sync::Arc;

use shahnameh::embedding::{
    EmbeddingStore, StoreError, Strategy, StrategyEncoder, TermVocabulary, VocabularyOptions,
};
use shahnameh::search::search;
use tempfile::TempDir;

use crate::common::{KEYWORDS, KeywordEncoder, fixture_corpus, keyword_encoder};

fn lexical_encoder() -> StrategyEncoder {
    let corpus = fixture_corpus();
    StrategyEncoder::Lexical(Arc::new(TermVocabulary::fit(
        &corpus,
        VocabularyOptions::default(),
    )))
}

#[test]
fn test_exact_document_ranks_first() {
    let temp_dir = TempDir::new().unwrap();
    let corpus = fixture_corpus();
    let store = EmbeddingStore::new(temp_dir.path(), 4);
    let encoder = lexical_encoder();
    store.build(&corpus, std::slice::from_ref(&encoder));

    let target = corpus
        .documents()
        .iter()
        .position(|d| d.text.contains("ماردوش"))
        .unwrap();
    let hits = search(&store, &encoder, &corpus.documents()[target].text, 3).unwrap();

    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].document_id, target);
    assert!(hits[0].score.get() > 0.99);
    assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
}

#[test]
fn test_results_do_not_depend_on_shard_size() {
    let corpus = fixture_corpus();
    let encoder = StrategyEncoder::sentence(keyword_encoder(), 3);

    let small_dir = TempDir::new().unwrap();
    let small = EmbeddingStore::new(small_dir.path(), 2);
    small.build(&corpus, std::slice::from_ref(&encoder));

    let large_dir = TempDir::new().unwrap();
    let large = EmbeddingStore::new(large_dir.path(), 100);
    large.build(&corpus, std::slice::from_ref(&encoder));

    for query in ["رستم و سهراب", "فریدون", "هیچ"] {
        for n in [1, 5, 12] {
            assert_eq!(
                search(&small, &encoder, query, n).unwrap(),
                search(&large, &encoder, query, n).unwrap(),
                "query {query} n {n}"
            );
        }
    }
}

#[test]
fn test_ties_come_back_in_document_order() {
    let temp_dir = TempDir::new().unwrap();
    let corpus = fixture_corpus();
    let store = EmbeddingStore::new(temp_dir.path(), 3);
    let encoder = StrategyEncoder::sentence(keyword_encoder(), 3);
    store.build(&corpus, std::slice::from_ref(&encoder));

    // Three couplets mention only رستم and embed to the query's own vector
    let hits = search(&store, &encoder, "رستم", corpus.len()).unwrap();
    let tied: Vec<usize> = hits
        .iter()
        .filter(|hit| hit.score == hits[0].score)
        .map(|hit| hit.document_id)
        .collect();
    assert_eq!(tied.len(), 3);
    assert!(tied.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_limits() {
    let temp_dir = TempDir::new().unwrap();
    let corpus = fixture_corpus();
    let store = EmbeddingStore::new(temp_dir.path(), 5);
    let encoder = lexical_encoder();
    store.build(&corpus, std::slice::from_ref(&encoder));

    assert!(search(&store, &encoder, "رستم", 0).unwrap().is_empty());
    assert_eq!(
        search(&store, &encoder, "رستم", 100).unwrap().len(),
        corpus.len()
    );
}

#[test]
fn test_query_width_must_match_index() {
    let temp_dir = TempDir::new().unwrap();
    let corpus = fixture_corpus();
    let store = EmbeddingStore::new(temp_dir.path(), 5);
    store.build(
        &corpus,
        &[StrategyEncoder::sentence(keyword_encoder(), 3)],
    );

    let narrower = StrategyEncoder::sentence(Arc::new(KeywordEncoder::new(&KEYWORDS[..2])), 3);
    assert!(matches!(
        search(&store, &narrower, "رستم", 3),
        Err(StoreError::DimensionMismatch {
            expected: 7,
            actual: 3
        })
    ));
}

#[test]
fn test_unbuilt_strategy() {
    let temp_dir = TempDir::new().unwrap();
    let store = EmbeddingStore::new(temp_dir.path(), 5);
    assert!(matches!(
        search(&store, &lexical_encoder(), "رستم", 3),
        Err(StoreError::NotBuilt(Strategy::Lexical))
    ));
}

#[test]
fn test_index_from_another_encoder_is_refused() {
    let temp_dir = TempDir::new().unwrap();
    let corpus = fixture_corpus();
    let store = EmbeddingStore::new(temp_dir.path(), 5);
    store.build(
        &corpus,
        &[StrategyEncoder::sentence(
            Arc::new(KeywordEncoder::new(&["رستم", "ضحاک"])),
            3,
        )],
    );

    let swapped =
        StrategyEncoder::sentence(Arc::new(KeywordEncoder::new(&["سهراب", "فریدون"])), 3);
    assert!(matches!(
        search(&store, &swapped, "سهراب", 3),
        Err(StoreError::EncoderMismatch {
            strategy: Strategy::Sentence,
            ..
        })
    ));
}

#[test]
fn test_query_without_known_terms_scores_zero() {
    let temp_dir = TempDir::new().unwrap();
    let corpus = fixture_corpus();
    let store = EmbeddingStore::new(temp_dir.path(), 5);
    let lexical = lexical_encoder();
    let boolean = match &lexical {
        StrategyEncoder::Lexical(vocabulary) => StrategyEncoder::Boolean(Arc::clone(vocabulary)),
        _ => unreachable!(),
    };
    store.build(&corpus, &[lexical.clone(), boolean.clone()]);

    for encoder in [&lexical, &boolean] {
        let hits = search(&store, encoder, "کاملا ناشناخته", 5).unwrap();
        assert_eq!(hits.len(), 5.min(corpus.len()));
        assert!(hits.iter().all(|hit| hit.score.get() == 0.0));
        let ids: Vec<usize> = hits.iter().map(|hit| hit.document_id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    }
}
