//! Shard builds: completeness, skipping, staleness and row fidelity.

use std::sync::Arc;

use shahnameh::Corpus;
use shahnameh::embedding::{
    BuildOutcome, EmbeddingShard, EmbeddingStore, ShardIndex, Strategy, StrategyEncoder,
    StrategyManifest, TermVocabulary, VocabularyOptions,
};
use tempfile::TempDir;

use crate::common::{fixture_corpus, fixture_documents, fixture_word_vectors, keyword_encoder};

fn encoders(corpus: &Corpus) -> Vec<StrategyEncoder> {
    let vocabulary = Arc::new(TermVocabulary::fit(corpus, VocabularyOptions::default()));
    vec![
        StrategyEncoder::Lexical(Arc::clone(&vocabulary)),
        StrategyEncoder::Boolean(Arc::clone(&vocabulary)),
        StrategyEncoder::WordVector {
            vectors: fixture_word_vectors(),
            vocabulary,
        },
        StrategyEncoder::sentence(keyword_encoder(), 4),
    ]
}

#[test]
fn test_build_writes_every_strategy() {
    let temp_dir = TempDir::new().unwrap();
    let corpus = fixture_corpus();
    let store = EmbeddingStore::new(temp_dir.path(), 5);

    let report = store.build(&corpus, &encoders(&corpus));
    assert!(report.is_success());

    for strategy in Strategy::ALL {
        assert_eq!(
            report.outcome(strategy),
            Some(&BuildOutcome::Built {
                shards: 3,
                documents: 12
            })
        );
        let manifest = store.manifest(strategy).unwrap();
        assert_eq!(manifest.shard_count, 3);
        assert_eq!(manifest.document_count, corpus.len());
        assert_eq!(manifest.corpus_fingerprint, corpus.fingerprint());

        let shards = store.load_shards(strategy).unwrap();
        let rows: Vec<usize> = shards.iter().map(EmbeddingShard::rows).collect();
        assert_eq!(rows, vec![5, 5, 2]);
    }
}

#[test]
fn test_shard_rows_equal_direct_embeddings() {
    let temp_dir = TempDir::new().unwrap();
    let corpus = fixture_corpus();
    let store = EmbeddingStore::new(temp_dir.path(), 5);
    let encoders = encoders(&corpus);
    store.build(&corpus, &encoders);

    for encoder in &encoders {
        let expected = encoder.embed(&corpus.texts()).unwrap();
        let stored = store.load_matrix(encoder.strategy()).unwrap();
        assert_eq!(stored, expected, "strategy {}", encoder.strategy());
    }
}

#[test]
fn test_second_build_skips_and_leaves_files_alone() {
    let temp_dir = TempDir::new().unwrap();
    let corpus = fixture_corpus();
    let store = EmbeddingStore::new(temp_dir.path(), 5);
    let encoders = encoders(&corpus);
    store.build(&corpus, &encoders);

    let listing = || {
        let mut names: Vec<(String, std::time::SystemTime)> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|entry| {
                let entry = entry.unwrap();
                (
                    entry.file_name().to_string_lossy().into_owned(),
                    entry.metadata().unwrap().modified().unwrap(),
                )
            })
            .collect();
        names.sort();
        names
    };
    let before = listing();

    let report = store.build(&corpus, &encoders);
    assert!(
        report
            .strategies
            .iter()
            .all(|s| s.outcome == BuildOutcome::Skipped)
    );
    assert_eq!(listing(), before);
}

#[test]
fn test_missing_shard_forces_rebuild() {
    let temp_dir = TempDir::new().unwrap();
    let corpus = fixture_corpus();
    let store = EmbeddingStore::new(temp_dir.path(), 5);
    let encoders = encoders(&corpus);
    store.build(&corpus, &encoders);

    std::fs::remove_file(EmbeddingShard::path_for(
        temp_dir.path(),
        Strategy::Boolean,
        ShardIndex::new(1),
    ))
    .unwrap();
    assert!(!store.is_built(Strategy::Boolean));

    let report = store.build(&corpus, &encoders);
    assert!(matches!(
        report.outcome(Strategy::Boolean),
        Some(BuildOutcome::Built { .. })
    ));
    assert_eq!(report.outcome(Strategy::Lexical), Some(&BuildOutcome::Skipped));
    assert_eq!(store.load_shards(Strategy::Boolean).unwrap().len(), 3);
}

#[test]
fn test_changed_corpus_is_detected() {
    let temp_dir = TempDir::new().unwrap();
    let corpus = fixture_corpus();
    let store = EmbeddingStore::new(temp_dir.path(), 5);
    let sentence = vec![StrategyEncoder::sentence(keyword_encoder(), 4)];
    store.build(&corpus, &sentence);

    let mut documents = fixture_documents();
    documents.truncate(4);
    let smaller = Corpus::from_documents(documents);

    let report = store.build(&smaller, &sentence);
    assert_eq!(
        report.outcome(Strategy::Sentence),
        Some(&BuildOutcome::Built {
            shards: 1,
            documents: 4
        })
    );
    // Leftover shards of the larger build are gone
    assert!(
        !EmbeddingShard::path_for(temp_dir.path(), Strategy::Sentence, ShardIndex::new(2))
            .exists()
    );
    let manifest = StrategyManifest::load(temp_dir.path(), Strategy::Sentence).unwrap();
    assert_eq!(manifest.document_count, 4);
}
