//! Cluster model build, reuse and prediction.

use shahnameh::Corpus;
use shahnameh::cluster::{
    CLUSTER_IDS_FILE, ClusterEngine, ClusterOptions, EMBEDDINGS_FILE, KMEANS_FILE,
    KMeansOptions, PCA_FILE, SUMMARY_LABELS,
};
use shahnameh::embedding::{EmbeddingStore, StrategyEncoder};
use tempfile::TempDir;

use crate::common::{fixture_corpus, fixture_documents, keyword_encoder};

fn options() -> ClusterOptions {
    ClusterOptions {
        pca_dim: 4,
        kmeans: KMeansOptions {
            k: 3,
            max_iter: 100,
            n_init: 4,
            seed: 42,
        },
    }
}

fn encoder() -> StrategyEncoder {
    StrategyEncoder::sentence(keyword_encoder(), 4)
}

#[test]
fn test_build_persists_four_artifacts() {
    let temp_dir = TempDir::new().unwrap();
    let corpus = fixture_corpus();
    let engine =
        ClusterEngine::open_or_build(temp_dir.path(), &corpus, encoder(), options(), None).unwrap();

    for file in [PCA_FILE, EMBEDDINGS_FILE, KMEANS_FILE, CLUSTER_IDS_FILE] {
        assert!(temp_dir.path().join(file).exists(), "{file} missing");
    }

    let model = engine.model().unwrap();
    assert_eq!(model.k(), 3);
    assert_eq!(model.cluster_ids().len(), corpus.len());
    assert!(model.cluster_ids().iter().all(|&c| c < 3));

    let counted: usize = model
        .label_summary()
        .values()
        .flat_map(|labels| labels.iter().map(|l| l.count))
        .sum();
    assert!(counted <= corpus.len());
    for labels in model.label_summary().values() {
        assert!(labels.len() <= SUMMARY_LABELS);
        assert!(labels.windows(2).all(|w| w[0].count >= w[1].count));
    }
}

#[test]
fn test_document_text_predicts_its_own_cluster() {
    let temp_dir = TempDir::new().unwrap();
    let corpus = fixture_corpus();
    let engine =
        ClusterEngine::open_or_build(temp_dir.path(), &corpus, encoder(), options(), None).unwrap();
    let model = engine.model().unwrap();

    for (id, document) in corpus.documents().iter().enumerate() {
        let prediction = engine.predict(&document.text).unwrap().unwrap();
        assert_eq!(prediction.cluster_id, model.cluster_ids()[id]);
        assert_eq!(prediction.top_labels, model.labels_for(prediction.cluster_id));
    }
}

#[test]
fn test_reopen_loads_without_refitting() {
    let temp_dir = TempDir::new().unwrap();
    let corpus = fixture_corpus();
    let built =
        ClusterEngine::open_or_build(temp_dir.path(), &corpus, encoder(), options(), None).unwrap();
    let modified = std::fs::metadata(temp_dir.path().join(KMEANS_FILE))
        .unwrap()
        .modified()
        .unwrap();

    let loaded =
        ClusterEngine::open_or_build(temp_dir.path(), &corpus, encoder(), options(), None).unwrap();
    assert_eq!(
        std::fs::metadata(temp_dir.path().join(KMEANS_FILE))
            .unwrap()
            .modified()
            .unwrap(),
        modified
    );
    assert_eq!(
        built.model().unwrap().cluster_ids(),
        loaded.model().unwrap().cluster_ids()
    );
    assert_eq!(
        built.model().unwrap().label_summary(),
        loaded.model().unwrap().label_summary()
    );
}

#[test]
fn test_changed_corpus_refits() {
    let temp_dir = TempDir::new().unwrap();
    ClusterEngine::open_or_build(
        temp_dir.path(),
        &fixture_corpus(),
        encoder(),
        options(),
        None,
    )
    .unwrap();

    let mut documents = fixture_documents();
    documents.truncate(6);
    let smaller = Corpus::from_documents(documents);
    let engine =
        ClusterEngine::open_or_build(temp_dir.path(), &smaller, encoder(), options(), None)
            .unwrap();
    assert_eq!(engine.model().unwrap().cluster_ids().len(), 6);
}

#[test]
fn test_store_shards_are_reused() {
    let store_dir = TempDir::new().unwrap();
    let cluster_dir = TempDir::new().unwrap();
    let corpus = fixture_corpus();
    let store = EmbeddingStore::new(store_dir.path(), 5);
    store.build(&corpus, &[encoder()]);

    let from_store = ClusterEngine::open_or_build(
        cluster_dir.path(),
        &corpus,
        encoder(),
        options(),
        Some(&store),
    )
    .unwrap();

    let direct_dir = TempDir::new().unwrap();
    let direct =
        ClusterEngine::open_or_build(direct_dir.path(), &corpus, encoder(), options(), None)
            .unwrap();

    assert_eq!(
        from_store.model().unwrap().raw_embeddings(),
        direct.model().unwrap().raw_embeddings()
    );
    assert_eq!(
        from_store.model().unwrap().cluster_ids(),
        direct.model().unwrap().cluster_ids()
    );
}
