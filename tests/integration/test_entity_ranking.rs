//! Entity lists from CSV through to ranked query lookups.

use shahnameh::graph::{EntityRanker, GraphError, GraphOptions, load_patterns};
use tempfile::TempDir;

use crate::common::{character_patterns, fixture_corpus, place_patterns};

#[test]
fn test_patterns_load_from_csv() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("characters.csv");
    // The Arabic kaf in the second row is normalized; the third row is not
    // a valid regex and is skipped
    std::fs::write(&path, "regex,note\nرستم|تهمتن,hero\nكاوه,smith\n(سهراب,broken\n").unwrap();

    let patterns = load_patterns(&path).unwrap();
    let names: Vec<&str> = patterns.iter().map(|p| p.display_name()).collect();
    assert_eq!(names, vec!["رستم", "کاوه"]);
}

#[test]
fn test_missing_regex_column_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("places.csv");
    std::fs::write(&path, "name\nتوران\n").unwrap();

    assert!(matches!(
        load_patterns(&path),
        Err(GraphError::Row { row: 1, .. })
    ));
}

#[test]
fn test_every_surviving_entity_is_ranked() {
    let corpus = fixture_corpus();
    let texts = corpus.texts();
    let ranker = EntityRanker::build(
        "characters",
        &texts,
        character_patterns(),
        GraphOptions::default(),
    )
    .unwrap();

    // کیکاووس never appears in the corpus
    assert_eq!(ranker.len(), 6);
    assert!(ranker.table().iter().all(|e| e.name != "کیکاووس"));
    assert!(
        ranker
            .table()
            .windows(2)
            .all(|w| w[0].pagerank >= w[1].pagerank)
    );

    let total: f64 = ranker.table().iter().map(|e| e.pagerank).sum();
    assert!((total - 1.0).abs() < 1e-6);
    let hubs: f64 = ranker.table().iter().map(|e| e.hub).sum();
    assert!((hubs - 1.0).abs() < 1e-6);

    let rostam = ranker.table().iter().find(|e| e.name == "رستم").unwrap();
    assert_eq!(rostam.mentions, 4);
}

#[test]
fn test_query_matches_follow_rank_order() {
    let corpus = fixture_corpus();
    let texts = corpus.texts();
    let ranker =
        EntityRanker::build("places", &texts, place_patterns(), GraphOptions::default()).unwrap();

    let matches = ranker.query_ranks("از زابل تا توران و دماوند");
    assert_eq!(matches.len(), 3);
    assert!(matches.windows(2).all(|w| w[0].pagerank >= w[1].pagerank));
    assert!(matches.iter().all(|m| m.category == "places"));
    assert!(ranker.query_ranks("ایران").is_empty());
}

#[test]
fn test_zero_window_is_rejected() {
    let corpus = fixture_corpus();
    let options = GraphOptions {
        window_size: 0,
        ..GraphOptions::default()
    };
    assert!(matches!(
        EntityRanker::build("characters", &corpus.texts(), character_patterns(), options),
        Err(GraphError::InvalidWindow(0))
    ));
}
