//! Cosine scoring of one shard.

use serde::Serialize;

use crate::corpus::DocumentId;
use crate::embedding::{EmbeddingShard, Score};

/// Added to the cosine denominator so all-zero vectors score 0 instead of NaN.
pub const SIMILARITY_EPSILON: f32 = 1e-10;

/// One scored document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SimilarityHit {
    pub document_id: DocumentId,
    pub score: Score,
}

/// Cosine similarity with an epsilon-guarded denominator.
///
/// Both vectors must have the same width.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "Vectors must have same dimension");

    let dot_product: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    dot_product / (norm_a * norm_b + SIMILARITY_EPSILON)
}

/// The `n` best rows of a shard, ids shifted by `offset`.
///
/// Ties keep ascending row order.
#[must_use]
pub fn shard_top_n(
    shard: &EmbeddingShard,
    query: &[f32],
    offset: DocumentId,
    n: usize,
) -> Vec<SimilarityHit> {
    let mut hits: Vec<SimilarityHit> = shard
        .iter_rows()
        .enumerate()
        .filter_map(|(row, vector)| {
            Score::new(cosine_similarity(query, &vector))
                .ok()
                .map(|score| SimilarityHit {
                    document_id: offset + row,
                    score,
                })
        })
        .collect();

    hits.sort_by(|a, b| b.score.cmp(&a.score));
    hits.truncate(n);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{ShardIndex, Strategy, VectorDimension};
    use tempfile::TempDir;

    #[test]
    fn test_cosine_similarity() {
        let a = [1.0, 0.0];
        let b = [0.0, 1.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
        assert!((cosine_similarity(&a, &[-2.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_vectors_score_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_shard_top_n_orders_and_offsets() {
        let temp_dir = TempDir::new().unwrap();
        EmbeddingShard::write(
            temp_dir.path(),
            Strategy::Sentence,
            ShardIndex::new(1),
            VectorDimension::new(2),
            &[
                vec![0.0, 1.0],
                vec![1.0, 0.0],
                vec![1.0, 1.0],
                vec![1.0, 0.0],
            ],
        )
        .unwrap();
        let shard =
            EmbeddingShard::open(temp_dir.path(), Strategy::Sentence, ShardIndex::new(1)).unwrap();

        let hits = shard_top_n(&shard, &[1.0, 0.0], 100, 3);
        let ids: Vec<_> = hits.iter().map(|h| h.document_id).collect();
        // Rows 1 and 3 tie; ascending row order wins
        assert_eq!(ids, vec![101, 103, 102]);
    }
}
