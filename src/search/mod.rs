//! Similarity Search: exact cosine scan over a strategy's shards.
//!
//! Each shard contributes its local top-n, then the concatenated candidates
//! are sorted once more and cut to n. Peak memory is bounded by the number
//! of shards times n rather than by the corpus size.
//!
//! Shards are scored in parallel, but candidates are gathered in shard order
//! and every sort is stable, so equal scores always come back in ascending
//! document id.

mod scoring;

pub use scoring::{SIMILARITY_EPSILON, SimilarityHit, cosine_similarity, shard_top_n};

use rayon::prelude::*;

use crate::embedding::{EmbeddingShard, EmbeddingStore, StoreError, StrategyEncoder};

/// Merges per-shard candidate lists, given in shard order, into a global
/// top-n.
#[must_use]
pub fn merge_top_n(candidates: Vec<Vec<SimilarityHit>>, n: usize) -> Vec<SimilarityHit> {
    let mut merged: Vec<SimilarityHit> = candidates.into_iter().flatten().collect();
    merged.sort_by(|a, b| b.score.cmp(&a.score));
    merged.truncate(n);
    merged
}

/// Top-n documents of `shards` for an already-embedded query.
///
/// Document ids continue across shards in the order given.
pub fn search_shards(
    shards: &[EmbeddingShard],
    query: &[f32],
    n: usize,
) -> Result<Vec<SimilarityHit>, StoreError> {
    if n == 0 || shards.is_empty() {
        return Ok(Vec::new());
    }

    for shard in shards {
        shard.dimension().validate_vector(query)?;
    }

    let offsets: Vec<usize> = shards
        .iter()
        .scan(0usize, |next, shard| {
            let offset = *next;
            *next += shard.rows();
            Some(offset)
        })
        .collect();

    let candidates: Vec<Vec<SimilarityHit>> = shards
        .par_iter()
        .zip(offsets.par_iter())
        .map(|(shard, &offset)| shard_top_n(shard, query, offset, n))
        .collect();

    Ok(merge_top_n(candidates, n))
}

/// Embeds `query` with `encoder` and returns the `n` most similar documents
/// from the store's shards for the same strategy.
///
/// # Errors
/// `NotBuilt` when the strategy has no complete shard set,
/// `DimensionMismatch` when the encoder's width disagrees with the index, and
/// `EncoderMismatch` when the index was built by another encoder of the same
/// width.
pub fn search(
    store: &EmbeddingStore,
    encoder: &StrategyEncoder,
    query: &str,
    n: usize,
) -> Result<Vec<SimilarityHit>, StoreError> {
    let strategy = encoder.strategy();
    let manifest = store.manifest(strategy)?;

    let vector = encoder.embed_one(query)?;
    if vector.len() != manifest.dimension {
        return Err(StoreError::DimensionMismatch {
            expected: manifest.dimension,
            actual: vector.len(),
        });
    }
    let current = encoder.fingerprint();
    if manifest.encoder_fingerprint != current {
        return Err(StoreError::EncoderMismatch {
            strategy,
            indexed: manifest.encoder_fingerprint,
            current,
        });
    }
    if n == 0 {
        return Ok(Vec::new());
    }

    let shards = store.load_shards(strategy)?;
    let hits = search_shards(&shards, &vector, n)?;
    tracing::debug!("'{strategy}' search returned {} hits", hits.len());
    Ok(hits)
}
