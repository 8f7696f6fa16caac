//! The closed set of encoding strategies.
//!
//! Each variant owns the fit artifact it needs, so the same value embeds
//! documents at build time and queries at search time.

use std::sync::Arc;

use crate::embedding::{
    StaticWordVectors, StoreError, Strategy, TermVocabulary, TextEncoder, VectorDimension,
};

/// A ready-to-use encoder for one [`Strategy`].
#[derive(Clone)]
pub enum StrategyEncoder {
    Lexical(Arc<TermVocabulary>),
    Boolean(Arc<TermVocabulary>),
    WordVector {
        vectors: Arc<StaticWordVectors>,
        vocabulary: Arc<TermVocabulary>,
    },
    Sentence {
        encoder: Arc<dyn TextEncoder>,
        /// Texts per call into the encoder.
        batch_size: usize,
    },
}

impl std::fmt::Debug for StrategyEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyEncoder")
            .field("strategy", &self.strategy())
            .field("dimension", &self.dimension())
            .finish()
    }
}

impl StrategyEncoder {
    #[must_use]
    pub fn sentence(encoder: Arc<dyn TextEncoder>, batch_size: usize) -> Self {
        Self::Sentence {
            encoder,
            batch_size: batch_size.max(1),
        }
    }

    #[must_use]
    pub fn strategy(&self) -> Strategy {
        match self {
            Self::Lexical(_) => Strategy::Lexical,
            Self::Boolean(_) => Strategy::Boolean,
            Self::WordVector { .. } => Strategy::WordVector,
            Self::Sentence { .. } => Strategy::Sentence,
        }
    }

    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        match self {
            Self::Lexical(vocabulary) | Self::Boolean(vocabulary) => vocabulary.dimension(),
            Self::WordVector { vectors, .. } => vectors.dimension(),
            Self::Sentence { encoder, .. } => encoder.dimension(),
        }
    }

    /// Identity of the vector space, recorded in the manifest. Shards built
    /// under another fingerprint are not comparable with this encoder.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        match self {
            Self::Lexical(vocabulary) | Self::Boolean(vocabulary) => {
                format!("vocabulary:{}", vocabulary.fingerprint())
            }
            Self::WordVector {
                vectors,
                vocabulary,
            } => format!(
                "word-vectors:{}:{}:{}",
                vectors.source(),
                vectors.dimension(),
                vocabulary.fingerprint()
            ),
            Self::Sentence { encoder, .. } => {
                format!("{}:{}", encoder.name(), encoder.dimension())
            }
        }
    }

    /// Embeds a batch, one vector per text, each of [`Self::dimension`] width.
    pub fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, StoreError> {
        let vectors: Vec<Vec<f32>> = match self {
            Self::Lexical(vocabulary) => texts.iter().map(|t| vocabulary.tfidf_vector(t)).collect(),
            Self::Boolean(vocabulary) => {
                texts.iter().map(|t| vocabulary.boolean_vector(t)).collect()
            }
            Self::WordVector {
                vectors,
                vocabulary,
            } => texts
                .iter()
                .map(|t| vectors.idf_weighted_mean(t, vocabulary))
                .collect(),
            Self::Sentence {
                encoder,
                batch_size,
            } => {
                let mut out = Vec::with_capacity(texts.len());
                for chunk in texts.chunks(*batch_size) {
                    let batch = encoder.embed(chunk)?;
                    if batch.len() != chunk.len() {
                        return Err(StoreError::EmbeddingFailed(format!(
                            "encoder returned {} vectors for {} texts",
                            batch.len(),
                            chunk.len()
                        )));
                    }
                    out.extend(batch);
                }
                out
            }
        };

        let dimension = self.dimension();
        for vector in &vectors {
            dimension.validate_vector(vector)?;
        }
        Ok(vectors)
    }

    /// Embeds a single query text.
    pub fn embed_one(&self, text: &str) -> Result<Vec<f32>, StoreError> {
        self.embed(&[text])?
            .pop()
            .ok_or_else(|| StoreError::EmbeddingFailed("encoder returned no vector".to_string()))
    }
}
