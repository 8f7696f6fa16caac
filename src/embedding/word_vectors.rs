//! Static per-token word vectors in word2vec text format.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::corpus::{normalize, word_tokenize};
use crate::embedding::{StoreError, TermVocabulary, VectorDimension};

/// A lookup table from token to a fixed-width vector.
#[derive(Debug, Clone)]
pub struct StaticWordVectors {
    vectors: HashMap<String, Vec<f32>>,
    dimension: VectorDimension,
    source: String,
}

impl StaticWordVectors {
    /// Builds a table from in-memory pairs. All vectors must share a width.
    pub fn from_pairs(
        pairs: impl IntoIterator<Item = (String, Vec<f32>)>,
        dimension: VectorDimension,
        source: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let mut vectors = HashMap::new();
        for (word, vector) in pairs {
            dimension.validate_vector(&vector)?;
            vectors.insert(normalize(&word), vector);
        }
        Ok(Self {
            vectors,
            dimension,
            source: source.into(),
        })
    }

    /// Loads the word2vec text format: a `count dim` header line, then
    /// `word v1 v2 ... vdim` per line.
    pub fn load_word2vec_text(path: &Path) -> Result<Self, StoreError> {
        let fail = |reason: String| StoreError::WordVectors {
            path: path.display().to_string(),
            reason,
        };

        let reader = BufReader::new(File::open(path)?);
        let mut lines = reader.lines();

        let header = lines
            .next()
            .ok_or_else(|| fail("file is empty".to_string()))??;
        let mut fields = header.split_whitespace();
        let declared: usize = fields
            .next()
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| fail(format!("invalid header '{header}'")))?;
        let width: usize = fields
            .next()
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| fail(format!("invalid header '{header}'")))?;

        let mut pairs = Vec::with_capacity(declared);
        for (line_no, line) in lines.enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let mut parts = line.split(' ').filter(|p| !p.is_empty());
            let Some(word) = parts.next() else { continue };
            let vector = parts
                .map(str::parse::<f32>)
                .collect::<Result<Vec<f32>, _>>()
                .map_err(|e| fail(format!("line {}: {e}", line_no + 2)))?;
            if vector.len() != width {
                return Err(fail(format!(
                    "line {}: expected {width} values, got {}",
                    line_no + 2,
                    vector.len()
                )));
            }
            pairs.push((word.to_string(), vector));
        }

        if pairs.len() != declared {
            tracing::warn!(
                "{} declares {declared} words but contains {}",
                path.display(),
                pairs.len()
            );
        }

        Self::from_pairs(pairs, VectorDimension::new(width), path.display().to_string())
    }

    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    #[must_use]
    pub fn get(&self, word: &str) -> Option<&[f32]> {
        self.vectors.get(word).map(Vec::as_slice)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Where the table came from, recorded in manifests.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Mean over the text's tokens of `vector(token) * idf(token)`.
    ///
    /// Unknown tokens contribute a zero vector but still count toward the
    /// mean. A text without tokens maps to the zero vector.
    #[must_use]
    pub fn idf_weighted_mean(&self, text: &str, vocabulary: &TermVocabulary) -> Vec<f32> {
        let width = self.dimension.get();
        let mut sum = vec![0.0f32; width];
        let tokens = word_tokenize(text);
        if tokens.is_empty() {
            return sum;
        }

        for token in &tokens {
            let weight = vocabulary.idf(token).unwrap_or(0.0);
            if weight == 0.0 {
                continue;
            }
            if let Some(vector) = self.get(token) {
                for (acc, value) in sum.iter_mut().zip(vector) {
                    *acc += value * weight;
                }
            }
        }

        let count = tokens.len() as f32;
        for value in &mut sum {
            *value /= count;
        }
        sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{Corpus, Document};
    use crate::embedding::VocabularyOptions;
    use tempfile::TempDir;

    #[test]
    fn test_load_word2vec_text() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("vectors.txt");
        std::fs::write(&path, "2 3\nرستم 1.0 0.0 0.5\nسهراب 0.0 1.0 -0.5\n").unwrap();

        let vectors = StaticWordVectors::load_word2vec_text(&path).unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors.dimension().get(), 3);
        assert_eq!(vectors.get("سهراب").unwrap(), &[0.0, 1.0, -0.5]);
    }

    #[test]
    fn test_load_rejects_ragged_rows() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("vectors.txt");
        std::fs::write(&path, "1 3\nرستم 1.0 0.0\n").unwrap();

        assert!(matches!(
            StaticWordVectors::load_word2vec_text(&path),
            Err(StoreError::WordVectors { .. })
        ));
    }

    #[test]
    fn test_idf_weighted_mean() {
        let corpus = Corpus::from_documents(vec![
            Document::new("رستم سهراب", "a"),
            Document::new("رستم", "a"),
        ]);
        let vocabulary = TermVocabulary::fit(
            &corpus,
            VocabularyOptions {
                ngram_range: (1, 1),
                ..VocabularyOptions::default()
            },
        );
        let vectors = StaticWordVectors::from_pairs(
            vec![
                ("رستم".to_string(), vec![1.0, 0.0]),
                ("سهراب".to_string(), vec![0.0, 1.0]),
            ],
            VectorDimension::new(2),
            "memory",
        )
        .unwrap();

        let idf_rostam = vocabulary.idf("رستم").unwrap();
        let idf_sohrab = vocabulary.idf("سهراب").unwrap();

        // Two tokens plus one unknown token in the denominator
        let mean = vectors.idf_weighted_mean("رستم سهراب ناشناس", &vocabulary);
        assert!((mean[0] - idf_rostam / 3.0).abs() < 1e-6);
        assert!((mean[1] - idf_sohrab / 3.0).abs() < 1e-6);

        assert_eq!(vectors.idf_weighted_mean("", &vocabulary), vec![0.0, 0.0]);
    }
}
