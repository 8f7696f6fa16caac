//! Term vocabulary fitted over the whole corpus.
//!
//! The vocabulary is the fit artifact shared by the lexical and boolean
//! strategies (and the idf weights of the word-vector strategy). It is
//! persisted next to the shards so that query-time vectors live in exactly
//! the same space as the index.
//!
//! # Weighting
//! - features: n-grams ranked by total corpus count, top `max_features`
//!   kept (ties by term), then indexed alphabetically
//! - idf: `ln((1 + n) / (1 + df)) + 1`
//! - lexical: `(1 + ln(count)) * idf`, then L2-normalized
//! - boolean: `1.0` where the term occurs, `0.0` elsewhere

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::corpus::{Corpus, analyze, stop_words};
use crate::embedding::{StoreError, VectorDimension};
use crate::persist::atomic_write;

/// File name of the persisted vocabulary inside the embeddings directory.
pub const VOCABULARY_FILE: &str = "vocabulary.json";

/// Options controlling how the vocabulary is fit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyOptions {
    pub max_features: usize,
    pub ngram_range: (usize, usize),
    pub extra_stop_words: Vec<String>,
}

impl Default for VocabularyOptions {
    fn default() -> Self {
        Self {
            max_features: 20_000,
            ngram_range: (1, 2),
            extra_stop_words: Vec::new(),
        }
    }
}

/// Fitted n-gram vocabulary with idf weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermVocabulary {
    version: u32,
    corpus_fingerprint: String,
    options: VocabularyOptions,
    document_count: usize,
    /// Terms in feature-index order.
    terms: Vec<String>,
    idf: Vec<f32>,
    #[serde(skip)]
    index: HashMap<String, usize>,
    #[serde(skip)]
    stop_words: HashSet<String>,
}

impl TermVocabulary {
    /// Current on-disk format version.
    pub const CURRENT_VERSION: u32 = 1;

    /// Fits the vocabulary over every document of the corpus.
    #[must_use]
    pub fn fit(corpus: &Corpus, options: VocabularyOptions) -> Self {
        let stop = stop_words(&options.extra_stop_words);
        let mut totals: HashMap<String, usize> = HashMap::new();
        let mut document_frequency: HashMap<String, usize> = HashMap::new();

        for doc in corpus.documents() {
            let grams = analyze(&doc.text, &stop, options.ngram_range);
            let mut seen = HashSet::new();
            for gram in grams {
                *totals.entry(gram.clone()).or_default() += 1;
                if seen.insert(gram.clone()) {
                    *document_frequency.entry(gram).or_default() += 1;
                }
            }
        }

        let mut ranked: Vec<(String, usize)> = totals.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(options.max_features);

        let mut terms: Vec<String> = ranked.into_iter().map(|(term, _)| term).collect();
        terms.sort();

        let n = corpus.len() as f32;
        let idf = terms
            .iter()
            .map(|term| {
                let df = document_frequency.get(term).copied().unwrap_or(0) as f32;
                ((1.0 + n) / (1.0 + df)).ln() + 1.0
            })
            .collect();

        tracing::info!(
            "Fitted vocabulary: {} features over {} documents",
            terms.len(),
            corpus.len()
        );

        let mut vocabulary = Self {
            version: Self::CURRENT_VERSION,
            corpus_fingerprint: corpus.fingerprint(),
            options,
            document_count: corpus.len(),
            terms,
            idf,
            index: HashMap::new(),
            stop_words: HashSet::new(),
        };
        vocabulary.rebuild_lookup();
        vocabulary
    }

    /// Loads a persisted vocabulary and checks its format version.
    pub fn load(directory: &Path) -> Result<Self, StoreError> {
        let path = directory.join(VOCABULARY_FILE);
        let json = std::fs::read_to_string(&path)?;
        let mut vocabulary: Self =
            serde_json::from_str(&json).map_err(|e| StoreError::Serialization(e.to_string()))?;

        if vocabulary.version != Self::CURRENT_VERSION {
            return Err(StoreError::VersionMismatch {
                expected: Self::CURRENT_VERSION,
                actual: vocabulary.version,
            });
        }

        vocabulary.rebuild_lookup();
        Ok(vocabulary)
    }

    /// Reuses the persisted vocabulary when it was fit on this corpus with
    /// these options, otherwise fits and persists a new one.
    pub fn load_or_fit(
        directory: &Path,
        corpus: &Corpus,
        options: VocabularyOptions,
    ) -> Result<Self, StoreError> {
        match Self::load(directory) {
            Ok(existing)
                if existing.corpus_fingerprint == corpus.fingerprint()
                    && existing.options == options =>
            {
                tracing::debug!("Reusing vocabulary from {}", directory.display());
                return Ok(existing);
            }
            Ok(_) => tracing::warn!("Vocabulary is stale for this corpus; fitting again"),
            Err(e) => tracing::warn!("Vocabulary not loadable ({e}); fitting again"),
        }

        let vocabulary = Self::fit(corpus, options);
        vocabulary.save(directory)?;
        Ok(vocabulary)
    }

    /// Persists the vocabulary atomically.
    pub fn save(&self, directory: &Path) -> Result<(), StoreError> {
        let json =
            serde_json::to_vec_pretty(self).map_err(|e| StoreError::Serialization(e.to_string()))?;
        atomic_write(&directory.join(VOCABULARY_FILE), &json)?;
        Ok(())
    }

    fn rebuild_lookup(&mut self) {
        self.index = self
            .terms
            .iter()
            .enumerate()
            .map(|(i, term)| (term.clone(), i))
            .collect();
        self.stop_words = stop_words(&self.options.extra_stop_words);
    }

    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        VectorDimension::new(self.terms.len())
    }

    #[must_use]
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Idf weight of a term, `None` when the term is not a feature.
    #[must_use]
    pub fn idf(&self, term: &str) -> Option<f32> {
        self.index.get(term).map(|&i| self.idf[i])
    }

    /// Fingerprint of the corpus this vocabulary was fit on.
    #[must_use]
    pub fn corpus_fingerprint(&self) -> &str {
        &self.corpus_fingerprint
    }

    /// Identity of the vector space: terms, idf weights and analyzer options.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.options.ngram_range.0.to_le_bytes());
        hasher.update(self.options.ngram_range.1.to_le_bytes());
        for word in &self.options.extra_stop_words {
            hasher.update(word.as_bytes());
            hasher.update([0x1f]);
        }
        for (term, idf) in self.terms.iter().zip(&self.idf) {
            hasher.update(term.as_bytes());
            hasher.update(idf.to_le_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    /// Raw feature counts of one text, keyed by feature index.
    fn counts(&self, text: &str) -> BTreeMap<usize, usize> {
        let mut counts = BTreeMap::new();
        for gram in analyze(text, &self.stop_words, self.options.ngram_range) {
            if let Some(&i) = self.index.get(&gram) {
                *counts.entry(i).or_default() += 1;
            }
        }
        counts
    }

    /// Sublinear, L2-normalized tf-idf vector.
    #[must_use]
    pub fn tfidf_vector(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.terms.len()];
        for (i, count) in self.counts(text) {
            vector[i] = (1.0 + (count as f32).ln()) * self.idf[i];
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }

    /// Binary presence vector.
    #[must_use]
    pub fn boolean_vector(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.terms.len()];
        for i in self.counts(text).into_keys() {
            vector[i] = 1.0;
        }
        vector
    }
}
