//! The verse corpus: labeled couplets loaded once per build.
//!
//! Texts are normalized and the corpus is sorted by text before anything is
//! embedded, so document ids and shard boundaries are reproducible across
//! rebuilds of the same input.

mod stop_words;
mod text;

pub use stop_words::stop_words;
pub use text::{ZWNJ, analyze, normalize, normalize_pattern, word_tokenize};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Separator between the two half-lines of a couplet.
pub const HEMISTICH_SEPARATOR: &str = " - ";

/// Errors raised while loading corpus or entity tables.
#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("Failed to read '{path}': {source}\nSuggestion: Check the corpus path in settings.toml")]
    Read { path: PathBuf, source: csv::Error },

    #[error(
        "Malformed row {row} in '{path}': {source}\nSuggestion: The file needs a header row with the expected columns"
    )]
    Row {
        path: PathBuf,
        row: usize,
        source: csv::Error,
    },
}

/// A single labeled couplet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    #[serde(rename = "labels", alias = "topic_label", alias = "label")]
    pub topic_label: String,
}

impl Document {
    pub fn new(text: impl Into<String>, topic_label: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            topic_label: topic_label.into(),
        }
    }

    /// The two half-lines of the couplet. A text without the separator is
    /// returned whole as the first half.
    #[must_use]
    pub fn hemistichs(&self) -> (&str, &str) {
        match self.text.split_once(HEMISTICH_SEPARATOR) {
            Some((first, second)) => (first.trim(), second.trim()),
            None => (self.text.trim(), ""),
        }
    }
}

/// Position of a document in the sorted corpus.
pub type DocumentId = usize;

/// Immutable, sorted collection of documents.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    documents: Vec<Document>,
}

impl Corpus {
    /// Normalizes every text and sorts by it. The sort is stable, so rows
    /// with identical text keep their input order.
    #[must_use]
    pub fn from_documents(documents: Vec<Document>) -> Self {
        let mut documents: Vec<Document> = documents
            .into_iter()
            .map(|doc| Document {
                text: normalize(&doc.text),
                topic_label: doc.topic_label.trim().to_string(),
            })
            .collect();
        documents.sort_by(|a, b| a.text.cmp(&b.text));
        Self { documents }
    }

    /// Loads a CSV table with `text` and `labels` columns.
    pub fn load_csv(path: impl AsRef<Path>) -> Result<Self, CorpusError> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)
            .map_err(|source| CorpusError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let mut documents = Vec::new();
        for (row, record) in reader.deserialize::<Document>().enumerate() {
            let document = record.map_err(|source| CorpusError::Row {
                path: path.to_path_buf(),
                row: row + 1,
                source,
            })?;
            documents.push(document);
        }

        tracing::info!("Loaded {} documents from {}", documents.len(), path.display());
        Ok(Self::from_documents(documents))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: DocumentId) -> Option<&Document> {
        self.documents.get(id)
    }

    #[must_use]
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Borrowed texts in document-id order.
    #[must_use]
    pub fn texts(&self) -> Vec<&str> {
        self.documents.iter().map(|d| d.text.as_str()).collect()
    }

    /// SHA-256 over every (text, label) row in order.
    ///
    /// Persisted artifacts record this value; a mismatch means the corpus
    /// changed since the artifact was built.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for doc in &self.documents {
            hasher.update(doc.text.as_bytes());
            hasher.update([0x1f]);
            hasher.update(doc.topic_label.as_bytes());
            hasher.update([0x1e]);
        }
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_corpus_is_sorted_and_normalized() {
        let corpus = Corpus::from_documents(vec![
            Document::new("سهراب يل - به میدان رسید", "سهراب"),
            Document::new("آغاز  کتاب - به نام خداوند", "آغاز"),
        ]);

        assert_eq!(corpus.len(), 2);
        assert!(corpus.get(0).unwrap().text.starts_with("آغاز کتاب"));
        assert_eq!(corpus.get(1).unwrap().text, "سهراب یل - به میدان رسید");
    }

    #[test]
    fn test_hemistichs() {
        let doc = Document::new("به نام خداوند جان و خرد - کزین برتر اندیشه برنگذرد", "آغاز");
        assert_eq!(
            doc.hemistichs(),
            ("به نام خداوند جان و خرد", "کزین برتر اندیشه برنگذرد")
        );

        let single = Document::new("بیتی بی‌جدا", "x");
        assert_eq!(single.hemistichs(), ("بیتی بی‌جدا", ""));
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = Corpus::from_documents(vec![Document::new("الف", "x")]);
        let b = Corpus::from_documents(vec![Document::new("الف", "x")]);
        let c = Corpus::from_documents(vec![Document::new("الف", "y")]);

        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }

    #[test]
    fn test_load_csv() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("corpus.csv");
        std::fs::write(
            &path,
            "text,labels\n\"رستم - تهمتن\",رستم و سهراب\n\"آغاز - سخن\",آغاز\n",
        )
        .unwrap();

        let corpus = Corpus::load_csv(&path).unwrap();
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.get(0).unwrap().topic_label, "آغاز");
        assert_eq!(corpus.get(1).unwrap().topic_label, "رستم و سهراب");
    }

    #[test]
    fn test_load_csv_missing_file() {
        let result = Corpus::load_csv("/nonexistent/corpus.csv");
        assert!(matches!(result, Err(CorpusError::Read { .. })));
    }
}
