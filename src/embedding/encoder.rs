//! Neural text encoders.
//!
//! The store consumes sentence encoders only through [`TextEncoder`]: a batch
//! of strings in, one fixed-width vector per string out. [`FastEmbedEncoder`]
//! is the production implementation; tests plug in deterministic encoders.

use crate::embedding::{StoreError, VectorDimension};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::path::Path;
use std::sync::Mutex;

/// Capability contract for batch text encoders.
///
/// Implementations must be deterministic for identical input and always
/// return vectors of [`TextEncoder::dimension`] width.
pub trait TextEncoder: Send + Sync {
    /// Generate one embedding per input text.
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, StoreError>;

    /// Width of every produced vector.
    #[must_use]
    fn dimension(&self) -> VectorDimension;

    /// Stable identifier recorded in manifests; a different name means a
    /// different vector space.
    #[must_use]
    fn name(&self) -> String;
}

/// Resolves a configured model name to a fastembed model.
pub fn parse_embedding_model(name: &str) -> Result<EmbeddingModel, StoreError> {
    match name {
        "AllMiniLML6V2" => Ok(EmbeddingModel::AllMiniLML6V2),
        "AllMiniLML12V2" => Ok(EmbeddingModel::AllMiniLML12V2),
        "ParaphraseMLMiniLML12V2" => Ok(EmbeddingModel::ParaphraseMLMiniLML12V2),
        "MultilingualE5Small" => Ok(EmbeddingModel::MultilingualE5Small),
        "MultilingualE5Base" => Ok(EmbeddingModel::MultilingualE5Base),
        other => Err(StoreError::EmbeddingFailed(format!(
            "Unsupported embedding model '{other}'. Supported: AllMiniLML6V2, AllMiniLML12V2, ParaphraseMLMiniLML12V2, MultilingualE5Small, MultilingualE5Base"
        ))),
    }
}

/// fastembed-backed sentence encoder (mean-pooled transformer output).
pub struct FastEmbedEncoder {
    model: Mutex<TextEmbedding>,
    model_name: String,
    dimension: VectorDimension,
    batch_size: usize,
}

impl std::fmt::Debug for FastEmbedEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedEncoder")
            .field("model", &self.model_name)
            .field("dimension", &self.dimension)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl FastEmbedEncoder {
    /// Loads the named model, downloading it into `cache_dir` on first use.
    ///
    /// # Errors
    /// Returns an error if the model name is unknown or the model fails to
    /// initialize.
    pub fn new(model_name: &str, cache_dir: &Path, batch_size: usize) -> Result<Self, StoreError> {
        let model = parse_embedding_model(model_name)?;

        let mut text_model = TextEmbedding::try_new(
            InitOptions::new(model)
                .with_cache_dir(cache_dir.to_path_buf())
                .with_show_download_progress(true),
        )
        .map_err(|e| StoreError::EmbeddingFailed(
            format!("Failed to initialize embedding model: {e}. Ensure you have internet connection for first-time model download")
        ))?;

        // Width comes from the model itself, not a per-model table
        let sample = text_model
            .embed(vec!["sample"], None)
            .map_err(|e| StoreError::EmbeddingFailed(e.to_string()))?;
        let width = sample.first().map(Vec::len).ok_or_else(|| {
            StoreError::EmbeddingFailed("Model returned no embedding for a sample text".to_string())
        })?;

        tracing::info!("Loaded embedding model {model_name} ({width} dimensions)");

        Ok(Self {
            model: Mutex::new(text_model),
            model_name: model_name.to_string(),
            dimension: VectorDimension::new(width),
            batch_size: batch_size.max(1),
        })
    }
}

impl TextEncoder for FastEmbedEncoder {
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, StoreError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let text_strings: Vec<String> = texts.iter().map(|&s| s.to_string()).collect();

        let embeddings = self
            .model
            .lock()
            .map_err(|_| {
                StoreError::EmbeddingFailed(
                    "Failed to acquire embedding model lock - model may be poisoned".to_string(),
                )
            })?
            .embed(text_strings, Some(self.batch_size))
            .map_err(|e| StoreError::EmbeddingFailed(format!("Failed to generate embeddings: {e}")))?;

        for embedding in &embeddings {
            self.dimension.validate_vector(embedding)?;
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    fn name(&self) -> String {
        format!("fastembed:{}", self.model_name)
    }
}

/// Deterministic encoder for unit tests: one axis per keyword.
#[cfg(test)]
pub struct KeywordEncoder {
    keywords: Vec<&'static str>,
}

#[cfg(test)]
impl KeywordEncoder {
    pub fn new(keywords: Vec<&'static str>) -> Self {
        Self { keywords }
    }
}

#[cfg(test)]
impl TextEncoder for KeywordEncoder {
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, StoreError> {
        Ok(texts
            .iter()
            .map(|text| {
                // Trailing bias axis keeps keyword-free texts off the origin
                let mut vector: Vec<f32> = self
                    .keywords
                    .iter()
                    .map(|k| text.matches(k).count() as f32)
                    .collect();
                vector.push(0.1);
                vector
            })
            .collect())
    }

    fn dimension(&self) -> VectorDimension {
        VectorDimension::new(self.keywords.len() + 1)
    }

    fn name(&self) -> String {
        format!("keywords:{}", self.keywords.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_embedding_model() {
        assert!(parse_embedding_model("MultilingualE5Small").is_ok());
        assert!(parse_embedding_model("AllMiniLML6V2").is_ok());
        assert!(matches!(
            parse_embedding_model("gpt"),
            Err(StoreError::EmbeddingFailed(_))
        ));
    }

    #[test]
    fn test_keyword_encoder_width() {
        let encoder = KeywordEncoder::new(vec!["رستم", "سهراب"]);
        let vectors = encoder.embed(&["رستم و رستم", "هیچ"]).unwrap();
        assert_eq!(vectors[0], vec![2.0, 0.0, 0.1]);
        assert_eq!(vectors[1], vec![0.0, 0.0, 0.1]);
        assert_eq!(encoder.dimension().get(), 3);
    }
}
