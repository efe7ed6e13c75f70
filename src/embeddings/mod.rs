//! Embedding providers behind the [`EmbeddingProvider`] capability trait.
//!
//! The trait's single guarantee is positional: `embed` returns exactly one
//! vector per input text, in input order, regardless of how the provider
//! batches requests internally.

pub mod openai;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;

use crate::types::RagError;

pub use openai::OpenAiEmbeddingProvider;

/// Maps texts to fixed-dimension vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Provider name used in error attribution.
    fn name(&self) -> &'static str;

    /// Embeds every text, preserving order and count. A failure anywhere in
    /// the batch fails the whole call; no silent truncation.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError>;
}

/// Deterministic offline provider for tests and dry runs.
///
/// Vectors are derived from a hash of the text: identical texts embed
/// identically, different texts almost surely differ.
#[derive(Clone, Debug)]
pub struct MockEmbeddingProvider {
    dims: usize,
}

impl MockEmbeddingProvider {
    pub fn new() -> Self {
        Self { dims: 8 }
    }

    #[must_use]
    pub fn with_dims(mut self, dims: usize) -> Self {
        self.dims = dims;
        self
    }

    fn hash_to_vector(&self, text: &str) -> Vec<f32> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let seed = hasher.finish();
        (0..self.dims)
            .map(|i| {
                let bits = seed.rotate_left((i * 8) as u32) ^ ((i as u64) << 24);
                (bits as f32) / u32::MAX as f32
            })
            .collect()
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    fn name(&self) -> &'static str {
        "mock-embeddings"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        Ok(texts
            .iter()
            .map(|text| self.hash_to_vector(text))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_preserves_order_and_count() {
        let provider = MockEmbeddingProvider::new();
        let texts: Vec<String> = (0..17).map(|i| format!("text {i}")).collect();
        let vectors = provider.embed(&texts).await.unwrap();
        assert_eq!(vectors.len(), texts.len());

        // Positional correspondence: re-embedding a single text matches its
        // slot in the batch result.
        let solo = provider.embed(&texts[5..6]).await.unwrap();
        assert_eq!(solo[0], vectors[5]);
    }

    #[tokio::test]
    async fn mock_is_deterministic() {
        let provider = MockEmbeddingProvider::new();
        let texts = vec!["hello".to_string(), "world".to_string()];
        let first = provider.embed(&texts).await.unwrap();
        let second = provider.embed(&texts).await.unwrap();
        assert_eq!(first, second);
        assert_ne!(first[0], first[1]);
    }
}
