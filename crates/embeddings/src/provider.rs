//! Trait definition for embedding providers

use async_trait::async_trait;
use catalogchat_core::error::Result;

/// Trait for embedding providers
///
/// Callers that maintain a vector index must compare
/// `embedding_dimension()` against the index's configured dimension
/// before writing or querying.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embeddings for a list of texts
    ///
    /// Returns one vector per input text, in input order.
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    /// Get the embedding dimension
    fn embedding_dimension(&self) -> usize;
}
