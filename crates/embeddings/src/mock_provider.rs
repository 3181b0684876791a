//! Mock embedding provider for testing

use crate::provider::EmbeddingProvider;
use async_trait::async_trait;
use catalogchat_core::error::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};

/// Mock embedding provider that returns deterministic embeddings
pub struct MockEmbeddingProvider {
    embedding_dim: usize,
    fail: AtomicBool,
}

impl MockEmbeddingProvider {
    /// Create a new mock provider with specified embedding dimension
    pub fn new(embedding_dim: usize) -> Self {
        Self {
            embedding_dim,
            fail: AtomicBool::new(false),
        }
    }

    /// Make subsequent embed calls fail
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::embedding("mock embedding failure"));
        }
        // Deterministic per-text values so tests can tell vectors apart
        Ok(texts
            .into_iter()
            .map(|t| {
                let seed = t.len() as f32;
                vec![seed; self.embedding_dim]
            })
            .collect())
    }

    fn embedding_dimension(&self) -> usize {
        self.embedding_dim
    }
}
