//! OpenAI-compatible API provider for embeddings (vLLM, OpenAI, etc.)

use crate::{error::EmbeddingError, provider::EmbeddingProvider};
use async_openai::types::{CreateEmbeddingRequest, EmbeddingInput};
use async_openai::{config::OpenAIConfig, Client};
use async_trait::async_trait;
use catalogchat_core::config::EmbeddingsConfig;
use catalogchat_core::error::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const RETRY_ATTEMPTS: usize = 3;
const RETRY_BASE_DELAY_MS: u64 = 250;

/// OpenAI-compatible API provider
pub struct OpenAiApiProvider {
    client: Client<OpenAIConfig>,
    model: String,
    dimensions: usize,
}

impl OpenAiApiProvider {
    /// Create a new API provider from configuration
    pub(crate) fn new(config: &EmbeddingsConfig) -> Result<Self> {
        if config.dimension == 0 {
            return Err(
                EmbeddingError::ConfigError("embedding dimension must be non-zero".into()).into(),
            );
        }

        info!("Initializing OpenAI-compatible API embeddings");
        info!("  Model: {}", config.model);
        info!("  Dimensions: {}", config.dimension);
        info!("  Base URL: {}", config.api_base_url);

        let mut openai_config = OpenAIConfig::new().with_api_base(&config.api_base_url);
        if let Some(ref api_key) = config.api_key {
            openai_config = openai_config.with_api_key(api_key);
        }

        Ok(Self {
            client: Client::with_config(openai_config),
            model: config.model.clone(),
            dimensions: config.dimension,
        })
    }

    async fn embed_once(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = CreateEmbeddingRequest {
            model: self.model.clone(),
            input: EmbeddingInput::StringArray(texts.to_vec()),
            encoding_format: None,
            dimensions: None,
            user: None,
        };

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| EmbeddingError::ApiError(e.to_string()))?;

        if response.data.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                requested: texts.len(),
                returned: response.data.len(),
            }
            .into());
        }

        // Responses are not guaranteed to arrive in input order
        let mut ordered = response.data;
        ordered.sort_by_key(|d| d.index);

        let mut embeddings = Vec::with_capacity(ordered.len());
        for data in ordered {
            if data.embedding.len() != self.dimensions {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: self.dimensions,
                    actual: data.embedding.len(),
                }
                .into());
            }
            embeddings.push(data.embedding);
        }

        Ok(embeddings)
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiApiProvider {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut attempt = 0;
        loop {
            match self.embed_once(&texts).await {
                Ok(embeddings) => {
                    debug!("Embedded {} text(s)", embeddings.len());
                    return Ok(embeddings);
                }
                Err(e) if attempt + 1 < RETRY_ATTEMPTS => {
                    attempt += 1;
                    let delay = Duration::from_millis(RETRY_BASE_DELAY_MS * (1 << attempt));
                    warn!(
                        "Embedding request failed (attempt {attempt}/{RETRY_ATTEMPTS}): {e}, \
                         retrying in {delay:?}"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn embedding_dimension(&self) -> usize {
        self.dimensions
    }
}

/// Create an API-backed embedding provider from configuration
pub fn create_api_provider(config: &EmbeddingsConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    Ok(Arc::new(OpenAiApiProvider::new(config)?))
}
