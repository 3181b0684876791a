use super::search;
use crate::error::StorageError;
use crate::{ArtifactHit, VectorIndex};
use async_trait::async_trait;
use catalogchat_core::config::VectorIndexConfig;
use catalogchat_core::error::Result;
use qdrant_client::{
    qdrant::{CreateCollectionBuilder, Distance, VectorParams, VectorParamsBuilder, VectorsConfig},
    Qdrant,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Qdrant client for the catalog artifact index
pub(crate) struct QdrantVectorIndex {
    pub(super) client: Arc<Qdrant>,
    pub(super) collection_name: String,
}

impl QdrantVectorIndex {
    /// Connect to the Qdrant server with the provided configuration
    pub async fn new(config: &VectorIndexConfig) -> Result<Self> {
        let url = format!("http://{}:{}", config.host, config.port);

        info!("Connecting to Qdrant at {}", url);

        let client = Qdrant::from_url(&url)
            .build()
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            client: Arc::new(client),
            collection_name: config.collection_name.clone(),
        })
    }

    async fn collection_dimension(&self) -> Result<Option<usize>> {
        let info = self
            .client
            .collection_info(&self.collection_name)
            .await
            .map_err(|e| StorageError::BackendError(format!("Failed to get collection info: {e}")))?;

        let dims = info
            .result
            .and_then(|r| r.config)
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|v| match v.config {
                Some(qdrant_client::qdrant::vectors_config::Config::Params(p)) => {
                    Some(p.size as usize)
                }
                _ => None,
            });

        Ok(dims)
    }

    async fn collection_exists(&self) -> Result<bool> {
        let collections = self
            .client
            .list_collections()
            .await
            .map_err(|e| StorageError::BackendError(format!("Failed to list collections: {e}")))?;

        Ok(collections
            .collections
            .iter()
            .any(|c| c.name == self.collection_name))
    }

    async fn create_collection(&self, dimension: usize) -> Result<()> {
        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection_name).vectors_config(
                    VectorsConfig::from(VectorParams::from(VectorParamsBuilder::new(
                        dimension as u64,
                        Distance::Cosine,
                    ))),
                ),
            )
            .await
            .map_err(|e| StorageError::BackendError(format!("Failed to create collection: {e}")))?;

        Ok(())
    }
}

#[async_trait]
impl VectorIndex for QdrantVectorIndex {
    async fn ensure_index(&self, dimension: usize) -> Result<()> {
        if !self.collection_exists().await? {
            info!(
                "Creating collection '{}' with dimension {}",
                self.collection_name, dimension
            );
            return self.create_collection(dimension).await;
        }

        match self.collection_dimension().await? {
            Some(current) if current == dimension => Ok(()),
            current => {
                // Dimension drift means the embedding model changed;
                // the index must be rebuilt and its points are lost.
                warn!(
                    "Collection '{}' has dimension {:?}, expected {}; recreating (existing \
                     points will be dropped)",
                    self.collection_name, current, dimension
                );
                self.client
                    .delete_collection(&self.collection_name)
                    .await
                    .map_err(|e| {
                        StorageError::BackendError(format!("Failed to delete collection: {e}"))
                    })?;
                self.create_collection(dimension).await
            }
        }
    }

    async fn hybrid_search(
        &self,
        embedding: Vec<f32>,
        term: &str,
        limit: usize,
    ) -> Result<Vec<ArtifactHit>> {
        search::hybrid_search(self, embedding, term, limit).await
    }

    async fn knn_search(&self, embedding: Vec<f32>, limit: usize) -> Result<Vec<ArtifactHit>> {
        search::knn_search(self, embedding, limit).await
    }
}
