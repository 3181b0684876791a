use crate::neo4j::Neo4jGraphStore;
use crate::postgres::PostgresCatalogDb;
use crate::qdrant::QdrantVectorIndex;
use crate::{CatalogDb, GraphStore, VectorIndex};
use catalogchat_core::config::{CatalogConfig, GraphConfig, VectorIndexConfig};
use catalogchat_core::error::Result;
use std::sync::Arc;

/// Connect to the hybrid lexical/vector index.
///
/// Returns a trait object so callers stay independent of the concrete
/// engine; mocks from [`crate::mock`] satisfy the same trait.
pub async fn connect_vector_index(config: &VectorIndexConfig) -> Result<Arc<dyn VectorIndex>> {
    Ok(Arc::new(QdrantVectorIndex::new(config).await?) as Arc<dyn VectorIndex>)
}

/// Connect to the relationship graph store
pub async fn connect_graph_store(config: &GraphConfig) -> Result<Arc<dyn GraphStore>> {
    Ok(Arc::new(Neo4jGraphStore::new(config).await?) as Arc<dyn GraphStore>)
}

/// Connect to the relational catalog database
pub async fn connect_catalog_db(config: &CatalogConfig) -> Result<Arc<dyn CatalogDb>> {
    Ok(Arc::new(PostgresCatalogDb::new(config).await?) as Arc<dyn CatalogDb>)
}
