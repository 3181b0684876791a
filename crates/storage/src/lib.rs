//! Backend adapters for catalogchat
//!
//! Three query backends sit behind traits here: the hybrid
//! lexical/vector index (Qdrant), the relationship graph (Neo4j), and
//! the relational catalog (Postgres). The in-memory TTL session store
//! also lives in this crate. Engine internals are out of scope; only
//! the query contracts the retrieval pipeline needs are exposed.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

pub mod error;
mod factory;
pub mod mock;
mod neo4j;
mod postgres;
mod qdrant;
mod session;

pub use factory::{connect_catalog_db, connect_graph_store, connect_vector_index};
pub use session::InMemorySessionStore;

use async_trait::async_trait;
use catalogchat_core::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==== Models ====

/// One hit from the hybrid lexical/vector index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactHit {
    /// Raw artifact body (e.g. a stored procedure definition)
    pub content: String,
    pub score: f32,
    #[serde(default)]
    pub table_name: Option<String>,
    #[serde(default)]
    pub view_name: Option<String>,
    #[serde(default)]
    pub entity_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// One relationship edge between two catalog objects
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipEdge {
    pub from_object: String,
    pub to_object: String,
    pub from_field: String,
    pub to_field: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A searchable table or view discovered from the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRelation {
    pub name: String,
    /// "BASE TABLE" or "VIEW", as reported by the catalog
    pub kind: String,
}

/// Column metadata for a catalog relation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
}

// ==== Traits ====

/// Hybrid lexical/vector index over catalog artifacts
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Verify the index's vector dimension matches `dimension`,
    /// recreating the index if not. Recreation is destructive: existing
    /// points are lost on a dimension mismatch.
    async fn ensure_index(&self, dimension: usize) -> Result<()>;

    /// Filtered hybrid query: mandatory k-NN over `embedding` plus a
    /// disjunctive match of `term` against metadata fields, at least
    /// one of which must hit.
    async fn hybrid_search(
        &self,
        embedding: Vec<f32>,
        term: &str,
        limit: usize,
    ) -> Result<Vec<ArtifactHit>>;

    /// Pure k-NN query with no filter; the fallback when the filtered
    /// query returns nothing.
    async fn knn_search(&self, embedding: Vec<f32>, limit: usize) -> Result<Vec<ArtifactHit>>;
}

/// Graph of catalog entities and their relationship edges
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// All edges where either endpoint's name equals `name`, newest
    /// first. Malformed edge records are skipped, never fatal.
    async fn relationships_for_name(&self, name: &str) -> Result<Vec<RelationshipEdge>>;
}

/// Relational catalog database consumed by the SQL agent
#[async_trait]
pub trait CatalogDb: Send + Sync {
    /// Discover the whitelist of searchable tables/views
    async fn list_searchable_relations(&self) -> Result<Vec<CatalogRelation>>;

    /// Column metadata for one relation
    async fn describe_relation(&self, name: &str) -> Result<Vec<ColumnInfo>>;

    /// Execute a read-only SELECT and return its rows as a JSON array
    /// string. Statements are validated before execution.
    async fn execute_select(&self, sql: &str) -> Result<String>;
}
