//! Mock backend implementations for tests
//!
//! Each mock can be preloaded with fixture data and flipped into a
//! failing mode so retriever isolation paths can be exercised without
//! live engines.

use crate::{ArtifactHit, CatalogDb, CatalogRelation, ColumnInfo, GraphStore, RelationshipEdge,
    VectorIndex};
use async_trait::async_trait;
use catalogchat_core::error::{Error, Result};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Mock hybrid index with separate result sets for the filtered and
/// pure k-NN paths
#[derive(Default)]
pub struct MockVectorIndex {
    pub hybrid_hits: Mutex<Vec<ArtifactHit>>,
    pub knn_hits: Mutex<Vec<ArtifactHit>>,
    fail: AtomicBool,
    hybrid_calls: AtomicUsize,
    knn_calls: AtomicUsize,
}

impl MockVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hybrid_hits(self, hits: Vec<ArtifactHit>) -> Self {
        *self.hybrid_hits.lock().unwrap_or_else(|e| e.into_inner()) = hits;
        self
    }

    pub fn with_knn_hits(self, hits: Vec<ArtifactHit>) -> Self {
        *self.knn_hits.lock().unwrap_or_else(|e| e.into_inner()) = hits;
        self
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn hybrid_calls(&self) -> usize {
        self.hybrid_calls.load(Ordering::SeqCst)
    }

    pub fn knn_calls(&self) -> usize {
        self.knn_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorIndex for MockVectorIndex {
    async fn ensure_index(&self, _dimension: usize) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::storage("mock index unavailable"));
        }
        Ok(())
    }

    async fn hybrid_search(
        &self,
        _embedding: Vec<f32>,
        _term: &str,
        _limit: usize,
    ) -> Result<Vec<ArtifactHit>> {
        self.hybrid_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::storage("mock index unavailable"));
        }
        Ok(self
            .hybrid_hits
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }

    async fn knn_search(&self, _embedding: Vec<f32>, _limit: usize) -> Result<Vec<ArtifactHit>> {
        self.knn_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::storage("mock index unavailable"));
        }
        Ok(self
            .knn_hits
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }
}

/// Mock graph store returning preset edges
#[derive(Default)]
pub struct MockGraphStore {
    pub edges: Mutex<Vec<RelationshipEdge>>,
    fail: AtomicBool,
}

impl MockGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_edges(self, edges: Vec<RelationshipEdge>) -> Self {
        *self.edges.lock().unwrap_or_else(|e| e.into_inner()) = edges;
        self
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl GraphStore for MockGraphStore {
    async fn relationships_for_name(&self, name: &str) -> Result<Vec<RelationshipEdge>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::storage("mock graph unavailable"));
        }
        Ok(self
            .edges
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|e| e.from_object == name || e.to_object == name)
            .cloned()
            .collect())
    }
}

/// Mock relational catalog with a fixed whitelist and canned query output
pub struct MockCatalogDb {
    pub relations: Vec<CatalogRelation>,
    pub columns: Vec<ColumnInfo>,
    pub query_result: Mutex<Result<String>>,
    executed: Mutex<Vec<String>>,
}

impl Default for MockCatalogDb {
    fn default() -> Self {
        Self {
            relations: vec![
                CatalogRelation {
                    name: "catalog_objects".to_string(),
                    kind: "BASE TABLE".to_string(),
                },
                CatalogRelation {
                    name: "catalog_fields".to_string(),
                    kind: "BASE TABLE".to_string(),
                },
            ],
            columns: vec![
                ColumnInfo {
                    name: "name".to_string(),
                    data_type: "text".to_string(),
                },
                ColumnInfo {
                    name: "description".to_string(),
                    data_type: "text".to_string(),
                },
            ],
            query_result: Mutex::new(Ok("[]".to_string())),
            executed: Mutex::new(Vec::new()),
        }
    }
}

impl MockCatalogDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_relations(mut self, relations: Vec<CatalogRelation>) -> Self {
        self.relations = relations;
        self
    }

    pub fn set_query_result(&self, result: Result<String>) {
        *self.query_result.lock().unwrap_or_else(|e| e.into_inner()) = result;
    }

    /// Statements passed to execute_select, in call order
    pub fn executed_statements(&self) -> Vec<String> {
        self.executed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl CatalogDb for MockCatalogDb {
    async fn list_searchable_relations(&self) -> Result<Vec<CatalogRelation>> {
        Ok(self.relations.clone())
    }

    async fn describe_relation(&self, _name: &str) -> Result<Vec<ColumnInfo>> {
        Ok(self.columns.clone())
    }

    async fn execute_select(&self, sql: &str) -> Result<String> {
        self.executed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(sql.to_string());
        match &*self.query_result.lock().unwrap_or_else(|e| e.into_inner()) {
            Ok(json) => Ok(json.clone()),
            Err(e) => Err(Error::storage(e.to_string())),
        }
    }
}
