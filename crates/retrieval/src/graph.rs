//! Relationship retriever over the catalog graph

use async_trait::async_trait;
use catalogchat_core::error::Result;
use catalogchat_core::traits::Retriever;
use catalogchat_core::types::{RetrievalResult, Source};
use catalogchat_storage::{GraphStore, RelationshipEdge};
use std::sync::Arc;
use tracing::warn;

/// Score attached to relationship sentences and their summary
const EDGE_SCORE: f32 = 1.0;

/// Retrieves relationship edges touching one catalog object name and
/// renders each as a natural-language sentence. Failures degrade to a
/// single error-tagged document; this adapter never returns `Err`.
pub struct GraphRetriever {
    graph: Arc<dyn GraphStore>,
}

impl GraphRetriever {
    pub fn new(graph: Arc<dyn GraphStore>) -> Self {
        Self { graph }
    }

    async fn search_term(&self, term: &str) -> Result<Vec<RetrievalResult>> {
        let edges = self.graph.relationships_for_name(term).await?;

        if edges.is_empty() {
            return Ok(vec![RetrievalResult::placeholder(
                Source::Graph,
                format!("No relationships found for '{term}'"),
                0.0,
            )]);
        }

        let mut results = Vec::with_capacity(edges.len() + 1);
        results.push(RetrievalResult::new(
            format!(
                "Found {} relationship(s) involving '{term}' in the catalog graph",
                edges.len()
            ),
            EDGE_SCORE,
            Source::Graph,
        ));

        for edge in &edges {
            let mut result =
                RetrievalResult::new(render_edge(edge), EDGE_SCORE, Source::Graph);
            if let Some(created_at) = edge.created_at {
                result = result.with_created_at(created_at);
            }
            results.push(result);
        }

        Ok(results)
    }
}

fn render_edge(edge: &RelationshipEdge) -> String {
    format!(
        "table {} is linked to table {} via field {} -> field {}",
        edge.from_object, edge.to_object, edge.from_field, edge.to_field
    )
}

#[async_trait]
impl Retriever for GraphRetriever {
    fn source(&self) -> Source {
        Source::Graph
    }

    async fn retrieve(
        &self,
        query: &str,
        _session_id: Option<&str>,
    ) -> Result<Vec<RetrievalResult>> {
        match self.search_term(query).await {
            Ok(results) => Ok(results),
            Err(e) => {
                warn!("Graph retrieval failed for '{query}': {e}");
                Ok(vec![RetrievalResult::backend_error(Source::Graph, e)])
            }
        }
    }
}
