use crate::error::StorageError;
use crate::{GraphStore, RelationshipEdge};
use async_trait::async_trait;
use catalogchat_core::config::GraphConfig;
use catalogchat_core::error::Result;
use chrono::{DateTime, Utc};
use neo4rs::{Graph, Query};
use tracing::{debug, info, warn};

/// Edges between catalog objects, both directions, newest first.
/// Field values are coalesced so one malformed edge cannot fail the
/// whole query.
const RELATIONSHIPS_QUERY: &str = "MATCH (a:CatalogObject)-[r:LINKED_TO]->(b:CatalogObject) \
     WHERE a.name = $name OR b.name = $name \
     RETURN coalesce(a.name, '') AS from_object, \
            coalesce(b.name, '') AS to_object, \
            coalesce(r.from_field, '') AS from_field, \
            coalesce(r.to_field, '') AS to_field, \
            toString(r.created_at) AS created_at \
     ORDER BY r.created_at DESC";

/// Neo4j client for relationship lookups
pub(crate) struct Neo4jGraphStore {
    graph: Graph,
}

impl Neo4jGraphStore {
    /// Connect to the Neo4j server with the provided configuration
    pub async fn new(config: &GraphConfig) -> Result<Self> {
        let uri = format!("bolt://{}:{}", config.host, config.bolt_port);

        info!("Connecting to Neo4j at {}", uri);

        let graph = Graph::new(&uri, &config.user, &config.password)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        Ok(Self { graph })
    }
}

#[async_trait]
impl GraphStore for Neo4jGraphStore {
    async fn relationships_for_name(&self, name: &str) -> Result<Vec<RelationshipEdge>> {
        let query = Query::new(RELATIONSHIPS_QUERY.to_string()).param("name", name);

        let mut stream = self
            .graph
            .execute(query)
            .await
            .map_err(|e| StorageError::BackendError(format!("Relationship query failed: {e}")))?;

        let mut edges = Vec::new();
        loop {
            let row = match stream.next().await {
                Ok(Some(row)) => row,
                Ok(None) => break,
                Err(e) => {
                    return Err(
                        StorageError::BackendError(format!("Row fetch failed: {e}")).into()
                    );
                }
            };

            // Per-field defaults: a record missing endpoint names is
            // malformed and gets skipped, not propagated.
            let from_object: String = row.get("from_object").unwrap_or_default();
            let to_object: String = row.get("to_object").unwrap_or_default();
            if from_object.is_empty() || to_object.is_empty() {
                warn!("Skipping malformed relationship edge for '{}'", name);
                continue;
            }

            let from_field: String = row.get("from_field").unwrap_or_default();
            let to_field: String = row.get("to_field").unwrap_or_default();
            let created_at: Option<DateTime<Utc>> = row
                .get::<String>("created_at")
                .ok()
                .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                .map(|dt| dt.with_timezone(&Utc));

            edges.push(RelationshipEdge {
                from_object,
                to_object,
                from_field,
                to_field,
                created_at,
            });
        }

        debug!("Found {} relationship edge(s) for '{}'", edges.len(), name);
        Ok(edges)
    }
}
