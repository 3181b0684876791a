use crate::error::StorageError;
use crate::ArtifactHit;
use catalogchat_core::error::Result;
use qdrant_client::qdrant::{
    r#match::MatchValue, Condition, FieldCondition, Filter, Match, MinShould, SearchPointsBuilder,
    Value as QdrantValue,
};

use super::client::QdrantVectorIndex;

/// Metadata fields the lexical side of the hybrid query matches against
const NAME_FIELDS: &[&str] = &["table_name", "view_name", "entity_name"];
const CONTENT_FIELD: &str = "content";

/// Convert a Qdrant payload to an ArtifactHit
fn payload_to_hit(
    payload: &std::collections::HashMap<String, QdrantValue>,
    score: f32,
) -> Option<ArtifactHit> {
    let get_string = |key: &str| -> Option<String> {
        payload.get(key).and_then(|v| match v.kind.as_ref()? {
            qdrant_client::qdrant::value::Kind::StringValue(s) => Some(s.clone()),
            _ => None,
        })
    };

    Some(ArtifactHit {
        content: get_string(CONTENT_FIELD)?,
        score,
        table_name: get_string("table_name"),
        view_name: get_string("view_name"),
        entity_name: get_string("entity_name"),
        description: get_string("description"),
    })
}

fn keyword_condition(key: &str, value: &str) -> Condition {
    Condition {
        condition_one_of: Some(qdrant_client::qdrant::condition::ConditionOneOf::Field(
            FieldCondition {
                key: key.to_string(),
                r#match: Some(Match {
                    match_value: Some(MatchValue::Keyword(value.to_string())),
                }),
                ..Default::default()
            },
        )),
    }
}

fn text_condition(key: &str, value: &str) -> Condition {
    Condition {
        condition_one_of: Some(qdrant_client::qdrant::condition::ConditionOneOf::Field(
            FieldCondition {
                key: key.to_string(),
                r#match: Some(Match {
                    match_value: Some(MatchValue::Text(value.to_string())),
                }),
                ..Default::default()
            },
        )),
    }
}

/// Filtered hybrid query: k-NN over the embedding plus a disjunction of
/// exact name matches and a full-text content match, with at least one
/// lexical condition required to hit.
pub(super) async fn hybrid_search(
    storage: &QdrantVectorIndex,
    embedding: Vec<f32>,
    term: &str,
    limit: usize,
) -> Result<Vec<ArtifactHit>> {
    let mut conditions: Vec<Condition> = NAME_FIELDS
        .iter()
        .map(|field| keyword_condition(field, term))
        .collect();
    conditions.push(text_condition(CONTENT_FIELD, term));

    let filter = Filter {
        min_should: Some(MinShould {
            conditions,
            min_count: 1,
        }),
        ..Default::default()
    };

    let search_result = storage
        .client
        .search_points(
            SearchPointsBuilder::new(&storage.collection_name, embedding, limit as u64)
                .filter(filter)
                .with_payload(true),
        )
        .await
        .map_err(|e| StorageError::BackendError(format!("Hybrid search failed: {e}")))?;

    let hits = search_result
        .result
        .iter()
        .filter(|p| !p.payload.is_empty())
        .filter_map(|p| payload_to_hit(&p.payload, p.score))
        .collect();

    Ok(hits)
}

/// Pure k-NN query, no lexical filter
pub(super) async fn knn_search(
    storage: &QdrantVectorIndex,
    embedding: Vec<f32>,
    limit: usize,
) -> Result<Vec<ArtifactHit>> {
    let search_result = storage
        .client
        .search_points(
            SearchPointsBuilder::new(&storage.collection_name, embedding, limit as u64)
                .with_payload(true),
        )
        .await
        .map_err(|e| StorageError::BackendError(format!("k-NN search failed: {e}")))?;

    let hits = search_result
        .result
        .iter()
        .filter(|p| !p.payload.is_empty())
        .filter_map(|p| payload_to_hit(&p.payload, p.score))
        .collect();

    Ok(hits)
}
