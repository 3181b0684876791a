//! End-to-end pipeline scenario over mock backends
//!
//! A salary-modification question against a graph holding two edges
//! between employees and employees_history, with the vector index and
//! the relational agent's catalog stubbed to fail. The graph source
//! must contribute a leading summary plus one sentence per edge while
//! the failing sources stay isolated to one document each.

use catalogchat_core::config::{AgentConfig, CacheConfig, VectorIndexConfig};
use catalogchat_core::tokens::TokenLedger;
use catalogchat_core::traits::{Retriever, SessionStore};
use catalogchat_core::types::Source;
use catalogchat_embeddings::MockEmbeddingProvider;
use catalogchat_retrieval::{
    EventSink, GraphRetriever, IntentExtractor, MockLlmProvider, RelationalAgentRetriever,
    ResultGate, RetrievalCoordinator, VectorSearchRetriever,
};
use catalogchat_storage::mock::{MockCatalogDb, MockGraphStore, MockVectorIndex};
use catalogchat_storage::{InMemorySessionStore, RelationshipEdge};
use std::sync::Arc;

fn edge(from: &str, to: &str, from_field: &str, to_field: &str) -> RelationshipEdge {
    RelationshipEdge {
        from_object: from.to_string(),
        to_object: to.to_string(),
        from_field: from_field.to_string(),
        to_field: to_field.to_string(),
        created_at: None,
    }
}

#[tokio::test]
async fn test_salary_modification_scenario() {
    let llm = Arc::new(MockLlmProvider::new());
    // Intent extraction names the table, then the gate says no
    llm.push_reply(r#"{"item1": "employees"}"#);
    llm.push_reply("no");

    let ledger = Arc::new(TokenLedger::new());
    let cache = Arc::new(InMemorySessionStore::new());

    // Vector backend down
    let vector_index = MockVectorIndex::new();
    vector_index.set_failing(true);
    let vector = Arc::new(VectorSearchRetriever::new(
        Arc::new(vector_index),
        Arc::new(MockEmbeddingProvider::new(8)),
        llm.clone(),
        ledger.clone(),
        VectorIndexConfig::default(),
    )) as Arc<dyn Retriever>;

    // Graph holds the two employees/employees_history edges
    let graph_store = MockGraphStore::new().with_edges(vec![
        edge("employees", "employees_history", "employee_id", "employee_id"),
        edge("employees", "employees_history", "salary", "old_salary"),
    ]);
    let graph = Arc::new(GraphRetriever::new(Arc::new(graph_store))) as Arc<dyn Retriever>;

    // Relational catalog discovers no searchable relations, so every
    // agent attempt fails without touching the LLM script
    let catalog = MockCatalogDb::new().with_relations(vec![]);
    let relational = Arc::new(RelationalAgentRetriever::new(
        Arc::new(catalog),
        llm.clone(),
        cache.clone() as Arc<dyn SessionStore>,
        ledger.clone(),
        AgentConfig {
            max_retries: 1,
            retry_delay_secs: 0,
            max_iterations: 2,
            max_execution_secs: 10,
        },
        &CacheConfig::default(),
    )) as Arc<dyn Retriever>;

    let intent = IntentExtractor::new(llm.clone(), ledger.clone());
    let coordinator = RetrievalCoordinator::new(
        intent,
        vec![vector, graph, relational],
        cache.clone() as Arc<dyn SessionStore>,
        &CacheConfig::default(),
    );

    let documents = coordinator
        .run(
            "I want to modify the salary field of the employees table",
            "session-e2e",
            &EventSink::disabled(),
        )
        .await;

    // One vector error document, three graph documents, one relational
    // substitute: five in total, numbered 1..=5
    assert_eq!(documents.len(), 5);
    for (i, doc) in documents.iter().enumerate() {
        assert_eq!(doc.index, i + 1);
    }

    let vector_docs: Vec<_> = documents
        .iter()
        .filter(|d| d.result.source == Source::Vector)
        .collect();
    assert_eq!(vector_docs.len(), 1);
    assert!(vector_docs[0].result.is_backend_error());

    let graph_docs: Vec<_> = documents
        .iter()
        .filter(|d| d.result.source == Source::Graph)
        .collect();
    assert_eq!(graph_docs.len(), 3);
    assert!(graph_docs[0].result.content.contains("2 relationship(s)"));
    assert!(graph_docs[1]
        .result
        .content
        .contains("table employees is linked to table employees_history via field employee_id"));
    assert!(graph_docs[2]
        .result
        .content
        .contains("via field salary -> field old_salary"));

    let relational_docs: Vec<_> = documents
        .iter()
        .filter(|d| d.result.source == Source::Relational)
        .collect();
    assert_eq!(relational_docs.len(), 1);
    assert!(relational_docs[0].result.is_backend_error());

    // Each source's cache sub-key holds its full result list
    let graph_cached = cache.get("session-e2e:graph").await.unwrap().unwrap();
    assert_eq!(graph_cached.as_array().unwrap().len(), 3);
    let vector_cached = cache.get("session-e2e:vector").await.unwrap().unwrap();
    assert_eq!(vector_cached.as_array().unwrap().len(), 1);

    // The gate still classifies over the aggregate without raising
    let gate = ResultGate::new(llm.clone(), ledger.clone());
    let decision = gate
        .classify(
            &documents,
            "I want to modify the salary field of the employees table",
        )
        .await;
    assert_eq!(decision.verdict, catalogchat_core::types::Verdict::No);
}

#[tokio::test]
async fn test_rerun_overwrites_per_source_cache_keys() {
    let llm = Arc::new(MockLlmProvider::new());
    llm.push_reply(r#"{"item1": "employees"}"#);
    llm.push_reply(r#"{"item1": "employees"}"#);

    let ledger = Arc::new(TokenLedger::new());
    let cache = Arc::new(InMemorySessionStore::new());

    let graph_store = MockGraphStore::new().with_edges(vec![edge(
        "employees",
        "employees_history",
        "employee_id",
        "employee_id",
    )]);
    let graph = Arc::new(GraphRetriever::new(Arc::new(graph_store))) as Arc<dyn Retriever>;

    let intent = IntentExtractor::new(llm.clone(), ledger.clone());
    let coordinator = RetrievalCoordinator::new(
        intent,
        vec![graph],
        cache.clone() as Arc<dyn SessionStore>,
        &CacheConfig::default(),
    );

    coordinator
        .run("employees?", "session-idem", &EventSink::disabled())
        .await;
    coordinator
        .run("employees?", "session-idem", &EventSink::disabled())
        .await;

    // Exactly one entry for the graph sub-key, replaced not appended
    let cached = cache.get("session-idem:graph").await.unwrap().unwrap();
    assert_eq!(cached.as_array().unwrap().len(), 2);

    // Logout cleanup drops the sub-keys
    let removed = cache.delete_session("session-idem").await.unwrap();
    assert_eq!(removed, 1);
    assert!(cache.get("session-idem:graph").await.unwrap().is_none());
}
