//! Fan-out, aggregation, and per-source caching

use crate::events::EventSink;
use crate::intent::IntentExtractor;
use catalogchat_core::config::CacheConfig;
use catalogchat_core::traits::{Retriever, SessionStore};
use catalogchat_core::types::{AggregatedDocument, RetrievalResult, Source};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Coordinates the three retrievers for one query.
///
/// Sources run in registration order and, within a source, terms run
/// in sorted-key order, so aggregation order is reproducible. An
/// exception from any retriever call is caught here and replaced with
/// exactly one substitute error document for that source; remaining
/// terms for the failed source are skipped.
pub struct RetrievalCoordinator {
    intent: IntentExtractor,
    retrievers: Vec<Arc<dyn Retriever>>,
    cache: Arc<dyn SessionStore>,
    cache_ttl_seconds: u64,
}

impl RetrievalCoordinator {
    pub fn new(
        intent: IntentExtractor,
        retrievers: Vec<Arc<dyn Retriever>>,
        cache: Arc<dyn SessionStore>,
        cache_config: &CacheConfig,
    ) -> Self {
        Self {
            intent,
            retrievers,
            cache,
            cache_ttl_seconds: cache_config.ttl_seconds,
        }
    }

    pub async fn run(
        &self,
        query: &str,
        session_id: &str,
        events: &EventSink,
    ) -> Vec<AggregatedDocument> {
        let intent_map = self.intent.extract(query, events).await;

        // Deterministic term order: sorted by extraction key, deduplicated
        let mut terms: Vec<String> = Vec::new();
        {
            let mut pairs: Vec<_> = intent_map.into_iter().collect();
            pairs.sort();
            for (_, term) in pairs {
                if !terms.contains(&term) {
                    terms.push(term);
                }
            }
        }
        if terms.is_empty() {
            terms.push(query.to_string());
        }

        info!(
            "Running {} retriever(s) over {} term(s)",
            self.retrievers.len(),
            terms.len()
        );

        let mut documents: Vec<RetrievalResult> = Vec::new();

        for retriever in &self.retrievers {
            let source = retriever.source();
            let mut source_results: Vec<RetrievalResult> = Vec::new();

            for term in &terms {
                match retriever.retrieve(term, Some(session_id)).await {
                    Ok(results) => source_results.extend(results),
                    Err(e) => {
                        warn!("{source} retriever failed for '{term}': {e}");
                        source_results.push(RetrievalResult::backend_error(source, e));
                        // One substitute per throwing source
                        break;
                    }
                }
            }

            events.progress(
                source.as_str(),
                format!("{} result(s)", source_results.len()),
            );

            self.cache_source_results(session_id, source, &source_results)
                .await;
            documents.extend(source_results);
        }

        if documents.is_empty() {
            documents.push(RetrievalResult::placeholder(
                Source::System,
                "No information found in the catalog for this question",
                0.0,
            ));
        }

        // Stable 1-based numbering in aggregation order
        documents
            .into_iter()
            .enumerate()
            .map(|(i, result)| AggregatedDocument {
                index: i + 1,
                result,
            })
            .collect()
    }

    /// Overwrite the session's sub-key for one source with its full
    /// result list (replace, never append)
    async fn cache_source_results(
        &self,
        session_id: &str,
        source: Source,
        results: &[RetrievalResult],
    ) {
        let key = source.cache_key(session_id);
        match serde_json::to_value(results) {
            Ok(value) => {
                if let Err(e) = self.cache.set(&key, value, self.cache_ttl_seconds).await {
                    warn!("Cache write for '{key}' failed: {e}");
                } else {
                    debug!("Cached {} result(s) under '{key}'", results.len());
                }
            }
            Err(e) => warn!("Failed to serialize results for '{key}': {e}"),
        }
    }
}

#[cfg(test)]
use async_trait::async_trait;

/// A fixed-output retriever used to exercise coordinator behavior
#[cfg(test)]
pub(crate) struct ScriptedRetriever {
    source: Source,
    results: std::sync::Mutex<Vec<catalogchat_core::error::Result<Vec<RetrievalResult>>>>,
    pub calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl ScriptedRetriever {
    pub fn new(
        source: Source,
        results: Vec<catalogchat_core::error::Result<Vec<RetrievalResult>>>,
    ) -> Self {
        Self {
            source,
            results: std::sync::Mutex::new(results),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl Retriever for ScriptedRetriever {
    fn source(&self) -> Source {
        self.source
    }

    async fn retrieve(
        &self,
        _query: &str,
        _session_id: Option<&str>,
    ) -> catalogchat_core::error::Result<Vec<RetrievalResult>> {
        self.calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let mut results = self.results.lock().unwrap();
        if results.is_empty() {
            Ok(vec![])
        } else {
            results.remove(0)
        }
    }
}
