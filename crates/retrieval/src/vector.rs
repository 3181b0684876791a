//! Hybrid lexical/vector retriever over the catalog artifact index

use crate::parse::{parse_keep_list, truncate_for_error};
use crate::prompts;
use async_trait::async_trait;
use catalogchat_core::config::VectorIndexConfig;
use catalogchat_core::error::{Error, Result};
use catalogchat_core::tokens::TokenLedger;
use catalogchat_core::traits::{LlmProvider, Retriever};
use catalogchat_core::types::{RetrievalResult, Source, TokenUsageRecord, PLACEHOLDER_SCORE};
use catalogchat_embeddings::EmbeddingProvider;
use catalogchat_storage::{ArtifactHit, VectorIndex};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Retrieves catalog artifacts (stored procedures and the like) for
/// one extracted term.
///
/// Flow per term: embed, verify index dimension (recreating on
/// mismatch), filtered hybrid query, pure k-NN fallback on zero hits,
/// optional LLM relevance filter, placeholder when nothing remains.
/// Failures degrade to a single error-tagged document; this adapter
/// never returns `Err`.
pub struct VectorSearchRetriever {
    index: Arc<dyn VectorIndex>,
    embeddings: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LlmProvider>,
    ledger: Arc<TokenLedger>,
    config: VectorIndexConfig,
}

impl VectorSearchRetriever {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embeddings: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
        ledger: Arc<TokenLedger>,
        config: VectorIndexConfig,
    ) -> Self {
        Self {
            index,
            embeddings,
            llm,
            ledger,
            config,
        }
    }

    async fn search_term(&self, term: &str) -> Result<Vec<RetrievalResult>> {
        let mut vectors = self.embeddings.embed(vec![term.to_string()]).await?;
        let embedding = vectors
            .pop()
            .ok_or_else(|| Error::embedding("embedding provider returned no vector"))?;

        self.index
            .ensure_index(self.embeddings.embedding_dimension())
            .await?;

        let mut hits = self
            .index
            .hybrid_search(embedding.clone(), term, self.config.search_limit)
            .await?;

        if hits.is_empty() {
            debug!("Filtered hybrid query empty for '{term}', falling back to pure k-NN");
            hits = self
                .index
                .knn_search(embedding, self.config.search_limit)
                .await?;
        }

        let mut results: Vec<RetrievalResult> =
            hits.iter().map(|hit| hit_to_result(hit, term)).collect();

        if results.len() > self.config.relevance_filter_threshold {
            results = self.relevance_filter(term, results).await;
        }

        if results.is_empty() {
            results.push(RetrievalResult::placeholder(
                Source::Vector,
                format!("No catalog artifacts found for '{term}'"),
                PLACEHOLDER_SCORE,
            ));
        }

        Ok(results)
    }

    /// Ask the LLM to drop irrelevant or duplicate entries. Falls back
    /// to the original results whenever the response cannot be parsed.
    async fn relevance_filter(
        &self,
        term: &str,
        results: Vec<RetrievalResult>,
    ) -> Vec<RetrievalResult> {
        let documents = results
            .iter()
            .enumerate()
            .map(|(i, r)| format!("{}. {}", i + 1, r.content))
            .collect::<Vec<_>>()
            .join("\n\n");

        let prompt = prompts::format_prompt(
            prompts::RELEVANCE_FILTER,
            &[("term", term), ("documents", &documents)],
        );

        let started = Instant::now();
        let response = match self.llm.generate(&prompt).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Relevance filter call failed, keeping unfiltered results: {e}");
                return results;
            }
        };

        if let Some(usage) = response.usage {
            self.ledger.record(TokenUsageRecord {
                source: Source::Vector,
                model: response.model.clone(),
                input_tokens: usage.input_tokens,
                output_tokens: usage.output_tokens,
                execution_time_secs: Some(started.elapsed().as_secs_f64()),
            });
        }

        match parse_keep_list(&response.text) {
            Some(keep) => {
                debug!(
                    "Relevance filter kept {}/{} result(s) for '{term}'",
                    keep.len(),
                    results.len()
                );
                results
                    .into_iter()
                    .enumerate()
                    .filter(|(i, _)| keep.contains(&(i + 1)))
                    .map(|(_, r)| r)
                    .collect()
            }
            None => {
                warn!(
                    "Unparseable relevance filter response, keeping unfiltered results: {}",
                    truncate_for_error(&response.text)
                );
                results
            }
        }
    }
}

/// Annotate the raw artifact body with the matched term and any
/// associated table/view names
fn hit_to_result(hit: &ArtifactHit, term: &str) -> RetrievalResult {
    let mut header = format!("[matched term: {term}");
    if let Some(table) = hit.table_name.as_deref().filter(|t| !t.is_empty()) {
        header.push_str(&format!("; table: {table}"));
    }
    if let Some(view) = hit.view_name.as_deref().filter(|v| !v.is_empty()) {
        header.push_str(&format!("; view: {view}"));
    }
    header.push(']');

    let mut result = RetrievalResult::new(
        format!("{header}\n{}", hit.content),
        hit.score,
        Source::Vector,
    );
    if let Some(description) = &hit.description {
        result = result.with_description(description.clone());
    }
    result
}

#[async_trait]
impl Retriever for VectorSearchRetriever {
    fn source(&self) -> Source {
        Source::Vector
    }

    async fn retrieve(
        &self,
        query: &str,
        _session_id: Option<&str>,
    ) -> Result<Vec<RetrievalResult>> {
        match self.search_term(query).await {
            Ok(results) => Ok(results),
            Err(e) => {
                warn!("Vector retrieval failed for '{query}': {e}");
                Ok(vec![RetrievalResult::backend_error(Source::Vector, e)])
            }
        }
    }
}
