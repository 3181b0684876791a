//! NL-to-SQL agent retriever over the relational catalog

use crate::parse::{parse_sql_response, truncate_for_error};
use crate::prompts;
use async_trait::async_trait;
use catalogchat_core::config::{AgentConfig, CacheConfig};
use catalogchat_core::error::{Error, Result};
use catalogchat_core::tokens::TokenLedger;
use catalogchat_core::traits::{LlmProvider, Retriever, SessionStore};
use catalogchat_core::types::{RetrievalResult, Source, TokenUsageRecord, AGENT_ANSWER_SCORE};
use catalogchat_storage::CatalogDb;
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// SQL-generation agent scoped to the runtime-discovered whitelist of
/// searchable catalog tables/views.
///
/// Unlike the vector and graph adapters, a failed run here propagates
/// as `Err`: the coordinator owns pipeline-level failure isolation for
/// this source.
pub struct RelationalAgentRetriever {
    catalog: Arc<dyn CatalogDb>,
    llm: Arc<dyn LlmProvider>,
    cache: Arc<dyn SessionStore>,
    ledger: Arc<TokenLedger>,
    agent: AgentConfig,
    cache_ttl_seconds: u64,
}

impl RelationalAgentRetriever {
    pub fn new(
        catalog: Arc<dyn CatalogDb>,
        llm: Arc<dyn LlmProvider>,
        cache: Arc<dyn SessionStore>,
        ledger: Arc<TokenLedger>,
        agent: AgentConfig,
        cache_config: &CacheConfig,
    ) -> Self {
        Self {
            catalog,
            llm,
            cache,
            ledger,
            agent,
            cache_ttl_seconds: cache_config.agent_ttl_seconds,
        }
    }

    /// One full agent run: discover the whitelist, then iterate SQL
    /// generation and execution until a statement succeeds or the
    /// iteration bound is hit. The final iteration's error is returned
    /// as-is.
    async fn run_agent(&self, question: &str) -> Result<String> {
        let relations = self.catalog.list_searchable_relations().await?;
        if relations.is_empty() {
            return Err(Error::agent("no searchable tables or views discovered"));
        }

        let mut schema = String::new();
        for relation in &relations {
            let columns = self.catalog.describe_relation(&relation.name).await?;
            let rendered_columns = columns
                .iter()
                .map(|c| format!("{} {}", c.name, c.data_type))
                .collect::<Vec<_>>()
                .join(", ");
            schema.push_str(&format!(
                "- {} ({}): {}\n",
                relation.name,
                relation.kind.to_lowercase(),
                rendered_columns
            ));
        }

        let whitelist: Vec<&str> = relations.iter().map(|r| r.name.as_str()).collect();
        let system = prompts::format_prompt(prompts::SQL_SYSTEM, &[("schema", &schema)]);
        let mut user = prompts::format_prompt(prompts::SQL_USER, &[("question", question)]);

        let mut last_error = Error::agent("agent made no iterations");
        for iteration in 1..=self.agent.max_iterations {
            debug!("Agent iteration {}/{}", iteration, self.agent.max_iterations);

            let started = Instant::now();
            let response = self.llm.generate_with_system(&system, &user).await?;
            if let Some(usage) = response.usage {
                self.ledger.record(TokenUsageRecord {
                    source: Source::Relational,
                    model: response.model.clone(),
                    input_tokens: usage.input_tokens,
                    output_tokens: usage.output_tokens,
                    execution_time_secs: Some(started.elapsed().as_secs_f64()),
                });
            }

            let sql = match parse_sql_response(&response.text) {
                Some(sql) => sql,
                None => {
                    warn!(
                        "Agent response carried no SQL: {}",
                        truncate_for_error(&response.text)
                    );
                    last_error = Error::agent("response did not contain a SQL statement");
                    user = prompts::format_prompt(
                        prompts::SQL_FIX,
                        &[
                            ("sql", "(none)"),
                            ("error", "response did not contain a SQL statement"),
                        ],
                    );
                    continue;
                }
            };

            if !references_whitelisted_relation(&sql, &whitelist) {
                warn!("Agent statement references no whitelisted relation: {sql}");
                last_error = Error::agent("statement references no searchable table or view");
                user = prompts::format_prompt(
                    prompts::SQL_FIX,
                    &[
                        ("sql", sql.as_str()),
                        ("error", "statement must use the listed tables/views only"),
                    ],
                );
                continue;
            }

            match self.catalog.execute_select(&sql).await {
                Ok(rows_json) => {
                    debug!("Agent statement succeeded on iteration {iteration}");
                    return Ok(render_answer(question, &rows_json));
                }
                Err(e) => {
                    warn!("Agent statement failed on iteration {iteration}: {e}");
                    let message = e.to_string();
                    last_error = e;
                    user = prompts::format_prompt(
                        prompts::SQL_FIX,
                        &[("sql", sql.as_str()), ("error", message.as_str())],
                    );
                }
            }
        }

        Err(last_error)
    }

    async fn cache_result(&self, session_id: &str, result: &RetrievalResult) {
        let key = Source::Relational.cache_key(session_id);
        match serde_json::to_value(vec![result]) {
            Ok(value) => {
                if let Err(e) = self.cache.set(&key, value, self.cache_ttl_seconds).await {
                    warn!("Failed to cache agent answer under '{key}': {e}");
                }
            }
            Err(e) => warn!("Failed to serialize agent answer for caching: {e}"),
        }
    }
}

/// The agent answers with the executed query's results, not the SQL
fn render_answer(question: &str, rows_json: &str) -> String {
    format!("Query results for \"{question}\":\n{rows_json}")
}

fn references_whitelisted_relation(sql: &str, whitelist: &[&str]) -> bool {
    let lowered = sql.to_lowercase();
    whitelist
        .iter()
        .any(|name| lowered.contains(&name.to_lowercase()))
}

#[async_trait]
impl Retriever for RelationalAgentRetriever {
    fn source(&self) -> Source {
        Source::Relational
    }

    async fn retrieve(
        &self,
        query: &str,
        session_id: Option<&str>,
    ) -> Result<Vec<RetrievalResult>> {
        let max_attempts = self.agent.max_retries;
        let mut last_error = Error::agent("agent made no attempts");

        for attempt in 1..=max_attempts {
            info!("SQL agent attempt {}/{}", attempt, max_attempts);

            let bounded = tokio::time::timeout(
                Duration::from_secs(self.agent.max_execution_secs),
                self.run_agent(query),
            );

            match bounded.await {
                Ok(Ok(answer)) => {
                    let result = RetrievalResult::new(answer, AGENT_ANSWER_SCORE, Source::Relational)
                        .with_description("sql agent answer")
                        .with_created_at(Utc::now());

                    if let Some(session_id) = session_id {
                        self.cache_result(session_id, &result).await;
                    }

                    return Ok(vec![result]);
                }
                Ok(Err(e)) => {
                    warn!("SQL agent attempt {attempt} failed: {e}");
                    last_error = e;
                }
                Err(_) => {
                    warn!(
                        "SQL agent attempt {attempt} exceeded {}s",
                        self.agent.max_execution_secs
                    );
                    last_error = Error::agent(format!(
                        "agent run exceeded {}s time bound",
                        self.agent.max_execution_secs
                    ));
                }
            }

            if attempt < max_attempts {
                // Non-blocking delay: unrelated retrieval work keeps running
                tokio::time::sleep(Duration::from_secs(self.agent.retry_delay_secs)).await;
            }
        }

        // Surface the last attempt's error unwrapped; the coordinator
        // converts it into a substitute document.
        Err(last_error)
    }
}
