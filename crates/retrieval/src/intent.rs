//! Intent extraction: free-form query to candidate search terms

use crate::events::EventSink;
use crate::parse::{parse_intent_response, truncate_for_error};
use crate::prompts;
use catalogchat_core::tokens::TokenLedger;
use catalogchat_core::traits::LlmProvider;
use catalogchat_core::types::{IntentMap, Source, TokenUsageRecord};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Maps a multilingual free-form query to named table/column/view name
/// candidates with a single LLM call. Never fails: any LLM or parse
/// problem degrades to an empty map.
pub struct IntentExtractor {
    llm: Arc<dyn LlmProvider>,
    ledger: Arc<TokenLedger>,
}

impl IntentExtractor {
    pub fn new(llm: Arc<dyn LlmProvider>, ledger: Arc<TokenLedger>) -> Self {
        Self { llm, ledger }
    }

    pub async fn extract(&self, query: &str, events: &EventSink) -> IntentMap {
        let prompt = prompts::format_prompt(prompts::INTENT_EXTRACT, &[("query", query)]);

        let started = Instant::now();
        let map = match self.llm.generate(&prompt).await {
            Ok(response) => {
                if let Some(usage) = response.usage {
                    self.ledger.record(TokenUsageRecord {
                        source: Source::System,
                        model: response.model.clone(),
                        input_tokens: usage.input_tokens,
                        output_tokens: usage.output_tokens,
                        execution_time_secs: Some(started.elapsed().as_secs_f64()),
                    });
                }
                let map = parse_intent_response(&response.text);
                if map.is_empty() {
                    debug!(
                        "No terms extracted from response: {}",
                        truncate_for_error(&response.text)
                    );
                }
                map
            }
            Err(e) => {
                warn!("Intent extraction call failed, continuing with raw query: {e}");
                IntentMap::new()
            }
        };

        events.progress(
            "intent",
            format!("extracted {} search term(s)", map.len()),
        );

        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::PipelineEvent;
    use crate::llm::MockLlmProvider;

    fn extractor(llm: MockLlmProvider) -> IntentExtractor {
        IntentExtractor::new(Arc::new(llm), Arc::new(TokenLedger::new()))
    }

    #[tokio::test]
    async fn test_extract_parses_terms() {
        let llm = MockLlmProvider::new();
        llm.push_reply(r#"{"item1": "employees", "item2": "salary"}"#);
        let map = extractor(llm)
            .extract("modify the salary field of employees", &EventSink::disabled())
            .await;
        assert_eq!(map.len(), 2);
        assert_eq!(map["item1"], "employees");
        assert_eq!(map["item2"], "salary");
    }

    #[tokio::test]
    async fn test_extract_degrades_on_llm_failure() {
        let llm = MockLlmProvider::new();
        llm.push_error("connection refused");
        let map = extractor(llm)
            .extract("anything", &EventSink::disabled())
            .await;
        assert!(map.is_empty());
    }

    #[tokio::test]
    async fn test_extract_degrades_on_garbage_output() {
        let llm = MockLlmProvider::new();
        llm.push_reply("I could not find any JSON worth returning.");
        let map = extractor(llm)
            .extract("anything", &EventSink::disabled())
            .await;
        assert!(map.is_empty());
    }

    #[tokio::test]
    async fn test_extract_emits_completion_event() {
        let llm = MockLlmProvider::new();
        llm.push_reply(r#"{"item1": "employees"}"#);
        let (sink, mut rx) = EventSink::channel();
        extractor(llm).extract("employees?", &sink).await;

        match rx.try_recv() {
            Ok(PipelineEvent::Progress { step, message }) => {
                assert_eq!(step, "intent");
                assert!(message.contains('1'));
            }
            other => panic!("expected progress event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_extract_records_token_usage() {
        let llm = MockLlmProvider::new();
        llm.push_reply("{}");
        let ledger = Arc::new(TokenLedger::new());
        let extractor = IntentExtractor::new(Arc::new(llm), Arc::clone(&ledger));
        extractor.extract("query", &EventSink::disabled()).await;

        let records = ledger.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].source, Source::System);
        assert!(records[0].execution_time_secs.is_some());
    }
}
