//! Relevance classification gating report generation

use crate::prompts;
use catalogchat_core::tokens::TokenLedger;
use catalogchat_core::traits::LlmProvider;
use catalogchat_core::types::{AggregatedDocument, GateDecision, Source, TokenUsageRecord, Verdict};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Classifies whether the aggregated documents use the same table/field
/// terminology as the question. Never raises: any failure resolves to
/// `Unknown` with the error text as rationale.
pub struct ResultGate {
    llm: Arc<dyn LlmProvider>,
    ledger: Arc<TokenLedger>,
}

impl ResultGate {
    pub fn new(llm: Arc<dyn LlmProvider>, ledger: Arc<TokenLedger>) -> Self {
        Self { llm, ledger }
    }

    pub async fn classify(&self, documents: &[AggregatedDocument], query: &str) -> GateDecision {
        let rendered = documents
            .iter()
            .map(AggregatedDocument::render)
            .collect::<Vec<_>>()
            .join("\n\n");

        let prompt = prompts::format_prompt(
            prompts::GATE,
            &[("query", query), ("documents", &rendered)],
        );

        let started = Instant::now();
        match self.llm.generate(&prompt).await {
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
                let verdict = parse_verdict(&response.text);
                debug!("Gate verdict: {verdict}");
                GateDecision::new(verdict, response.text)
            }
            Err(e) => {
                warn!("Gate call failed, resolving to unknown: {e}");
                GateDecision::new(Verdict::Unknown, e.to_string())
            }
        }
    }
}

/// Lowercase, strip quote characters, take the first line, then check
/// for "yes" before "no"
fn parse_verdict(response: &str) -> Verdict {
    let cleaned = response.to_lowercase().replace(['"', '\''], "");
    let first_line = cleaned.lines().next().unwrap_or("").trim();

    if first_line.contains("yes") {
        Verdict::Yes
    } else if first_line.contains("no") {
        Verdict::No
    } else {
        Verdict::Unknown
    }
}
