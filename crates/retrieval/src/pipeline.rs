//! End-to-end pipeline: extract, fan out, gate, branch

use crate::coordinator::RetrievalCoordinator;
use crate::events::{EventSink, PipelineOutcome};
use crate::gate::ResultGate;
use crate::prompts;
use catalogchat_core::tokens::TokenLedger;
use catalogchat_core::traits::{LlmProvider, ReportGenerator};
use catalogchat_core::types::{
    AggregatedDocument, GateDecision, Source, TokenUsageRecord, Verdict,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Answer returned when everything else has failed; the worst-case
/// observable outcome of any run
const NO_INFORMATION_ANSWER: &str =
    "No relevant information about this question was found in the catalog.";

/// Everything one pipeline run produced
#[derive(Debug)]
pub struct PipelineRun {
    pub outcome: PipelineOutcome,
    pub decision: GateDecision,
    pub documents: Vec<AggregatedDocument>,
}

/// The full question-answering pipeline over the three retrieval
/// backends. No error in any stage terminates the run.
pub struct CatalogPipeline {
    coordinator: RetrievalCoordinator,
    gate: ResultGate,
    llm: Arc<dyn LlmProvider>,
    reports: Arc<dyn ReportGenerator>,
    ledger: Arc<TokenLedger>,
}

impl CatalogPipeline {
    pub fn new(
        coordinator: RetrievalCoordinator,
        gate: ResultGate,
        llm: Arc<dyn LlmProvider>,
        reports: Arc<dyn ReportGenerator>,
        ledger: Arc<TokenLedger>,
    ) -> Self {
        Self {
            coordinator,
            gate,
            llm,
            reports,
            ledger,
        }
    }

    /// Token usage accumulated across this pipeline's calls
    pub fn ledger(&self) -> &TokenLedger {
        &self.ledger
    }

    pub async fn run(&self, query: &str, session_id: &str, events: &EventSink) -> PipelineRun {
        info!("Pipeline run for session {session_id}");

        let documents = self.coordinator.run(query, session_id, events).await;
        let decision = self.gate.classify(&documents, query).await;
        events.progress("gate", format!("relevance verdict: {}", decision.verdict));

        let outcome = match decision.verdict {
            Verdict::Yes => self.generate_report(query, session_id, &documents, events).await,
            // Unknown currently takes the same branch as no; the
            // distinction is preserved in the decision itself
            Verdict::No | Verdict::Unknown => PipelineOutcome::Answer {
                text: self.synthesize_answer(query, &documents).await,
            },
        };

        events.outcome(outcome.clone());

        PipelineRun {
            outcome,
            decision,
            documents,
        }
    }

    /// Hand the per-source cache entries to the report generator; on
    /// failure, degrade to a synthesized answer rather than erroring
    async fn generate_report(
        &self,
        query: &str,
        session_id: &str,
        documents: &[AggregatedDocument],
        events: &EventSink,
    ) -> PipelineOutcome {
        let sources = Source::RETRIEVAL_SOURCES.to_vec();
        events.progress("report", "generating report from cached results");

        match self.reports.generate(session_id, &sources).await {
            Ok(artifact) => PipelineOutcome::Report {
                reference: artifact.reference,
                sources,
            },
            Err(e) => {
                error!("Report generation failed, answering directly instead: {e}");
                PipelineOutcome::Answer {
                    text: self.synthesize_answer(query, documents).await,
                }
            }
        }
    }

    async fn synthesize_answer(&self, query: &str, documents: &[AggregatedDocument]) -> String {
        let rendered = documents
            .iter()
            .map(AggregatedDocument::render)
            .collect::<Vec<_>>()
            .join("\n\n");

        let prompt = prompts::format_prompt(
            prompts::ANSWER,
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
                response.text
            }
            Err(e) => {
                warn!("Answer synthesis failed: {e}");
                NO_INFORMATION_ANSWER.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::ScriptedRetriever;
    use crate::intent::IntentExtractor;
    use crate::llm::MockLlmProvider;
    use async_trait::async_trait;
    use catalogchat_core::config::CacheConfig;
    use catalogchat_core::error::{Error, Result};
    use catalogchat_core::traits::{ReportArtifact, Retriever, SessionStore};
    use catalogchat_core::types::RetrievalResult;
    use catalogchat_storage::InMemorySessionStore;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct MockReportGenerator {
        fail: AtomicBool,
    }

    impl MockReportGenerator {
        fn new() -> Self {
            Self {
                fail: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl ReportGenerator for MockReportGenerator {
        async fn generate(&self, session_id: &str, _sources: &[Source]) -> Result<ReportArtifact> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(Error::report("renderer offline"));
            }
            Ok(ReportArtifact {
                reference: format!("reports/{session_id}.xlsx"),
            })
        }
    }

    /// llm replies, in call order: intent, gate, then answer if reached
    fn pipeline(replies: &[&str], report_fail: bool) -> CatalogPipeline {
        let llm = Arc::new(MockLlmProvider::new());
        for reply in replies {
            llm.push_reply(*reply);
        }

        let ledger = Arc::new(TokenLedger::new());
        let intent = IntentExtractor::new(llm.clone(), ledger.clone());
        let retriever = Arc::new(ScriptedRetriever::new(
            Source::Vector,
            vec![Ok(vec![RetrievalResult::new(
                "employees artifact",
                1.0,
                Source::Vector,
            )])],
        )) as Arc<dyn Retriever>;
        let cache = Arc::new(InMemorySessionStore::new()) as Arc<dyn SessionStore>;
        let coordinator = RetrievalCoordinator::new(
            intent,
            vec![retriever],
            cache,
            &CacheConfig::default(),
        );
        let gate = ResultGate::new(llm.clone(), ledger.clone());

        let reports = MockReportGenerator::new();
        reports.fail.store(report_fail, Ordering::SeqCst);

        CatalogPipeline::new(coordinator, gate, llm, Arc::new(reports), ledger)
    }

    #[tokio::test]
    async fn test_yes_verdict_triggers_report() {
        let pipeline = pipeline(&[r#"{"item1": "employees"}"#, "yes"], false);
        let run = pipeline
            .run("show employees report", "s-1", &EventSink::disabled())
            .await;

        assert_eq!(run.decision.verdict, Verdict::Yes);
        match run.outcome {
            PipelineOutcome::Report { reference, sources } => {
                assert_eq!(reference, "reports/s-1.xlsx");
                assert_eq!(sources.len(), 3);
            }
            other => panic!("expected report outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_no_verdict_synthesizes_answer() {
        let pipeline = pipeline(
            &[
                r#"{"item1": "employees"}"#,
                "no",
                "The employees table holds staff records.",
            ],
            false,
        );
        let run = pipeline
            .run("what is employees?", "s-1", &EventSink::disabled())
            .await;

        assert_eq!(run.decision.verdict, Verdict::No);
        match run.outcome {
            PipelineOutcome::Answer { text } => {
                assert!(text.contains("staff records"));
            }
            other => panic!("expected answer outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_verdict_takes_answer_branch() {
        let pipeline = pipeline(
            &[r#"{"item1": "employees"}"#, "maybe", "Best-effort answer."],
            false,
        );
        let run = pipeline.run("unclear", "s-1", &EventSink::disabled()).await;

        assert_eq!(run.decision.verdict, Verdict::Unknown);
        assert!(matches!(run.outcome, PipelineOutcome::Answer { .. }));
    }

    #[tokio::test]
    async fn test_report_failure_degrades_to_answer() {
        let pipeline = pipeline(
            &[r#"{"item1": "employees"}"#, "yes", "Fallback answer."],
            true,
        );
        let run = pipeline.run("report", "s-1", &EventSink::disabled()).await;

        assert_eq!(run.decision.verdict, Verdict::Yes);
        match run.outcome {
            PipelineOutcome::Answer { text } => assert!(text.contains("Fallback")),
            other => panic!("expected answer outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_total_llm_failure_still_answers() {
        // Intent, gate, and synthesis all fail; the run still resolves
        let llm = Arc::new(MockLlmProvider::new());
        let ledger = Arc::new(TokenLedger::new());
        let intent = IntentExtractor::new(llm.clone(), ledger.clone());
        let retriever = Arc::new(ScriptedRetriever::new(Source::Vector, vec![Ok(vec![])]))
            as Arc<dyn Retriever>;
        let cache = Arc::new(InMemorySessionStore::new()) as Arc<dyn SessionStore>;
        let coordinator =
            RetrievalCoordinator::new(intent, vec![retriever], cache, &CacheConfig::default());
        let gate = ResultGate::new(llm.clone(), ledger.clone());
        let pipeline = CatalogPipeline::new(
            coordinator,
            gate,
            llm,
            Arc::new(MockReportGenerator::new()),
            ledger,
        );

        let run = pipeline.run("query", "s-1", &EventSink::disabled()).await;
        assert_eq!(run.decision.verdict, Verdict::Unknown);
        match run.outcome {
            PipelineOutcome::Answer { text } => {
                assert_eq!(text, NO_INFORMATION_ANSWER);
            }
            other => panic!("expected answer outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_outcome_event_emitted_last() {
        use crate::events::PipelineEvent;

        let pipeline = pipeline(
            &[r#"{"item1": "employees"}"#, "no", "Answer text."],
            false,
        );
        let (sink, mut rx) = EventSink::channel();
        pipeline.run("query", "s-1", &sink).await;

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert!(events.len() >= 3);
        assert!(matches!(events.last(), Some(PipelineEvent::Outcome(_))));
        // Everything before the outcome is progress
        for event in &events[..events.len() - 1] {
            assert!(matches!(event, PipelineEvent::Progress { .. }));
        }
    }
}
