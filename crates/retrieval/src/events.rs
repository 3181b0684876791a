//! Progress and outcome events
//!
//! The pipeline reports an interleaved sequence of progress updates
//! and one final outcome. These are distinct variants of one sum type
//! on one channel, so consumers match on the kind instead of sniffing
//! payload shapes.

use catalogchat_core::types::Source;
use serde::Serialize;
use tokio::sync::mpsc;

/// Final result of one pipeline run
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineOutcome {
    /// Synthesized answer over the aggregated documents
    Answer { text: String },
    /// Report generation was triggered; the artifact reference and the
    /// cached sources handed to the generator
    Report {
        reference: String,
        sources: Vec<Source>,
    },
}

/// One message on the pipeline event channel
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    Progress { step: String, message: String },
    Outcome(PipelineOutcome),
}

/// Cloneable sender half of the event channel
///
/// Sends never block and silently drop when no receiver is attached,
/// so event emission can never fail a request.
#[derive(Clone)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<PipelineEvent>>,
}

impl EventSink {
    /// A sink wired to a channel, plus the receiving half
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PipelineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that discards everything
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn progress(&self, step: &str, message: impl Into<String>) {
        self.send(PipelineEvent::Progress {
            step: step.to_string(),
            message: message.into(),
        });
    }

    pub fn outcome(&self, outcome: PipelineOutcome) {
        self.send(PipelineEvent::Outcome(outcome));
    }

    fn send(&self, event: PipelineEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
