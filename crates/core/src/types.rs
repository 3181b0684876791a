//! Shared data model for the retrieval pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Score attached to substitute documents produced for a failed source
pub const ERROR_SCORE: f32 = 0.0;

/// Score attached to "nothing found" placeholder documents
pub const PLACEHOLDER_SCORE: f32 = 0.1;

/// Score attached to a successful SQL agent answer
pub const AGENT_ANSWER_SCORE: f32 = 10.0;

/// Which backend produced a retrieval result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Hybrid lexical/vector search index
    Vector,
    /// Graph store of table/column relationships
    Graph,
    /// NL-to-SQL agent over the relational catalog
    Relational,
    /// Synthesized by the pipeline itself
    System,
}

impl Source {
    /// The three retrieval backends, in registration order
    pub const RETRIEVAL_SOURCES: [Source; 3] = [Source::Vector, Source::Graph, Source::Relational];

    /// Stable name used in cache sub-keys and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Vector => "vector",
            Source::Graph => "graph",
            Source::Relational => "relational",
            Source::System => "system",
        }
    }

    /// Cache sub-key for a session's most recent results from this source
    pub fn cache_key(&self, session_id: &str) -> String {
        format!("{session_id}:{}", self.as_str())
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One document returned by a retrieval backend
///
/// `content` is always human-readable text, never a raw backend record.
/// `score` is an unbounded relevance heuristic and is not normalized
/// across sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub content: String,
    pub score: f32,
    pub source: Source,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsageRecord>,
}

impl RetrievalResult {
    pub fn new(content: impl Into<String>, score: f32, source: Source) -> Self {
        Self {
            content: content.into(),
            score,
            source,
            description: None,
            created_at: None,
            token_usage: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn with_token_usage(mut self, usage: TokenUsageRecord) -> Self {
        self.token_usage = Some(usage);
        self
    }

    /// Substitute document for a source whose call failed
    pub fn backend_error(source: Source, message: impl fmt::Display) -> Self {
        Self::new(format!("{source} retrieval failed: {message}"), ERROR_SCORE, source)
            .with_description("backend error")
    }

    /// Placeholder document for a source that found nothing
    pub fn placeholder(source: Source, content: impl Into<String>, score: f32) -> Self {
        Self::new(content, score, source).with_description("placeholder")
    }

    /// True for substitute error documents
    pub fn is_backend_error(&self) -> bool {
        self.description.as_deref() == Some("backend error")
    }
}

/// A retrieval result with its stable 1-based document number,
/// assigned at aggregation time in completion order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedDocument {
    /// 1-based index ("Doc#n")
    pub index: usize,
    #[serde(flatten)]
    pub result: RetrievalResult,
}

impl AggregatedDocument {
    /// Render as a numbered block for LLM prompts
    pub fn render(&self) -> String {
        format!("Doc#{}: {}", self.index, self.result.content)
    }
}

/// Candidate search terms extracted from a free-form query, keyed by
/// arbitrary labels chosen by the extractor. May be empty.
pub type IntentMap = HashMap<String, String>;

/// Tri-state relevance verdict from the result gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Yes,
    No,
    Unknown,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Yes => "yes",
            Verdict::No => "no",
            Verdict::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Gate classification plus the raw LLM rationale text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateDecision {
    pub verdict: Verdict,
    pub rationale: String,
}

impl GateDecision {
    pub fn new(verdict: Verdict, rationale: impl Into<String>) -> Self {
        Self {
            verdict,
            rationale: rationale.into(),
        }
    }
}

/// Append-only ledger entry for one LLM call; never mutated after creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsageRecord {
    pub source: Source,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time_secs: Option<f64>,
}
