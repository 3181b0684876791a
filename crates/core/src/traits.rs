//! Collaborator seams shared across crates
//!
//! Every external dependency of the pipeline sits behind one of these
//! traits so components are constructed once at process start and
//! injected; there is no implicit global lookup.

use crate::error::Result;
use crate::types::{RetrievalResult, Source};
use async_trait::async_trait;
use serde_json::Value;

/// Token counts reported by an LLM backend for a single call
#[derive(Debug, Clone, Copy, Default)]
pub struct LlmUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// One LLM completion
///
/// There is no structural guarantee on `text`; callers must parse
/// defensively.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub text: String,
    pub model: String,
    pub usage: Option<LlmUsage>,
}

/// Text-in, text-out LLM collaborator
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a completion for a single prompt
    async fn generate(&self, prompt: &str) -> Result<LlmResponse>;

    /// Generate with a system prompt and a user prompt
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<LlmResponse>;
}

/// One retrieval backend adapter
///
/// The vector and graph adapters degrade internally and never return
/// `Err`; the relational adapter may. The coordinator catches either
/// way and substitutes an error-tagged document, so no single backend
/// failure aborts a run.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Which backend this adapter fronts
    fn source(&self) -> Source;

    /// Retrieve documents for one term or query
    async fn retrieve(&self, query: &str, session_id: Option<&str>)
        -> Result<Vec<RetrievalResult>>;
}

/// TTL key-value store scoped by session
///
/// Keys are `{sessionID}` and `{sessionID}:{source}`; writes are
/// last-write-wins per key (a new retrieval call fully replaces the
/// source's entry, never appends).
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    async fn set(&self, key: &str, value: Value, ttl_seconds: u64) -> Result<()>;

    /// Returns true if the key existed
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Remove a session's root entry and every `{id}:{source}` sub-key;
    /// returns how many entries were removed. Called on logout.
    async fn delete_session(&self, session_id: &str) -> Result<usize>;
}

/// Reference to a generated report artifact
#[derive(Debug, Clone)]
pub struct ReportArtifact {
    /// Opaque handle the caller can resolve to a download
    pub reference: String,
}

/// Downstream report generator (external collaborator)
///
/// Consumes the per-source cache entries for a session; the pipeline
/// only decides whether to invoke it and which sources to hand over.
#[async_trait]
pub trait ReportGenerator: Send + Sync {
    async fn generate(&self, session_id: &str, sources: &[Source]) -> Result<ReportArtifact>;
}
