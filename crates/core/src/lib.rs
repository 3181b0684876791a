//! Core types and collaborator contracts for catalogchat
//!
//! This crate holds the shared data model (retrieval results,
//! aggregated documents, gate decisions, token usage), the per-request
//! token ledger, the configuration structure, and the traits every
//! external collaborator is injected through.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

pub mod config;
pub mod error;
pub mod tokens;
pub mod traits;
pub mod types;

pub use config::Config;
pub use error::{Error, Result, ResultExt};
pub use tokens::{TokenLedger, TokenTotals};
pub use traits::{
    LlmProvider, LlmResponse, LlmUsage, ReportArtifact, ReportGenerator, Retriever, SessionStore,
};
pub use types::{
    AggregatedDocument, GateDecision, IntentMap, RetrievalResult, Source, TokenUsageRecord,
    Verdict,
};
