//! Per-request token accounting
//!
//! A ledger is created per pipeline run and threaded through every
//! component that calls an LLM. Records are append-only; callers merge
//! or read totals at the end of the request.

use crate::types::{Source, TokenUsageRecord};
use std::collections::HashMap;
use std::sync::Mutex;

/// Accumulated input/output token totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenTotals {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Thread-safe append-only ledger of token usage records
#[derive(Debug, Default)]
pub struct TokenLedger {
    records: Mutex<Vec<TokenUsageRecord>>,
}

impl TokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one record. Poisoned locks are recovered: accounting must
    /// never take down the request.
    pub fn record(&self, record: TokenUsageRecord) {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.push(record);
    }

    /// Snapshot of all records in insertion order
    pub fn records(&self) -> Vec<TokenUsageRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Total tokens across all sources
    pub fn totals(&self) -> TokenTotals {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.iter().fold(TokenTotals::default(), |acc, r| TokenTotals {
            input_tokens: acc.input_tokens + r.input_tokens,
            output_tokens: acc.output_tokens + r.output_tokens,
        })
    }

    /// Totals grouped by source
    pub fn totals_by_source(&self) -> HashMap<Source, TokenTotals> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let mut by_source: HashMap<Source, TokenTotals> = HashMap::new();
        for r in records.iter() {
            let entry = by_source.entry(r.source).or_default();
            entry.input_tokens += r.input_tokens;
            entry.output_tokens += r.output_tokens;
        }
        by_source
    }

    /// Merge another ledger's records into this one
    pub fn merge(&self, other: &TokenLedger) {
        let incoming = other.records();
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.extend(incoming);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(source: Source, input: u64, output: u64) -> TokenUsageRecord {
        TokenUsageRecord {
            source,
            model: "test-model".to_string(),
            input_tokens: input,
            output_tokens: output,
            execution_time_secs: None,
        }
    }

    #[test]
    fn test_totals_accumulate() {
        let ledger = TokenLedger::new();
        ledger.record(record(Source::Vector, 100, 20));
        ledger.record(record(Source::Relational, 300, 50));

        let totals = ledger.totals();
        assert_eq!(totals.input_tokens, 400);
        assert_eq!(totals.output_tokens, 70);
    }

    #[test]
    fn test_totals_by_source() {
        let ledger = TokenLedger::new();
        ledger.record(record(Source::Vector, 10, 1));
        ledger.record(record(Source::Vector, 10, 1));
        ledger.record(record(Source::Graph, 5, 2));

        let by_source = ledger.totals_by_source();
        assert_eq!(by_source[&Source::Vector].input_tokens, 20);
        assert_eq!(by_source[&Source::Graph].output_tokens, 2);
        assert!(!by_source.contains_key(&Source::Relational));
    }

    #[test]
    fn test_merge_preserves_records() {
        let request_ledger = TokenLedger::new();
        request_ledger.record(record(Source::System, 7, 3));

        let shared = TokenLedger::new();
        shared.record(record(Source::Graph, 1, 1));
        shared.merge(&request_ledger);

        assert_eq!(shared.records().len(), 2);
        assert_eq!(shared.totals().input_tokens, 8);
    }

    #[test]
    fn test_concurrent_recording() {
        use std::sync::Arc;

        let ledger = Arc::new(TokenLedger::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        ledger.record(record(Source::Vector, 1, 1));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(ledger.totals().input_tokens, 800);
    }
}
