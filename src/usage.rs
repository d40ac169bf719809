//! Per-model usage accounting.
//!
//! The ledger is a plain value owned by the caller and threaded through the
//! pipeline, so parallel runs never share counters. Token counts are a rough
//! word-based estimate (1.3 tokens per word), good enough for relative cost
//! comparison between models.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModelUsage {
    pub calls: u64,
    pub words: u64,
    pub estimated_tokens: u64,
}

/// Accumulated completion usage, keyed by model name.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UsageLedger {
    models: BTreeMap<String, ModelUsage>,
}

/// Whitespace word count of a prompt or response.
pub fn word_count(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}

impl UsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completion call against `model`, charging `words` words.
    pub fn record_words(&mut self, model: &str, words: u64) {
        let entry = self.models.entry(model.to_string()).or_default();
        entry.calls += 1;
        entry.words += words;
        entry.estimated_tokens += words * 13 / 10;
    }

    /// Record one call, counting the words of both prompt and response.
    pub fn record_exchange(&mut self, model: &str, prompt: &str, response: &str) {
        self.record_words(model, word_count(prompt) + word_count(response));
    }

    pub fn models_used(&self) -> Vec<String> {
        self.models.keys().cloned().collect()
    }

    pub fn usage_for(&self, model: &str) -> Option<&ModelUsage> {
        self.models.get(model)
    }

    pub fn total_calls(&self) -> u64 {
        self.models.values().map(|u| u.calls).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Log a per-model usage summary at the end of a run.
    pub fn log_summary(&self) {
        if self.models.is_empty() {
            info!("No completion calls were made");
            return;
        }
        info!("Model usage summary:");
        for (model, usage) in &self.models {
            info!(
                "  {}: {} calls, {} words, ~{} tokens",
                model, usage.calls, usage.words, usage.estimated_tokens
            );
        }
    }
}
