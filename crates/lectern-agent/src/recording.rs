// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade so any recorder the host installs can collect
//! these metrics. Without a recorder every call is a no-op.

use lectern_core::types::IntentLabel;
use metrics::{describe_counter, describe_histogram};

/// Register all Lectern metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!("lectern_messages_total", "Messages handled, by intent");
    describe_counter!("lectern_tokens_total", "Tokens consumed by answer generation");
    describe_counter!(
        "lectern_degraded_total",
        "Workflow branches that fell back to an empty result"
    );
    describe_counter!("lectern_retries_total", "Retried calls to external capabilities");
    describe_counter!("lectern_model_fallbacks_total", "Answers produced by the fallback model");
    describe_counter!("lectern_embedding_cache_hits_total", "Embedding cache hits");
    describe_counter!("lectern_embedding_cache_misses_total", "Embedding cache misses");
    describe_counter!("lectern_retriever_handle_hits_total", "Retriever handle cache hits");
    describe_counter!("lectern_retriever_handle_builds_total", "Retriever handle builds");
    describe_counter!("lectern_memory_trimmed_turns_total", "Turns removed by retention");
    describe_counter!("lectern_intent_refinements_total", "Model-assisted intent refinements");
    describe_counter!("lectern_context_resets_total", "Context resets, by reason");
    describe_histogram!(
        "lectern_message_latency_seconds",
        "End-to-end latency of handle_message in seconds"
    );
}

/// Record a handled message.
pub fn record_message(intent: IntentLabel) {
    metrics::counter!("lectern_messages_total", "intent" => intent.to_string()).increment(1);
}

/// Record token consumption.
pub fn record_tokens(model: &str, input: u32, output: u32) {
    metrics::counter!("lectern_tokens_total", "model" => model.to_string(), "type" => "input")
        .increment(input as u64);
    metrics::counter!("lectern_tokens_total", "model" => model.to_string(), "type" => "output")
        .increment(output as u64);
}

/// Record a workflow branch that degraded to an empty result.
pub fn record_degraded(branch: &'static str) {
    metrics::counter!("lectern_degraded_total", "branch" => branch).increment(1);
}

/// Record an answer served by the fallback model.
pub fn record_fallback(model: &str) {
    metrics::counter!("lectern_model_fallbacks_total", "model" => model.to_string()).increment(1);
}

/// Record a context reset.
pub fn record_reset(reason: &str) {
    metrics::counter!("lectern_context_resets_total", "reason" => reason.to_string()).increment(1);
}

/// Record end-to-end message latency.
pub fn record_latency(seconds: f64) {
    metrics::histogram!("lectern_message_latency_seconds").record(seconds);
}
