// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks constraints serde cannot express: weight sums, ordered bounds and
//! non-zero capacities. All violations are collected rather than failing fast.

use crate::diagnostic::ConfigError;
use crate::model::LecternConfig;

const WEIGHT_SUM_TOLERANCE: f32 = 1e-6;
const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
pub fn validate_config(config: &LecternConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.agent.log_level.as_str()) {
        errors.push(ConfigError::invalid(
            "agent.log_level",
            format!(
                "`{}` is not one of {}",
                config.agent.log_level,
                LOG_LEVELS.join(", ")
            ),
        ));
    }

    for (key, model) in [
        ("embedding.model", &config.embedding.model),
        ("llm.answer_model", &config.llm.answer_model),
        ("llm.intent_model", &config.llm.intent_model),
    ] {
        if model.trim().is_empty() {
            errors.push(ConfigError::invalid(key, "must not be empty"));
        }
    }

    if config.embedding.cache_capacity < 1 {
        errors.push(ConfigError::invalid(
            "embedding.cache_capacity",
            "must be at least 1",
        ));
    }
    if config.embedding.dimensions < 1 {
        errors.push(ConfigError::invalid("embedding.dimensions", "must be at least 1"));
    }

    let r = &config.retrieval;
    for (key, weight) in [
        ("retrieval.vector_weight", r.vector_weight),
        ("retrieval.keyword_weight", r.keyword_weight),
    ] {
        if !(0.0..=1.0).contains(&weight) {
            errors.push(ConfigError::invalid(
                key,
                format!("must be within [0, 1], got {weight}"),
            ));
        }
    }
    let sum = r.vector_weight + r.keyword_weight;
    if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        errors.push(ConfigError::invalid(
            "retrieval.vector_weight",
            format!("vector_weight + keyword_weight must equal 1.0, got {sum}"),
        ));
    }
    if r.min_k < 1 {
        errors.push(ConfigError::invalid("retrieval.min_k", "must be at least 1"));
    }
    if r.min_k > r.max_k {
        errors.push(ConfigError::invalid(
            "retrieval.min_k",
            format!("min_k ({}) must not exceed max_k ({})", r.min_k, r.max_k),
        ));
    }
    if r.default_k < r.min_k || r.default_k > r.max_k {
        errors.push(ConfigError::invalid(
            "retrieval.default_k",
            format!(
                "must lie between min_k ({}) and max_k ({}), got {}",
                r.min_k, r.max_k, r.default_k
            ),
        ));
    }
    if !(0.0..=1.0).contains(&r.score_threshold) {
        errors.push(ConfigError::invalid(
            "retrieval.score_threshold",
            format!("must be within [0, 1], got {}", r.score_threshold),
        ));
    }
    if r.keyword_sample_size < 1 {
        errors.push(ConfigError::invalid(
            "retrieval.keyword_sample_size",
            "must be at least 1",
        ));
    }
    if r.top_n < 1 {
        errors.push(ConfigError::invalid("retrieval.top_n", "must be at least 1"));
    }

    let m = &config.memory;
    if m.retention_turns < 1 {
        errors.push(ConfigError::invalid(
            "memory.retention_turns",
            "must be at least 1",
        ));
    }
    if !(0.0..=1.0).contains(&m.recall_threshold) {
        errors.push(ConfigError::invalid(
            "memory.recall_threshold",
            format!("must be within [0, 1], got {}", m.recall_threshold),
        ));
    }

    if config.context.max_active_turns < 1 {
        errors.push(ConfigError::invalid(
            "context.max_active_turns",
            "must be at least 1",
        ));
    }

    if !(0.0..=1.0).contains(&config.intent.llm_threshold) {
        errors.push(ConfigError::invalid(
            "intent.llm_threshold",
            format!("must be within [0, 1], got {}", config.intent.llm_threshold),
        ));
    }

    let res = &config.resilience;
    if res.max_attempts < 1 {
        errors.push(ConfigError::invalid(
            "resilience.max_attempts",
            "must be at least 1",
        ));
    }
    if res.initial_backoff_ms > res.max_backoff_ms {
        errors.push(ConfigError::invalid(
            "resilience.initial_backoff_ms",
            format!(
                "must not exceed max_backoff_ms ({}), got {}",
                res.max_backoff_ms, res.initial_backoff_ms
            ),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
