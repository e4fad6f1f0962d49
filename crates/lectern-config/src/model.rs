// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Lectern engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Lectern configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LecternConfig {
    /// Process identity and logging.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Embedding model settings.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Language-model settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Vector store backend settings.
    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    /// Hybrid document retrieval settings.
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Conversation memory settings.
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Context manager settings.
    #[serde(default)]
    pub context: ContextConfig,

    /// Intent classification settings.
    #[serde(default)]
    pub intent: IntentConfig,

    /// Retry policy for provider calls.
    #[serde(default)]
    pub resilience: ResilienceConfig,
}

/// Process identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name used in logs and the CLI banner.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_agent_name() -> String {
    "lectern".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Embedding model configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EmbeddingConfig {
    /// Embedding model identifier; part of every cache key.
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// API key. `None` falls back to the `OPENAI_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Base URL of an OpenAI-compatible API.
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// Expected embedding dimension.
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Maximum number of cached embeddings (LRU).
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Timeout for a single embedding call.
    #[serde(default = "default_embedding_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            api_key: None,
            base_url: default_openai_base_url(),
            dimensions: default_dimensions(),
            cache_capacity: default_cache_capacity(),
            timeout_ms: default_embedding_timeout_ms(),
        }
    }
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_dimensions() -> usize {
    1536
}

fn default_cache_capacity() -> usize {
    4096
}

fn default_embedding_timeout_ms() -> u64 {
    5_000
}

/// Language-model configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    /// Model used to generate answers.
    #[serde(default = "default_answer_model")]
    pub answer_model: String,

    /// Model used for optional LLM-assisted intent refinement.
    #[serde(default = "default_intent_model")]
    pub intent_model: String,

    /// Alternate model used when the primary model is rate limited.
    #[serde(default = "default_fallback_model")]
    pub fallback_model: Option<String>,

    /// API key. `None` falls back to the `OPENAI_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Base URL of an OpenAI-compatible API.
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// Maximum tokens to generate per answer.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature.
    #[serde(default)]
    pub temperature: f32,

    /// Timeout for a single completion call.
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            answer_model: default_answer_model(),
            intent_model: default_intent_model(),
            fallback_model: default_fallback_model(),
            api_key: None,
            base_url: default_openai_base_url(),
            max_tokens: default_max_tokens(),
            temperature: 0.0,
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_answer_model() -> String {
    "gpt-4o".to_string()
}

fn default_intent_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_fallback_model() -> Option<String> {
    Some("gpt-4o-mini".to_string())
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_llm_timeout_secs() -> u64 {
    30
}

/// Which vector store implementation backs the collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorBackend {
    /// Qdrant over its REST API.
    Qdrant,
    /// Process-local store; contents are lost on exit.
    Memory,
}

/// Vector store backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VectorStoreConfig {
    #[serde(default = "default_backend")]
    pub backend: VectorBackend,

    /// Base URL of the Qdrant REST API.
    #[serde(default = "default_qdrant_url")]
    pub url: String,

    /// Qdrant API key, if the instance requires one.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Timeout for a single vector store request.
    #[serde(default = "default_vector_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            url: default_qdrant_url(),
            api_key: None,
            timeout_ms: default_vector_timeout_ms(),
        }
    }
}

fn default_backend() -> VectorBackend {
    VectorBackend::Qdrant
}

fn default_qdrant_url() -> String {
    "http://localhost:6333".to_string()
}

fn default_vector_timeout_ms() -> u64 {
    5_000
}

/// Hybrid document retrieval configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetrievalConfig {
    /// Weight of the normalized vector score.
    #[serde(default = "default_vector_weight")]
    pub vector_weight: f32,

    /// Weight of the normalized keyword score.
    #[serde(default = "default_keyword_weight")]
    pub keyword_weight: f32,

    /// Baseline number of candidates requested from each side.
    #[serde(default = "default_k")]
    pub default_k: usize,

    /// Lower bound for the dynamically adjusted `k`.
    #[serde(default = "default_min_k")]
    pub min_k: usize,

    /// Upper bound for the dynamically adjusted `k`.
    #[serde(default = "default_max_k")]
    pub max_k: usize,

    /// Baseline minimum similarity for vector hits.
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f32,

    /// Maximum number of documents sampled into a keyword index.
    #[serde(default = "default_keyword_sample_size")]
    pub keyword_sample_size: usize,

    /// Number of fused candidates handed to the answer generator.
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Seconds a cached retriever handle stays valid.
    #[serde(default = "default_handle_ttl_secs")]
    pub handle_ttl_secs: u64,

    /// Timeout for the whole retrieval branch of a turn.
    #[serde(default = "default_branch_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            vector_weight: default_vector_weight(),
            keyword_weight: default_keyword_weight(),
            default_k: default_k(),
            min_k: default_min_k(),
            max_k: default_max_k(),
            score_threshold: default_score_threshold(),
            keyword_sample_size: default_keyword_sample_size(),
            top_n: default_top_n(),
            handle_ttl_secs: default_handle_ttl_secs(),
            timeout_ms: default_branch_timeout_ms(),
        }
    }
}

fn default_vector_weight() -> f32 {
    0.7
}

fn default_keyword_weight() -> f32 {
    0.3
}

fn default_k() -> usize {
    20
}

fn default_min_k() -> usize {
    8
}

fn default_max_k() -> usize {
    50
}

fn default_score_threshold() -> f32 {
    0.6
}

fn default_keyword_sample_size() -> usize {
    1000
}

fn default_top_n() -> usize {
    8
}

fn default_handle_ttl_secs() -> u64 {
    600
}

fn default_branch_timeout_ms() -> u64 {
    8_000
}

/// Conversation memory configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryConfig {
    /// Maximum number of most-recent turns kept per user.
    #[serde(default = "default_retention_turns")]
    pub retention_turns: usize,

    /// Number of past turns recalled per message.
    #[serde(default = "default_recall_k")]
    pub recall_k: usize,

    /// Minimum cosine similarity for a recalled turn.
    #[serde(default = "default_recall_threshold")]
    pub recall_threshold: f32,

    /// Timeout for the recall branch of a turn.
    #[serde(default = "default_branch_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            retention_turns: default_retention_turns(),
            recall_k: default_recall_k(),
            recall_threshold: default_recall_threshold(),
            timeout_ms: default_branch_timeout_ms(),
        }
    }
}

fn default_retention_turns() -> usize {
    20
}

fn default_recall_k() -> usize {
    5
}

fn default_recall_threshold() -> f32 {
    0.3
}

/// Context manager configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ContextConfig {
    /// Turns after which the working context is reset even without a topic change.
    #[serde(default = "default_max_active_turns")]
    pub max_active_turns: u64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_active_turns: default_max_active_turns(),
        }
    }
}

fn default_max_active_turns() -> u64 {
    10
}

/// Intent classification configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IntentConfig {
    /// Ask the intent model to refine low-confidence heuristic classifications.
    #[serde(default)]
    pub llm_assist: bool,

    /// Heuristic confidence below which LLM refinement is attempted.
    #[serde(default = "default_llm_threshold")]
    pub llm_threshold: f32,
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            llm_assist: false,
            llm_threshold: default_llm_threshold(),
        }
    }
}

fn default_llm_threshold() -> f32 {
    0.5
}

/// Retry policy for transient provider failures.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ResilienceConfig {
    /// Total attempts including the first call.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry; doubled on each further retry.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Upper bound on the delay between retries.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    250
}

fn default_max_backoff_ms() -> u64 {
    2_000
}
