// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across adapter traits and the Lectern engine.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Identifier of the end user on whose behalf the engine acts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for a conversation session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of external capability an adapter provides.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Provider,
    Embedding,
    VectorStore,
}

// --- Documents ---

/// A chunk of an uploaded document, as supplied by the ingestion collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub book_id: String,
    pub page_key: String,
    pub text: String,
    /// Collection the chunk was ingested into (`{user_id}_documents`).
    #[serde(default)]
    pub source_collection: String,
    /// Position of the page inside its book, used when listing a library.
    #[serde(default)]
    pub page_order: u32,
}

impl DocumentChunk {
    /// Stable point id for this chunk, derived from book and page.
    ///
    /// The page key is hashed inside a namespace derived from the book id;
    /// distinct (book, page) pairs get distinct ids whatever characters
    /// they contain.
    pub fn point_id(&self) -> String {
        let book = uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_OID, self.book_id.as_bytes());
        uuid::Uuid::new_v5(&book, self.page_key.as_bytes()).to_string()
    }
}

// --- Conversation ---

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single persisted message or response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub turn_id: String,
    pub user_id: UserId,
    pub role: Role,
    pub text: String,
    /// Set by memory on record and recall; never stored in the payload.
    #[serde(skip)]
    pub embedding: Vec<f32>,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    /// Create a new turn stamped with the current time.
    pub fn new(user_id: UserId, role: Role, text: impl Into<String>) -> Self {
        Self {
            turn_id: uuid::Uuid::new_v4().to_string(),
            user_id,
            role,
            text: text.into(),
            embedding: Vec::new(),
            timestamp: Utc::now(),
        }
    }
}

/// Closed set of intents used to shape the answer prompt.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum IntentLabel {
    /// A question answered from the user's documents.
    DocumentQuestion,
    /// A question about the library itself ("which books did I upload?").
    DocumentList,
    /// A short follow-up that only makes sense against the previous exchange.
    Clarification,
    /// Explicit change of subject.
    NewTopic,
    /// Small talk or general knowledge.
    GeneralChat,
}

/// Flags describing the active working context.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContextFlag {
    /// The current turn refers back to the previous exchange.
    FollowUp,
    /// The conversation is anchored on the uploaded documents.
    DocumentScoped,
    /// At least one branch of the last turn ran in degraded mode.
    Degraded,
}

/// Phase of the context state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "UPPERCASE")]
pub enum ContextPhase {
    Active,
    Reset,
}

/// Per-session conversational state owned by the workflow orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub user_id: UserId,
    pub session_id: SessionId,
    pub phase: ContextPhase,
    pub last_intent: Option<IntentLabel>,
    pub context_flags: BTreeSet<ContextFlag>,
    /// Total processed turns for this user; survives resets.
    pub turn_count: u64,
    /// Turns processed since the last reset.
    pub turns_since_reset: u64,
}

impl ConversationState {
    /// Initial state for a brand-new session: active, empty context.
    pub fn new(user_id: UserId, session_id: SessionId) -> Self {
        Self {
            user_id,
            session_id,
            phase: ContextPhase::Active,
            last_intent: None,
            context_flags: BTreeSet::new(),
            turn_count: 0,
            turns_since_reset: 0,
        }
    }

    pub fn has_flag(&self, flag: ContextFlag) -> bool {
        self.context_flags.contains(&flag)
    }
}

// --- Retrieval ---

/// A point stored in or returned from a vector collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: serde_json::Value,
}

/// A query hit with its similarity score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPoint {
    pub id: String,
    pub payload: serde_json::Value,
    pub score: f32,
}

/// A payload-only record returned by a collection scroll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPayload {
    pub id: String,
    pub payload: serde_json::Value,
}

/// One ranked hybrid-retrieval result.
///
/// Scores are the per-query normalized values in `[0, 1]`; a side that did
/// not return the candidate contributes 0.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalCandidate {
    pub id: String,
    pub chunk: DocumentChunk,
    pub vector_score: f32,
    pub keyword_score: f32,
    pub combined_score: f32,
    /// Zero-based rank in the vector result list, if present.
    pub vector_rank: Option<usize>,
    /// Zero-based rank in the keyword result list, if present.
    pub keyword_rank: Option<usize>,
}

// --- Provider types ---

/// A single-shot completion request to a language model.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRequest {
    pub model: String,
    pub system_prompt: Option<String>,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Token usage reported by a provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// A completion returned by a language model.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResponse {
    pub content: String,
    pub model: String,
    pub usage: TokenUsage,
}

// --- Embedding types ---

/// Input for an embedding adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingInput {
    pub model: String,
    pub texts: Vec<String>,
}

/// Output from an embedding adapter, one vector per input text.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingOutput {
    pub embeddings: Vec<Vec<f32>>,
    pub dimensions: usize,
}
