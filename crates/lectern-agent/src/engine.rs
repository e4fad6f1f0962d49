// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The engine facade: one entry point for messages, one for uploads.
//!
//! Caches, stores and the workflow are built once from configuration and
//! injected adapters, then shared by every request. Conversation states are
//! held per user behind an async mutex, so two messages for the same user are
//! processed in arrival order while different users never wait on each other.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use lectern_config::LecternConfig;
use lectern_context::ContextManager;
use lectern_core::types::{ConversationState, DocumentChunk, VectorPoint};
use lectern_core::{
    CollectionId, CollectionKind, EmbeddingAdapter, LecternError, ProviderAdapter, SessionId,
    UserCollectionPair, UserId, VectorStoreAdapter,
};
use lectern_memory::ConversationMemoryStore;
use lectern_resilience::RetryPolicy;
use lectern_retrieval::{EmbeddingCache, HandleCache, HybridRetriever, VectorIndex};
use lectern_router::IntentRouter;
use tokio::sync::Mutex;
use tracing::{Instrument, debug, info, info_span};

use crate::generator::AnswerGenerator;
use crate::library::{self, BookSummary};
use crate::recording;
use crate::workflow::{BranchTimeouts, Workflow};

type StateSlot = Arc<Mutex<Option<ConversationState>>>;

/// Document-chat engine over injected model, embedding and vector-store adapters.
pub struct LecternEngine {
    workflow: Workflow,
    index: Arc<VectorIndex>,
    embeddings: Arc<EmbeddingCache>,
    retriever: Arc<HybridRetriever>,
    memory: Arc<ConversationMemoryStore>,
    embedding_model: String,
    states: DashMap<UserId, StateSlot>,
}

impl LecternEngine {
    pub fn new(
        config: &LecternConfig,
        provider: Arc<dyn ProviderAdapter>,
        embedder: Arc<dyn EmbeddingAdapter>,
        store: Arc<dyn VectorStoreAdapter>,
    ) -> Self {
        let policy = RetryPolicy::from_config(&config.resilience);
        let index = Arc::new(VectorIndex::new(
            store,
            Duration::from_millis(config.vector_store.timeout_ms),
        ));
        let embeddings = Arc::new(
            EmbeddingCache::new(
                embedder,
                config.embedding.cache_capacity,
                Duration::from_millis(config.embedding.timeout_ms),
            )
            .with_retry_policy(policy),
        );
        let handles = Arc::new(HandleCache::new(Duration::from_secs(
            config.retrieval.handle_ttl_secs,
        )));
        let retriever = Arc::new(HybridRetriever::new(
            Arc::clone(&index),
            Arc::clone(&embeddings),
            handles,
            config.retrieval.clone(),
            config.embedding.model.as_str(),
        ));
        let memory = Arc::new(ConversationMemoryStore::new(
            Arc::clone(&index),
            Arc::clone(&embeddings),
            config.embedding.model.as_str(),
            config.memory.clone(),
        ));
        let router = IntentRouter::from_config(
            &config.intent,
            Some(Arc::clone(&provider)),
            config.llm.intent_model.as_str(),
            Duration::from_secs(config.llm.timeout_secs),
        );
        let generator = AnswerGenerator::new(provider, config.llm.clone(), policy);

        let workflow = Workflow::new(
            router,
            ContextManager::new(&config.context),
            Arc::clone(&retriever),
            Arc::clone(&memory),
            generator,
            Arc::clone(&index),
            BranchTimeouts {
                retrieval: Duration::from_millis(config.retrieval.timeout_ms),
                memory: Duration::from_millis(config.memory.timeout_ms),
            },
        );

        info!(
            backend = index.backend_name(),
            answer_model = %config.llm.answer_model,
            embedding_model = %config.embedding.model,
            "engine ready"
        );

        Self {
            workflow,
            index,
            embeddings,
            retriever,
            memory,
            embedding_model: config.embedding.model.clone(),
            states: DashMap::new(),
        }
    }

    /// Answer `message` for `user_id` in `session_id`.
    ///
    /// Returns the answer and the conversation state after the turn. Fails
    /// only on invalid input, an isolation violation, or when the language
    /// model cannot produce an answer; retrieval, recall and recording
    /// failures degrade silently.
    pub async fn handle_message(
        &self,
        user_id: &UserId,
        session_id: &SessionId,
        message: &str,
    ) -> Result<(String, ConversationState), LecternError> {
        let span = info_span!("handle_message", user_id = %user_id, session_id = %session_id);
        async move {
            UserCollectionPair::for_user(user_id)?;
            if message.trim().is_empty() {
                return Err(LecternError::InvalidInput("message must not be empty".into()));
            }

            let started = Instant::now();
            let slot = self.state_slot(user_id);
            let mut current = slot.lock().await;
            let state = current
                .clone()
                .unwrap_or_else(|| ConversationState::new(user_id.clone(), session_id.clone()));

            let outcome = self
                .workflow
                .run(user_id, session_id, message, state)
                .await?;
            *current = Some(outcome.state.clone());

            let elapsed = started.elapsed();
            recording::record_message(outcome.classification.label);
            recording::record_latency(elapsed.as_secs_f64());
            info!(
                intent = %outcome.classification.label,
                phase = %outcome.state.phase,
                turn_count = outcome.state.turn_count,
                degraded = ?outcome.degraded,
                elapsed_ms = elapsed.as_millis() as u64,
                "message handled"
            );
            Ok((outcome.answer, outcome.state))
        }
        .instrument(span)
        .await
    }

    /// Embed and store `chunks` in `user_id`'s documents collection, then drop
    /// the user's cached retriever handles so the next query sees them.
    ///
    /// Returns the number of chunks stored.
    pub async fn upload_document_chunks(
        &self,
        user_id: &UserId,
        chunks: Vec<DocumentChunk>,
    ) -> Result<usize, LecternError> {
        let collection = CollectionId::new(user_id, CollectionKind::Documents)?;
        if chunks.is_empty() {
            return Ok(0);
        }

        let mut chunks = chunks;
        for chunk in &mut chunks {
            if chunk.source_collection.is_empty() {
                chunk.source_collection = collection.to_string();
            } else if chunk.source_collection != collection.as_str() {
                return Err(LecternError::IsolationViolation {
                    user_id: user_id.to_string(),
                    collection: chunk.source_collection.clone(),
                });
            }
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self
            .embeddings
            .get_or_compute_many(&texts, &self.embedding_model)
            .await?;

        let mut points = Vec::with_capacity(chunks.len());
        for (chunk, vector) in chunks.iter().zip(vectors) {
            let payload = serde_json::to_value(chunk)
                .map_err(|e| LecternError::Internal(format!("failed to encode chunk: {e}")))?;
            points.push(VectorPoint {
                id: chunk.point_id(),
                vector,
                payload,
            });
        }
        let stored = points.len();
        self.index.upsert(user_id, &collection, points).await?;
        self.clear_user_cache(user_id);

        info!(user_id = %user_id, collection = %collection, chunks = stored, "documents uploaded");
        Ok(stored)
    }

    /// Per-book summary of everything `user_id` has uploaded.
    pub async fn list_library(&self, user_id: &UserId) -> Result<Vec<BookSummary>, LecternError> {
        library::list_library(&self.index, user_id).await
    }

    /// Drop cached retriever handles for `user_id`.
    pub fn clear_user_cache(&self, user_id: &UserId) {
        self.retriever.invalidate_user(user_id);
    }

    /// Release the in-memory bookkeeping kept for `user_id`: conversation
    /// state, memory write lock and cached retriever handles. Stored turns
    /// and documents are untouched.
    ///
    /// Per-user entries are otherwise kept for the life of the engine. Entries
    /// held by a message in flight are left alone; returns `false` then.
    pub fn forget_user(&self, user_id: &UserId) -> bool {
        self.states
            .remove_if(user_id, |_, slot| Arc::strong_count(slot) == 1);
        let state_released = !self.states.contains_key(user_id);
        let writer_released = self.memory.release_writer(user_id);
        self.clear_user_cache(user_id);
        debug!(user_id = %user_id, state_released, writer_released, "user forgotten");
        state_released && writer_released
    }

    /// The last committed conversation state for `user_id`, if any.
    pub async fn conversation_state(&self, user_id: &UserId) -> Option<ConversationState> {
        let slot = self.states.get(user_id).map(|s| Arc::clone(s.value()))?;
        let state = slot.lock().await;
        state.clone()
    }

    pub fn memory(&self) -> &ConversationMemoryStore {
        &self.memory
    }

    fn state_slot(&self, user_id: &UserId) -> StateSlot {
        self.states
            .entry(user_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }
}
