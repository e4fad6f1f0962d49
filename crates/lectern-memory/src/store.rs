// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation memory backed by the per-user chat collection.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use lectern_config::model::MemoryConfig;
use lectern_core::types::{ConversationTurn, StoredPayload, VectorPoint};
use lectern_core::{CollectionId, CollectionKind, LecternError, UserId};
use lectern_retrieval::{EmbeddingCache, VectorIndex};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Stores, trims and recalls conversation turns per user.
pub struct ConversationMemoryStore {
    index: Arc<VectorIndex>,
    embeddings: Arc<EmbeddingCache>,
    embedding_model: String,
    config: MemoryConfig,
    /// Per-user write lock plus the last timestamp written for that user.
    writers: DashMap<UserId, Arc<Mutex<Option<DateTime<Utc>>>>>,
}

impl ConversationMemoryStore {
    pub fn new(
        index: Arc<VectorIndex>,
        embeddings: Arc<EmbeddingCache>,
        embedding_model: impl Into<String>,
        config: MemoryConfig,
    ) -> Self {
        Self {
            index,
            embeddings,
            embedding_model: embedding_model.into(),
            config,
            writers: DashMap::new(),
        }
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Persist `turn` for `user_id`, then trim the collection to the
    /// retention window. Returns the stored turn with its embedding set.
    pub async fn record(
        &self,
        user_id: &UserId,
        turn: ConversationTurn,
    ) -> Result<ConversationTurn, LecternError> {
        let mut stored = self.record_exchange(user_id, vec![turn]).await?;
        stored
            .pop()
            .ok_or_else(|| LecternError::Internal("recorded turn went missing".into()))
    }

    /// Persist `turns` for `user_id` in a single upsert, so either all of
    /// them are written or none are, then trim to the retention window.
    ///
    /// Timestamps are made strictly increasing per user so oldest-first
    /// trimming follows write order even when two turns share a clock tick.
    pub async fn record_exchange(
        &self,
        user_id: &UserId,
        mut turns: Vec<ConversationTurn>,
    ) -> Result<Vec<ConversationTurn>, LecternError> {
        let collection = CollectionId::new(user_id, CollectionKind::Chat)?;
        if let Some(foreign) = turns.iter().find(|t| &t.user_id != user_id) {
            return Err(LecternError::IsolationViolation {
                user_id: user_id.to_string(),
                collection: format!("turn owned by {}", foreign.user_id),
            });
        }
        if turns.is_empty() {
            return Ok(turns);
        }

        let texts: Vec<String> = turns.iter().map(|t| t.text.clone()).collect();
        let vectors = self
            .embeddings
            .get_or_compute_many(&texts, &self.embedding_model)
            .await?;

        let writer = self.writer(user_id);
        let mut last_written = writer.lock().await;
        let mut last = *last_written;
        let mut points = Vec::with_capacity(turns.len());
        for (turn, vector) in turns.iter_mut().zip(vectors) {
            if let Some(prev) = last {
                if turn.timestamp <= prev {
                    turn.timestamp = prev + ChronoDuration::microseconds(1);
                }
            }
            last = Some(turn.timestamp);
            let payload = serde_json::to_value(&*turn)
                .map_err(|e| LecternError::Internal(format!("failed to encode turn: {e}")))?;
            points.push(VectorPoint {
                id: turn.turn_id.clone(),
                vector: vector.clone(),
                payload,
            });
            turn.embedding = vector;
        }
        self.index.upsert(user_id, &collection, points).await?;
        *last_written = last;

        self.enforce_retention(user_id, &collection).await?;
        Ok(turns)
    }

    /// Up to `k` past turns most similar to `query`, most similar first.
    pub async fn recall(
        &self,
        user_id: &UserId,
        query: &str,
        k: usize,
    ) -> Result<Vec<ConversationTurn>, LecternError> {
        let collection = CollectionId::new(user_id, CollectionKind::Chat)?;
        let vector = self
            .embeddings
            .get_or_compute(query, &self.embedding_model)
            .await?;
        let hits = self
            .index
            .query(user_id, &collection, &vector, k, self.config.recall_threshold)
            .await?;

        let mut turns: Vec<ConversationTurn> = hits
            .into_iter()
            .filter_map(|hit| decode_turn(user_id, &hit.id, hit.payload))
            .collect();
        // Stored payloads omit the vector; recorded texts are normally cache hits.
        let texts: Vec<String> = turns.iter().map(|t| t.text.clone()).collect();
        let vectors = self
            .embeddings
            .get_or_compute_many(&texts, &self.embedding_model)
            .await?;
        for (turn, vector) in turns.iter_mut().zip(vectors) {
            turn.embedding = vector;
        }
        debug!(user_id = %user_id, recalled = turns.len(), "memory recall");
        Ok(turns)
    }

    /// The last `n` turns, oldest first.
    pub async fn recent(
        &self,
        user_id: &UserId,
        n: usize,
    ) -> Result<Vec<ConversationTurn>, LecternError> {
        let collection = CollectionId::new(user_id, CollectionKind::Chat)?;
        let mut turns = self.load_all(user_id, &collection).await?;
        let skip = turns.len().saturating_sub(n);
        Ok(turns.split_off(skip))
    }

    /// Number of stored turns for `user_id`.
    pub async fn turn_count(&self, user_id: &UserId) -> Result<usize, LecternError> {
        let collection = CollectionId::new(user_id, CollectionKind::Chat)?;
        self.index.count(user_id, &collection).await
    }

    async fn enforce_retention(
        &self,
        user_id: &UserId,
        collection: &CollectionId,
    ) -> Result<(), LecternError> {
        let retention = self.config.retention_turns.max(1);
        let count = self.index.count(user_id, collection).await?;
        if count <= retention {
            return Ok(());
        }

        let turns = self.load_all(user_id, collection).await?;
        let excess = turns.len().saturating_sub(retention);
        let expired: Vec<String> = turns
            .into_iter()
            .take(excess)
            .map(|t| t.turn_id)
            .collect();
        if expired.is_empty() {
            return Ok(());
        }

        debug!(user_id = %user_id, removed = expired.len(), "trimming conversation memory");
        metrics::counter!("lectern_memory_trimmed_turns_total").increment(expired.len() as u64);
        self.index.delete(user_id, collection, &expired).await
    }

    /// Every stored turn in chronological order (ties by turn id).
    async fn load_all(
        &self,
        user_id: &UserId,
        collection: &CollectionId,
    ) -> Result<Vec<ConversationTurn>, LecternError> {
        let count = self.index.count(user_id, collection).await?;
        if count == 0 {
            return Ok(Vec::new());
        }
        let payloads = self.index.scroll(user_id, collection, count).await?;
        let mut turns: Vec<ConversationTurn> = payloads
            .into_iter()
            .filter_map(|StoredPayload { id, payload }| decode_turn(user_id, &id, payload))
            .collect();
        turns.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.turn_id.cmp(&b.turn_id))
        });
        Ok(turns)
    }

    /// Drop the per-user write lock unless a write currently holds it.
    ///
    /// The entries otherwise live as long as the store. Returns whether the
    /// entry is gone.
    pub fn release_writer(&self, user_id: &UserId) -> bool {
        self.writers
            .remove_if(user_id, |_, writer| Arc::strong_count(writer) == 1);
        !self.writers.contains_key(user_id)
    }

    fn writer(&self, user_id: &UserId) -> Arc<Mutex<Option<DateTime<Utc>>>> {
        self.writers
            .entry(user_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }
}

fn decode_turn(
    user_id: &UserId,
    point_id: &str,
    payload: serde_json::Value,
) -> Option<ConversationTurn> {
    match serde_json::from_value::<ConversationTurn>(payload) {
        Ok(turn) if &turn.user_id == user_id => Some(turn),
        Ok(turn) => {
            warn!(user_id = %user_id, owner = %turn.user_id, point_id, "ignoring turn owned by another user");
            None
        }
        Err(err) => {
            warn!(user_id = %user_id, point_id, error = %err, "skipping undecodable turn");
            None
        }
    }
}
