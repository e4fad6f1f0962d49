// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Isolation-checked access to the vector store.
//!
//! [`VectorIndex`] is the only path from the engine to a
//! [`VectorStoreAdapter`]. Every call names the acting user and the target
//! collection; the collection's owner is checked before the backend is
//! touched, and each call is bounded by a timeout.

use std::sync::Arc;
use std::time::Duration;

use lectern_config::model::RetrievalConfig;
use lectern_core::types::{ScoredPoint, StoredPayload, VectorPoint};
use lectern_core::{CollectionId, LecternError, UserId, VectorStoreAdapter};
use lectern_resilience::with_timeout;
use tracing::debug;

/// Collections larger than this get a wider candidate pool.
const LARGE_COLLECTION: usize = 1000;
/// Threshold drop applied per full block of query words.
const THRESHOLD_STEP: f32 = 0.05;
const WORDS_PER_STEP: usize = 10;
const THRESHOLD_FLOOR: f32 = 0.25;

/// Per-query search parameters derived from the query and collection size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchParams {
    pub k: usize,
    pub score_threshold: f32,
}

impl SearchParams {
    /// Widen `k` for longer queries and bigger collections, and relax the
    /// score threshold for long queries, whose similarity scores run flatter.
    pub fn for_query(query: &str, collection_size: usize, config: &RetrievalConfig) -> Self {
        let words = query.split_whitespace().count();

        let mut k = config
            .default_k
            .max(words * 3)
            .clamp(config.min_k, config.max_k.max(config.min_k));
        if collection_size > LARGE_COLLECTION {
            k += (collection_size as f64).log2() as usize;
        }

        let base = config.score_threshold;
        let relaxed = base - THRESHOLD_STEP * (words / WORDS_PER_STEP) as f32;
        let score_threshold = relaxed.max(THRESHOLD_FLOOR.min(base));

        Self { k, score_threshold }
    }
}

/// Vector store access bound to the isolation guard.
pub struct VectorIndex {
    store: Arc<dyn VectorStoreAdapter>,
    timeout: Duration,
}

impl VectorIndex {
    pub fn new(store: Arc<dyn VectorStoreAdapter>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub fn backend_name(&self) -> &str {
        self.store.name()
    }

    pub async fn upsert(
        &self,
        acting: &UserId,
        collection: &CollectionId,
        points: Vec<VectorPoint>,
    ) -> Result<(), LecternError> {
        collection.ensure_owned_by(acting)?;
        debug!(collection = %collection, points = points.len(), "upserting points");
        self.bounded(collection, self.store.upsert(collection, points))
            .await
    }

    pub async fn query(
        &self,
        acting: &UserId,
        collection: &CollectionId,
        vector: &[f32],
        k: usize,
        score_threshold: f32,
    ) -> Result<Vec<ScoredPoint>, LecternError> {
        collection.ensure_owned_by(acting)?;
        self.bounded(
            collection,
            self.store.query(collection, vector, k, score_threshold),
        )
        .await
    }

    pub async fn scroll(
        &self,
        acting: &UserId,
        collection: &CollectionId,
        limit: usize,
    ) -> Result<Vec<StoredPayload>, LecternError> {
        collection.ensure_owned_by(acting)?;
        self.bounded(collection, self.store.scroll(collection, limit))
            .await
    }

    pub async fn delete(
        &self,
        acting: &UserId,
        collection: &CollectionId,
        ids: &[String],
    ) -> Result<(), LecternError> {
        collection.ensure_owned_by(acting)?;
        if ids.is_empty() {
            return Ok(());
        }
        self.bounded(collection, self.store.delete(collection, ids))
            .await
    }

    pub async fn count(
        &self,
        acting: &UserId,
        collection: &CollectionId,
    ) -> Result<usize, LecternError> {
        collection.ensure_owned_by(acting)?;
        self.bounded(collection, self.store.count(collection)).await
    }

    /// Apply the call timeout, reporting expiry as an unavailable index.
    async fn bounded<T>(
        &self,
        collection: &CollectionId,
        fut: impl std::future::Future<Output = Result<T, LecternError>>,
    ) -> Result<T, LecternError> {
        with_timeout(self.timeout, fut).await.map_err(|err| match err {
            LecternError::Timeout { duration } => LecternError::IndexUnavailable {
                collection: collection.to_string(),
                message: format!("no response within {duration:?}"),
            },
            other => other,
        })
    }
}
