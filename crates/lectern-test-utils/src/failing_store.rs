// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A vector store whose backend can never be reached.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use lectern_core::types::{AdapterType, HealthStatus, ScoredPoint, StoredPayload, VectorPoint};
use lectern_core::{CollectionId, LecternError, PluginAdapter, VectorStoreAdapter};
use tracing::debug;

/// Every operation fails with [`LecternError::IndexUnavailable`].
#[derive(Default)]
pub struct FailingVectorStore {
    calls: AtomicUsize,
}

impl FailingVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of operations attempted against the store.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn unavailable(&self, collection: &CollectionId) -> LecternError {
        let attempt = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(collection = %collection, attempt, "refusing vector store call");
        LecternError::IndexUnavailable {
            collection: collection.to_string(),
            message: "connection refused".into(),
        }
    }
}

#[async_trait]
impl PluginAdapter for FailingVectorStore {
    fn name(&self) -> &str {
        "failing-store"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::VectorStore
    }

    async fn health_check(&self) -> Result<HealthStatus, LecternError> {
        Ok(HealthStatus::Unhealthy("backend unreachable".into()))
    }
}

#[async_trait]
impl VectorStoreAdapter for FailingVectorStore {
    async fn upsert(
        &self,
        collection: &CollectionId,
        _points: Vec<VectorPoint>,
    ) -> Result<(), LecternError> {
        Err(self.unavailable(collection))
    }

    async fn query(
        &self,
        collection: &CollectionId,
        _vector: &[f32],
        _k: usize,
        _score_threshold: f32,
    ) -> Result<Vec<ScoredPoint>, LecternError> {
        Err(self.unavailable(collection))
    }

    async fn scroll(
        &self,
        collection: &CollectionId,
        _limit: usize,
    ) -> Result<Vec<StoredPayload>, LecternError> {
        Err(self.unavailable(collection))
    }

    async fn delete(&self, collection: &CollectionId, _ids: &[String]) -> Result<(), LecternError> {
        Err(self.unavailable(collection))
    }

    async fn count(&self, collection: &CollectionId) -> Result<usize, LecternError> {
        Err(self.unavailable(collection))
    }
}
