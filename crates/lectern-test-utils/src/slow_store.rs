// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A vector store that answers reads only after a fixed delay.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lectern_core::types::{AdapterType, HealthStatus, ScoredPoint, StoredPayload, VectorPoint};
use lectern_core::{CollectionId, LecternError, PluginAdapter, VectorStoreAdapter};
use lectern_retrieval::InMemoryVectorStore;
use tracing::debug;

/// Wraps an [`InMemoryVectorStore`]; `query`, `scroll` and `count` sleep for
/// `delay` first, writes go straight through.
pub struct SlowVectorStore {
    inner: Arc<InMemoryVectorStore>,
    delay: Duration,
}

impl SlowVectorStore {
    pub fn new(inner: Arc<InMemoryVectorStore>, delay: Duration) -> Self {
        Self { inner, delay }
    }

    async fn stall(&self, op: &str, collection: &CollectionId) {
        debug!(
            op,
            collection = %collection,
            delay_ms = self.delay.as_millis() as u64,
            "stalling vector store read"
        );
        tokio::time::sleep(self.delay).await;
    }
}

#[async_trait]
impl PluginAdapter for SlowVectorStore {
    fn name(&self) -> &str {
        "slow-store"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::VectorStore
    }

    async fn health_check(&self) -> Result<HealthStatus, LecternError> {
        Ok(HealthStatus::Degraded(format!("reads delayed by {:?}", self.delay)))
    }
}

#[async_trait]
impl VectorStoreAdapter for SlowVectorStore {
    async fn upsert(
        &self,
        collection: &CollectionId,
        points: Vec<VectorPoint>,
    ) -> Result<(), LecternError> {
        self.inner.upsert(collection, points).await
    }

    async fn query(
        &self,
        collection: &CollectionId,
        vector: &[f32],
        k: usize,
        score_threshold: f32,
    ) -> Result<Vec<ScoredPoint>, LecternError> {
        self.stall("query", collection).await;
        self.inner.query(collection, vector, k, score_threshold).await
    }

    async fn scroll(
        &self,
        collection: &CollectionId,
        limit: usize,
    ) -> Result<Vec<StoredPayload>, LecternError> {
        self.stall("scroll", collection).await;
        self.inner.scroll(collection, limit).await
    }

    async fn delete(&self, collection: &CollectionId, ids: &[String]) -> Result<(), LecternError> {
        self.inner.delete(collection, ids).await
    }

    async fn count(&self, collection: &CollectionId) -> Result<usize, LecternError> {
        self.stall("count", collection).await;
        self.inner.count(collection).await
    }
}
