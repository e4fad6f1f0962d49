// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Memoizing front of the embedding capability.
//!
//! Entries are keyed by `(sha256(text), model_id)` and evicted least recently
//! used first. Concurrent misses on the same key share a single upstream call;
//! misses on different keys never wait on each other. A failed computation is
//! not cached, so the next caller retries.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::DashMap;
use futures::future::try_join_all;
use lectern_core::types::EmbeddingInput;
use lectern_core::{EmbeddingAdapter, LecternError};
use lectern_resilience::{RetryPolicy, retry, with_timeout};
use sha2::{Digest, Sha256};
use tokio::sync::OnceCell;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    digest: String,
    model: String,
}

impl CacheKey {
    fn new(text: &str, model: &str) -> Self {
        Self {
            digest: hex::encode(Sha256::digest(text.as_bytes())),
            model: model.to_string(),
        }
    }
}

/// Recency-ordered map: `order` maps a monotonically increasing tick to the
/// key touched at that tick, so the first entry is always the LRU victim.
#[derive(Debug, Default)]
struct LruEntries {
    values: HashMap<CacheKey, (Arc<Vec<f32>>, u64)>,
    order: BTreeMap<u64, CacheKey>,
    tick: u64,
}

impl LruEntries {
    fn get(&mut self, key: &CacheKey) -> Option<Arc<Vec<f32>>> {
        self.tick += 1;
        let tick = self.tick;
        let (value, last) = self.values.get_mut(key)?;
        self.order.remove(last);
        *last = tick;
        self.order.insert(tick, key.clone());
        Some(Arc::clone(value))
    }

    fn insert(&mut self, key: CacheKey, value: Arc<Vec<f32>>, capacity: usize) {
        self.tick += 1;
        if let Some((_, last)) = self.values.insert(key.clone(), (value, self.tick)) {
            self.order.remove(&last);
        }
        self.order.insert(self.tick, key);
        while self.values.len() > capacity {
            let Some((_, victim)) = self.order.pop_first() else {
                break;
            };
            self.values.remove(&victim);
        }
    }
}

/// Bounded, single-flight embedding cache.
pub struct EmbeddingCache {
    embedder: Arc<dyn EmbeddingAdapter>,
    capacity: usize,
    timeout: Duration,
    retry_policy: RetryPolicy,
    entries: Mutex<LruEntries>,
    inflight: DashMap<CacheKey, Arc<OnceCell<Arc<Vec<f32>>>>>,
}

impl EmbeddingCache {
    pub fn new(embedder: Arc<dyn EmbeddingAdapter>, capacity: usize, timeout: Duration) -> Self {
        Self {
            embedder,
            capacity: capacity.max(1),
            timeout,
            retry_policy: RetryPolicy::default(),
            entries: Mutex::new(LruEntries::default()),
            inflight: DashMap::new(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Number of cached vectors.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.values.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the embedding of `text` under `model`, computing it at most once.
    pub async fn get_or_compute(&self, text: &str, model: &str) -> Result<Vec<f32>, LecternError> {
        let key = CacheKey::new(text, model);

        if let Some(hit) = self.lookup(&key) {
            metrics::counter!("lectern_embedding_cache_hits_total").increment(1);
            return Ok(hit.as_ref().clone());
        }
        metrics::counter!("lectern_embedding_cache_misses_total").increment(1);

        let cell = self
            .inflight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let result = cell
            .get_or_try_init(|| async {
                // A previous flight may have finished between the miss and the cell lookup.
                if let Some(hit) = self.lookup(&key) {
                    return Ok::<_, LecternError>(hit);
                }
                debug!(model, "computing embedding");
                let vector = Arc::new(self.compute(text, model).await?);
                self.store(key.clone(), Arc::clone(&vector));
                Ok::<_, LecternError>(vector)
            })
            .await
            .map(|v| v.as_ref().clone());

        self.inflight.remove_if(&key, |_, c| Arc::ptr_eq(c, &cell));
        result
    }

    /// Embed several texts, reusing cached vectors where possible.
    pub async fn get_or_compute_many(
        &self,
        texts: &[String],
        model: &str,
    ) -> Result<Vec<Vec<f32>>, LecternError> {
        try_join_all(texts.iter().map(|t| self.get_or_compute(t, model))).await
    }

    fn lookup(&self, key: &CacheKey) -> Option<Arc<Vec<f32>>> {
        self.entries.lock().ok()?.get(key)
    }

    fn store(&self, key: CacheKey, value: Arc<Vec<f32>>) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key, value, self.capacity);
        }
    }

    async fn compute(&self, text: &str, model: &str) -> Result<Vec<f32>, LecternError> {
        let output = retry(&self.retry_policy, "embed", || {
            with_timeout(
                self.timeout,
                self.embedder.embed(EmbeddingInput {
                    model: model.to_string(),
                    texts: vec![text.to_string()],
                }),
            )
        })
        .await?;

        output
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| LecternError::provider("embedding response contained no vectors"))
    }
}
