// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-local vector store with brute-force cosine search.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use lectern_core::types::{AdapterType, HealthStatus, ScoredPoint, StoredPayload, VectorPoint};
use lectern_core::{CollectionId, LecternError, PluginAdapter, VectorStoreAdapter};

/// Cosine similarity between two vectors; 0.0 for mismatched or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 { 0.0 } else { dot / denom }
}

#[derive(Debug, Clone)]
struct StoredPoint {
    vector: Vec<f32>,
    payload: serde_json::Value,
    /// Insertion sequence, used to give scrolls a stable order.
    seq: u64,
}

#[derive(Debug, Default)]
struct Collections {
    points: HashMap<String, HashMap<String, StoredPoint>>,
    next_seq: u64,
}

/// Vector store that keeps every collection in memory.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    inner: RwLock<Collections>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of collections that currently hold at least one point.
    pub fn collection_names(&self) -> Vec<String> {
        let Ok(inner) = self.inner.read() else {
            return Vec::new();
        };
        let mut names: Vec<String> = inner
            .points
            .iter()
            .filter(|(_, points)| !points.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}

fn poisoned(collection: &CollectionId) -> LecternError {
    LecternError::IndexUnavailable {
        collection: collection.to_string(),
        message: "in-memory store lock poisoned".into(),
    }
}

#[async_trait]
impl PluginAdapter for InMemoryVectorStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::VectorStore
    }

    async fn health_check(&self) -> Result<HealthStatus, LecternError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl VectorStoreAdapter for InMemoryVectorStore {
    async fn upsert(
        &self,
        collection: &CollectionId,
        points: Vec<VectorPoint>,
    ) -> Result<(), LecternError> {
        let mut inner = self.inner.write().map_err(|_| poisoned(collection))?;
        let Collections { points: all, next_seq } = &mut *inner;
        let target = all.entry(collection.as_str().to_string()).or_default();
        for point in points {
            *next_seq += 1;
            let seq = target.get(&point.id).map(|p| p.seq).unwrap_or(*next_seq);
            target.insert(
                point.id,
                StoredPoint {
                    vector: point.vector,
                    payload: point.payload,
                    seq,
                },
            );
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: &CollectionId,
        vector: &[f32],
        k: usize,
        score_threshold: f32,
    ) -> Result<Vec<ScoredPoint>, LecternError> {
        let inner = self.inner.read().map_err(|_| poisoned(collection))?;
        let Some(points) = inner.points.get(collection.as_str()) else {
            return Ok(Vec::new());
        };
        let mut hits: Vec<ScoredPoint> = points
            .iter()
            .filter_map(|(id, p)| {
                let score = cosine_similarity(vector, &p.vector);
                (score >= score_threshold).then(|| ScoredPoint {
                    id: id.clone(),
                    payload: p.payload.clone(),
                    score,
                })
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(k);
        Ok(hits)
    }

    async fn scroll(
        &self,
        collection: &CollectionId,
        limit: usize,
    ) -> Result<Vec<StoredPayload>, LecternError> {
        let inner = self.inner.read().map_err(|_| poisoned(collection))?;
        let Some(points) = inner.points.get(collection.as_str()) else {
            return Ok(Vec::new());
        };
        let mut ordered: Vec<(&String, &StoredPoint)> = points.iter().collect();
        ordered.sort_by_key(|(_, p)| p.seq);
        Ok(ordered
            .into_iter()
            .take(limit)
            .map(|(id, p)| StoredPayload {
                id: id.clone(),
                payload: p.payload.clone(),
            })
            .collect())
    }

    async fn delete(&self, collection: &CollectionId, ids: &[String]) -> Result<(), LecternError> {
        let mut inner = self.inner.write().map_err(|_| poisoned(collection))?;
        if let Some(points) = inner.points.get_mut(collection.as_str()) {
            for id in ids {
                points.remove(id);
            }
        }
        Ok(())
    }

    async fn count(&self, collection: &CollectionId) -> Result<usize, LecternError> {
        let inner = self.inner.read().map_err(|_| poisoned(collection))?;
        Ok(inner.points.get(collection.as_str()).map_or(0, HashMap::len))
    }
}
