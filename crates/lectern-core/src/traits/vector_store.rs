// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vector store adapter trait for per-collection nearest-neighbour search.

use async_trait::async_trait;

use crate::collection::CollectionId;
use crate::error::LecternError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ScoredPoint, StoredPayload, VectorPoint};

/// Backend holding per-user vector collections.
///
/// Collections are created lazily on first write. Reads against a collection
/// that does not exist yet return empty results rather than errors.
/// Unreachable backends report [`LecternError::IndexUnavailable`].
#[async_trait]
pub trait VectorStoreAdapter: PluginAdapter {
    /// Insert or replace points in a collection.
    async fn upsert(
        &self,
        collection: &CollectionId,
        points: Vec<VectorPoint>,
    ) -> Result<(), LecternError>;

    /// Nearest-neighbour search, ordered by descending score.
    ///
    /// Hits scoring below `score_threshold` are omitted.
    async fn query(
        &self,
        collection: &CollectionId,
        vector: &[f32],
        k: usize,
        score_threshold: f32,
    ) -> Result<Vec<ScoredPoint>, LecternError>;

    /// List up to `limit` payloads from a collection, without vectors.
    async fn scroll(
        &self,
        collection: &CollectionId,
        limit: usize,
    ) -> Result<Vec<StoredPayload>, LecternError>;

    /// Delete points by id. Unknown ids are ignored.
    async fn delete(&self, collection: &CollectionId, ids: &[String]) -> Result<(), LecternError>;

    /// Number of points in a collection (0 if it does not exist).
    async fn count(&self, collection: &CollectionId) -> Result<usize, LecternError>;
}
