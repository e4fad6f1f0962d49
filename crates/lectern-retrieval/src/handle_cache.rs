// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-collection cache of built retriever handles.
//!
//! Building a handle means counting the collection and building its keyword
//! index, so concurrent requests for the same collection share one build.
//! Handles expire after a TTL and are dropped explicitly on upload.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use lectern_core::{CollectionId, LecternError, UserId};
use tokio::sync::OnceCell;
use tokio::time::Instant;
use tracing::debug;

use crate::keyword::KeywordIndex;

/// What the hybrid retriever needs to know about one documents collection.
#[derive(Debug)]
pub struct RetrieverHandle {
    pub collection: CollectionId,
    /// `None` when the keyword build failed; retrieval then runs vector-only.
    pub keyword: Option<KeywordIndex>,
    pub collection_size: usize,
    pub built_at: Instant,
}

type Slot = Arc<OnceCell<Arc<RetrieverHandle>>>;

/// Single-flight, TTL-bounded handle cache keyed by collection.
pub struct HandleCache {
    ttl: Duration,
    slots: DashMap<CollectionId, Slot>,
}

impl HandleCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: DashMap::new(),
        }
    }

    /// Return the cached handle for `collection`, building it with `build`
    /// when absent or expired.
    pub async fn get_or_build<F, Fut>(
        &self,
        collection: &CollectionId,
        build: F,
    ) -> Result<Arc<RetrieverHandle>, LecternError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<RetrieverHandle, LecternError>>,
    {
        let slot = loop {
            let slot = self.slot(collection);
            let expired = match slot.get() {
                Some(handle) if handle.built_at.elapsed() < self.ttl => {
                    metrics::counter!("lectern_retriever_handle_hits_total").increment(1);
                    return Ok(Arc::clone(handle));
                }
                Some(_) => true,
                None => false,
            };
            if !expired {
                break slot;
            }
            debug!(collection = %collection, "retriever handle expired");
            self.slots.remove_if(collection, |_, s| Arc::ptr_eq(s, &slot));
        };

        metrics::counter!("lectern_retriever_handle_builds_total").increment(1);
        let result = slot
            .get_or_try_init(|| async { build().await.map(Arc::new) })
            .await
            .map(Arc::clone);
        if result.is_err() {
            self.slots.remove_if(collection, |_, s| Arc::ptr_eq(s, &slot));
        }
        result
    }

    /// Drop the cached handle for one collection.
    pub fn invalidate(&self, collection: &CollectionId) {
        if self.slots.remove(collection).is_some() {
            debug!(collection = %collection, "retriever handle invalidated");
        }
    }

    /// Drop every cached handle owned by `user_id`.
    pub fn invalidate_user(&self, user_id: &UserId) {
        self.slots.retain(|collection, _| collection.owner() != user_id);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn slot(&self, collection: &CollectionId) -> Slot {
        self.slots
            .entry(collection.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }
}
