// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic embedding adapter for tests.
//!
//! Each text becomes a bag-of-words vector: every token (as produced by the
//! keyword tokenizer) is hashed into one of `dimensions` buckets. Texts that
//! share words therefore have positive cosine similarity, and identical
//! texts always produce identical vectors.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use lectern_core::types::{AdapterType, EmbeddingInput, EmbeddingOutput, HealthStatus};
use lectern_core::{EmbeddingAdapter, LecternError, PluginAdapter};
use lectern_retrieval::keyword::tokenize;

pub const DEFAULT_DIMENSIONS: usize = 64;

pub struct MockEmbedder {
    dimensions: usize,
    calls: AtomicUsize,
    texts: AtomicUsize,
    failing: AtomicBool,
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self::with_dimensions(DEFAULT_DIMENSIONS)
    }

    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
            calls: AtomicUsize::new(0),
            texts: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    /// Number of `embed` calls received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of texts embedded across all calls.
    pub fn texts_embedded(&self) -> usize {
        self.texts.load(Ordering::SeqCst)
    }

    /// Make subsequent calls fail with a provider error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// The vector this embedder produces for `text`.
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dimensions];
        for token in tokenize(text) {
            let bucket = token
                .bytes()
                .fold(0xcbf2_9ce4_8422_2325u64, |h, b| {
                    (h ^ b as u64).wrapping_mul(0x0100_0000_01b3)
                });
            v[(bucket % self.dimensions as u64) as usize] += 1.0;
        }
        v
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockEmbedder {
    fn name(&self) -> &str {
        "mock-embedder"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, LecternError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl EmbeddingAdapter for MockEmbedder {
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, LecternError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(LecternError::provider("mock embedder is failing"));
        }
        self.texts.fetch_add(input.texts.len(), Ordering::SeqCst);
        Ok(EmbeddingOutput {
            embeddings: input.texts.iter().map(|t| self.vector_for(t)).collect(),
            dimensions: self.dimensions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_retrieval::cosine_similarity;

    #[tokio::test]
    async fn identical_texts_match_and_calls_are_counted() {
        let embedder = MockEmbedder::new();
        let out = embedder
            .embed(EmbeddingInput {
                model: "m".into(),
                texts: vec!["storm at sea".into(), "storm at sea".into()],
            })
            .await
            .unwrap();
        assert_eq!(out.embeddings[0], out.embeddings[1]);
        assert_eq!(out.dimensions, DEFAULT_DIMENSIONS);
        assert_eq!(embedder.calls(), 1);
        assert_eq!(embedder.texts_embedded(), 2);
    }

    #[test]
    fn shared_words_are_similar() {
        let embedder = MockEmbedder::new();
        let a = embedder.vector_for("lighthouse keepers");
        let b = embedder.vector_for("the lighthouse");
        assert!(cosine_similarity(&a, &b) > 0.5);
    }

    #[tokio::test]
    async fn failing_mode_errors() {
        let embedder = MockEmbedder::new();
        embedder.set_failing(true);
        let err = embedder
            .embed(EmbeddingInput {
                model: "m".into(),
                texts: vec!["x".into()],
            })
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }
}
