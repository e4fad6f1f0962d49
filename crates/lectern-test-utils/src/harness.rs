// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles a complete engine with mock adapters over an
//! in-memory vector store (or an unreachable one) and provides helpers to
//! upload books and send messages.

use std::sync::Arc;
use std::time::Duration;

use lectern_agent::LecternEngine;
use lectern_config::LecternConfig;
use lectern_core::types::{ConversationState, DocumentChunk};
use lectern_core::{LecternError, SessionId, UserId, VectorStoreAdapter};
use lectern_retrieval::InMemoryVectorStore;

use crate::failing_store::FailingVectorStore;
use crate::mock_embedder::MockEmbedder;
use crate::mock_provider::MockProvider;
use crate::slow_store::SlowVectorStore;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    responses: Vec<String>,
    config: LecternConfig,
    failing_store: bool,
    read_delay: Option<Duration>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = LecternConfig::default();
        config.embedding.model = "mock-embedding".into();
        // The bag-of-words embedder produces lower similarities than a real model.
        config.retrieval.score_threshold = 0.1;
        config.resilience.initial_backoff_ms = 1;
        config.resilience.max_backoff_ms = 2;
        Self {
            responses: Vec::new(),
            config,
            failing_store: false,
            read_delay: None,
        }
    }

    /// Set mock provider responses.
    pub fn with_mock_responses(mut self, responses: Vec<String>) -> Self {
        self.responses = responses;
        self
    }

    /// Adjust the configuration before the engine is built.
    pub fn with_config(mut self, edit: impl FnOnce(&mut LecternConfig)) -> Self {
        edit(&mut self.config);
        self
    }

    /// Use a vector store whose backend is always unreachable.
    pub fn with_failing_store(mut self) -> Self {
        self.failing_store = true;
        self
    }

    /// Delay every vector store read by `delay`; writes are not delayed.
    pub fn with_slow_store(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    pub fn build(self) -> TestHarness {
        let provider = Arc::new(if self.responses.is_empty() {
            MockProvider::new()
        } else {
            MockProvider::with_responses(self.responses)
        });
        let embedder = Arc::new(MockEmbedder::new());
        let memory_store = Arc::new(InMemoryVectorStore::new());
        let failing = Arc::new(FailingVectorStore::new());
        let store: Arc<dyn VectorStoreAdapter> = match (self.failing_store, self.read_delay) {
            (true, _) => failing.clone(),
            (false, Some(delay)) => Arc::new(SlowVectorStore::new(memory_store.clone(), delay)),
            (false, None) => memory_store.clone(),
        };

        let engine = LecternEngine::new(&self.config, provider.clone(), embedder.clone(), store);
        TestHarness {
            engine,
            provider,
            embedder,
            store: memory_store,
            failing,
            config: self.config,
        }
    }
}

/// A complete engine over mock adapters.
pub struct TestHarness {
    pub engine: LecternEngine,
    pub provider: Arc<MockProvider>,
    pub embedder: Arc<MockEmbedder>,
    /// Backing store when the harness was not built with a failing store
    /// (wrapped by the slow store when one was requested).
    pub store: Arc<InMemoryVectorStore>,
    /// Backing store when the harness was built with a failing store.
    pub failing: Arc<FailingVectorStore>,
    pub config: LecternConfig,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Harness with default settings.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Send `message` as `user` in `session`.
    pub async fn send(
        &self,
        user: &str,
        session: &str,
        message: &str,
    ) -> Result<(String, ConversationState), LecternError> {
        self.engine
            .handle_message(&UserId::new(user), &SessionId(session.to_string()), message)
            .await
    }

    /// Upload `pages` of `book_id` for `user`; page keys are `p1`, `p2`, ...
    pub async fn upload_book(
        &self,
        user: &str,
        book_id: &str,
        pages: &[&str],
    ) -> Result<usize, LecternError> {
        let chunks = pages
            .iter()
            .enumerate()
            .map(|(i, text)| DocumentChunk {
                book_id: book_id.to_string(),
                page_key: format!("p{}", i + 1),
                text: text.to_string(),
                source_collection: String::new(),
                page_order: i as u32 + 1,
            })
            .collect();
        self.engine
            .upload_document_chunks(&UserId::new(user), chunks)
            .await
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
