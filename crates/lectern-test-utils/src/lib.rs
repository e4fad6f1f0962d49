// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Lectern integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`MockProvider`] - Mock language model with pre-configured responses
//! - [`MockEmbedder`] - Deterministic bag-of-words embeddings with call counting
//! - [`FailingVectorStore`] - Vector store whose backend is always unreachable
//! - [`SlowVectorStore`] - In-memory store whose reads stall for a fixed delay
//! - [`TestHarness`] - A full engine over in-memory backends

pub mod failing_store;
pub mod harness;
pub mod mock_embedder;
pub mod mock_provider;
pub mod slow_store;

pub use failing_store::FailingVectorStore;
pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_embedder::MockEmbedder;
pub use mock_provider::MockProvider;
pub use slow_store::SlowVectorStore;
