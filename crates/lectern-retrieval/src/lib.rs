// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Document retrieval for the Lectern engine.
//!
//! ## Architecture
//!
//! - **EmbeddingCache**: bounded LRU, single-flight memo of the embedding capability
//! - **VectorIndex**: isolation-checked, time-bounded access to a vector store
//! - **InMemoryVectorStore**: brute-force cosine store for local runs and tests
//! - **KeywordIndex**: BM25 over a seeded sample of a documents collection
//! - **HandleCache**: TTL cache of per-collection retriever handles
//! - **HybridRetriever**: weighted min-max fusion of vector and keyword hits

pub mod embedding_cache;
pub mod handle_cache;
pub mod hybrid;
pub mod in_memory;
pub mod keyword;
pub mod vector_index;

pub use embedding_cache::EmbeddingCache;
pub use handle_cache::{HandleCache, RetrieverHandle};
pub use hybrid::HybridRetriever;
pub use in_memory::{InMemoryVectorStore, cosine_similarity};
pub use keyword::{KeywordHit, KeywordIndex};
pub use vector_index::{SearchParams, VectorIndex};
