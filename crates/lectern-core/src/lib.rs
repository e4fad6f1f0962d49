// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Lectern document-chat engine.
//!
//! This crate provides the foundational trait definitions, error types, and
//! common types used throughout the Lectern workspace. Every external
//! capability (language model, embedding model, vector store) is consumed
//! through a trait defined here.

pub mod collection;
pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use collection::{CollectionId, CollectionKind, UserCollectionPair};
pub use error::LecternError;
pub use types::{AdapterType, HealthStatus, SessionId, UserId};

// Re-export all adapter traits at crate root.
pub use traits::{EmbeddingAdapter, PluginAdapter, ProviderAdapter, VectorStoreAdapter};
