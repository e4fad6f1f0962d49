// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message workflow and engine facade for Lectern.
//!
//! [`LecternEngine`] wires the embedding cache, vector index, hybrid
//! retriever, conversation memory, context manager, intent router and
//! answer generator together and exposes two operations:
//! [`LecternEngine::handle_message`] and
//! [`LecternEngine::upload_document_chunks`].

pub mod engine;
pub mod follow_up;
pub mod generator;
pub mod language;
pub mod library;
pub mod prompt;
pub mod recording;
pub mod workflow;

pub use engine::LecternEngine;
pub use generator::AnswerGenerator;
pub use language::{Language, detect_language};
pub use library::BookSummary;
pub use workflow::{Stage, TurnOutcome, Workflow};
