// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Intent routing for incoming messages.
//!
//! The [`IntentClassifier`] labels each message with one of the closed set of
//! [`IntentLabel`](lectern_core::types::IntentLabel)s using deterministic
//! heuristics. When enabled, [`IntentRouter`] asks a small model to refine
//! low-confidence results and falls back to the heuristic on any failure.

pub mod assist;
pub mod classifier;

pub use assist::IntentRouter;
pub use classifier::{IntentClassification, IntentClassifier};
