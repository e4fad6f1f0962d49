// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-user conversation memory for the Lectern engine.
//!
//! Turns are embedded and stored in the user's `{user_id}_chat` collection.
//! Only the most recent `retention_turns` turns are kept; older turns are
//! deleted oldest-first right after each write. Writes for one user are
//! serialized so retention never races itself; different users never share
//! a lock.

pub mod store;

pub use store::ConversationMemoryStore;
