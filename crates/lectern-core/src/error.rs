// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Lectern engine.

use std::time::Duration;

use thiserror::Error;

/// The primary error type used across all Lectern adapter traits and core operations.
#[derive(Debug, Error)]
pub enum LecternError {
    /// Language-model or embedding provider failure (API error, bad response).
    /// Treated as transient and retried with bounded backoff.
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The provider rejected the request because of rate limiting.
    #[error("rate limited by model `{model}`")]
    RateLimited {
        model: String,
        retry_after: Option<Duration>,
    },

    /// The vector store backing a collection could not be reached.
    #[error("index unavailable for collection `{collection}`: {message}")]
    IndexUnavailable { collection: String, message: String },

    /// An operation attempted to touch a collection owned by another user.
    /// This is a programming-contract violation and is never retried.
    #[error("isolation violation: user `{user_id}` attempted to access collection `{collection}`")]
    IsolationViolation { user_id: String, collection: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Configuration errors (invalid values, missing credentials).
    #[error("configuration error: {0}")]
    Config(String),

    /// Caller supplied input the engine cannot act on (empty user id, etc.).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LecternError {
    /// Whether a retry of the same call could succeed.
    ///
    /// `RateLimited` is not transient here: it is handled by switching models.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LecternError::Provider { .. }
                | LecternError::Timeout { .. }
                | LecternError::IndexUnavailable { .. }
        )
    }

    /// Whether this error must abort the request immediately.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LecternError::IsolationViolation { .. })
    }

    /// Shorthand for a provider error without an underlying source.
    pub fn provider(message: impl Into<String>) -> Self {
        LecternError::Provider {
            message: message.into(),
            source: None,
        }
    }
}
