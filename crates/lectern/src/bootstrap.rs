// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process setup shared by every subcommand: tracing, metrics and engine wiring.

use std::sync::Arc;

use lectern_agent::LecternEngine;
use lectern_config::model::{LecternConfig, VectorBackend};
use lectern_core::{EmbeddingAdapter, LecternError, ProviderAdapter, VectorStoreAdapter};
use lectern_openai::{OpenAiEmbedder, OpenAiProvider};
use lectern_qdrant::QdrantVectorStore;
use lectern_retrieval::InMemoryVectorStore;
use tracing::info;

/// Initialize the tracing subscriber with an env filter.
///
/// `RUST_LOG` wins when set; otherwise Lectern crates log at `log_level` and
/// everything else at `warn`.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("lectern={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Build the vector store selected by `vector_store.backend`.
pub fn build_store(config: &LecternConfig) -> Result<Arc<dyn VectorStoreAdapter>, LecternError> {
    let store: Arc<dyn VectorStoreAdapter> = match config.vector_store.backend {
        VectorBackend::Qdrant => Arc::new(QdrantVectorStore::from_config(&config.vector_store)?),
        VectorBackend::Memory => {
            info!("using in-memory vector store; uploads are lost on exit");
            Arc::new(InMemoryVectorStore::new())
        }
    };
    Ok(store)
}

/// Build the engine over the configured OpenAI-compatible API and vector store.
pub fn build_engine(config: &LecternConfig) -> Result<LecternEngine, LecternError> {
    let provider: Arc<dyn ProviderAdapter> = Arc::new(OpenAiProvider::from_config(&config.llm)?);
    let embedder: Arc<dyn EmbeddingAdapter> =
        Arc::new(OpenAiEmbedder::from_config(&config.embedding)?);
    let store = build_store(config)?;
    Ok(LecternEngine::new(config, provider, embedder, store))
}

/// Text shown to the user when a message could not be answered.
///
/// Model outages get an apology instead of the raw error.
pub fn user_facing_error(err: &LecternError) -> String {
    match err {
        LecternError::Provider { .. }
        | LecternError::RateLimited { .. }
        | LecternError::Timeout { .. } => {
            "Sorry, I can't reach the language model right now. Please try again in a moment."
                .to_string()
        }
        LecternError::InvalidInput(message) => format!("invalid input: {message}"),
        other => other.to_string(),
    }
}

/// Copy of `config` with credentials masked, for display.
pub fn redacted(config: &LecternConfig) -> LecternConfig {
    let mut shown = config.clone();
    for key in [
        &mut shown.llm.api_key,
        &mut shown.embedding.api_key,
        &mut shown.vector_store.api_key,
    ] {
        if key.is_some() {
            *key = Some("********".to_string());
        }
    }
    shown
}
