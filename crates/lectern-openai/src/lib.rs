// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI-compatible adapters for the Lectern engine.
//!
//! [`OpenAiProvider`] implements [`ProviderAdapter`] over `/chat/completions`
//! and [`OpenAiEmbedder`] implements [`EmbeddingAdapter`] over `/embeddings`.
//! Any server speaking the same wire format can be targeted through
//! `base_url`.

pub mod client;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use lectern_config::model::{EmbeddingConfig, LlmConfig};
use lectern_core::types::{
    AdapterType, EmbeddingInput, EmbeddingOutput, HealthStatus, ProviderRequest,
    ProviderResponse, TokenUsage,
};
use lectern_core::{EmbeddingAdapter, LecternError, PluginAdapter, ProviderAdapter};
use tracing::{debug, info};

pub use client::OpenAiClient;
use types::{ChatMessage, ChatRequest, ChatResponse, EmbeddingRequest, EmbeddingResponse};

/// Environment variable consulted when no key is configured.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Chat-completion provider.
pub struct OpenAiProvider {
    client: OpenAiClient,
}

impl OpenAiProvider {
    /// Creates a provider from the `llm` configuration section.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LecternError> {
        let api_key = resolve_api_key(&config.api_key)?;
        let client = OpenAiClient::new(
            &api_key,
            &config.base_url,
            Duration::from_secs(config.timeout_secs),
        )?;
        info!(
            model = %config.answer_model,
            base_url = client.base_url(),
            "chat provider initialized"
        );
        Ok(Self { client })
    }

    /// Creates a provider with an existing client (for testing).
    pub fn with_client(client: OpenAiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PluginAdapter for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, LecternError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiProvider {
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, LecternError> {
        let body = to_chat_request(request);
        let response: ChatResponse = self
            .client
            .post_json("chat/completions", &body, &body.model)
            .await?;
        from_chat_response(response, &body.model)
    }
}

fn to_chat_request(request: ProviderRequest) -> ChatRequest {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = request.system_prompt {
        messages.push(ChatMessage {
            role: "system".into(),
            content: system,
        });
    }
    messages.push(ChatMessage {
        role: "user".into(),
        content: request.prompt,
    });
    ChatRequest {
        model: request.model,
        messages,
        max_tokens: request.max_tokens,
        temperature: request.temperature,
    }
}

fn from_chat_response(
    response: ChatResponse,
    requested_model: &str,
) -> Result<ProviderResponse, LecternError> {
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| LecternError::provider("response contained no message content"))?;
    let usage = response
        .usage
        .map(|u| TokenUsage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        })
        .unwrap_or_default();
    let model = if response.model.is_empty() {
        requested_model.to_string()
    } else {
        response.model
    };
    debug!(model = %model, output_tokens = usage.output_tokens, "completion received");
    Ok(ProviderResponse {
        content,
        model,
        usage,
    })
}

/// Text-embedding adapter.
pub struct OpenAiEmbedder {
    client: OpenAiClient,
    dimensions: Option<usize>,
}

impl OpenAiEmbedder {
    /// Creates an embedder from the `embedding` configuration section.
    ///
    /// The configured dimension is requested from the API and checked on
    /// every response.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, LecternError> {
        let api_key = resolve_api_key(&config.api_key)?;
        let client = OpenAiClient::new(
            &api_key,
            &config.base_url,
            Duration::from_millis(config.timeout_ms),
        )?;
        info!(
            model = %config.model,
            dimensions = config.dimensions,
            "embedding provider initialized"
        );
        Ok(Self {
            client,
            dimensions: Some(config.dimensions),
        })
    }

    /// Creates an embedder with an existing client (for testing).
    pub fn with_client(client: OpenAiClient, dimensions: Option<usize>) -> Self {
        Self { client, dimensions }
    }
}

#[async_trait]
impl PluginAdapter for OpenAiEmbedder {
    fn name(&self) -> &str {
        "openai-embeddings"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, LecternError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl EmbeddingAdapter for OpenAiEmbedder {
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, LecternError> {
        if input.texts.is_empty() {
            return Ok(EmbeddingOutput {
                embeddings: Vec::new(),
                dimensions: self.dimensions.unwrap_or(0),
            });
        }

        let expected = input.texts.len();
        let body = EmbeddingRequest {
            model: input.model,
            input: input.texts,
            dimensions: self.dimensions,
        };
        let response: EmbeddingResponse = self
            .client
            .post_json("embeddings", &body, &body.model)
            .await?;

        let mut data = response.data;
        if data.len() != expected {
            return Err(LecternError::provider(format!(
                "expected {expected} embeddings, received {}",
                data.len()
            )));
        }
        data.sort_by_key(|d| d.index);

        let dimensions = data.first().map(|d| d.embedding.len()).unwrap_or(0);
        if let Some(configured) = self.dimensions {
            if dimensions != configured {
                return Err(LecternError::provider(format!(
                    "embedding dimension {dimensions} does not match configured {configured}"
                )));
            }
        }
        if data.iter().any(|d| d.embedding.len() != dimensions) {
            return Err(LecternError::provider("embeddings have inconsistent dimensions"));
        }

        Ok(EmbeddingOutput {
            embeddings: data.into_iter().map(|d| d.embedding).collect(),
            dimensions,
        })
    }
}

/// Resolves the API key from config or the [`API_KEY_ENV`] environment variable.
pub fn resolve_api_key(config_key: &Option<String>) -> Result<String, LecternError> {
    pick_api_key(config_key, std::env::var(API_KEY_ENV).ok())
}

fn pick_api_key(
    config_key: &Option<String>,
    env_key: Option<String>,
) -> Result<String, LecternError> {
    if let Some(key) = config_key.as_ref().filter(|k| !k.is_empty()) {
        return Ok(key.clone());
    }
    env_key.filter(|k| !k.is_empty()).ok_or_else(|| {
        LecternError::Config(format!(
            "API key not found. Set llm.api_key / embedding.api_key in config or the {API_KEY_ENV} environment variable."
        ))
    })
}
