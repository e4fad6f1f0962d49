// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Answer generation against the language-model capability.

use std::sync::Arc;
use std::time::Duration;

use lectern_config::model::LlmConfig;
use lectern_core::types::{
    ConversationTurn, IntentLabel, ProviderRequest, ProviderResponse, RetrievalCandidate,
};
use lectern_core::{LecternError, ProviderAdapter};
use lectern_resilience::{RetryPolicy, retry, with_timeout};
use tracing::{debug, warn};

use crate::language::detect_language;
use crate::prompt::{PromptInputs, build_prompt, system_prompt};
use crate::recording;

/// Builds the answer prompt and calls the model with retry and fallback.
pub struct AnswerGenerator {
    provider: Arc<dyn ProviderAdapter>,
    config: LlmConfig,
    policy: RetryPolicy,
}

impl AnswerGenerator {
    pub fn new(provider: Arc<dyn ProviderAdapter>, config: LlmConfig, policy: RetryPolicy) -> Self {
        Self {
            provider,
            config,
            policy,
        }
    }

    /// Answer `message` from the supplied evidence and recalled memory.
    ///
    /// Empty evidence is not an error.
    pub async fn generate(
        &self,
        message: &str,
        intent: IntentLabel,
        documents: &[RetrievalCandidate],
        memory: &[ConversationTurn],
    ) -> Result<String, LecternError> {
        self.generate_from(&PromptInputs::new(message, intent, documents, memory))
            .await
    }

    /// Answer from fully assembled prompt inputs.
    pub async fn generate_from(&self, inputs: &PromptInputs<'_>) -> Result<String, LecternError> {
        let language = detect_language(inputs.message);
        let system = system_prompt(inputs.intent, language);
        let prompt = build_prompt(inputs);
        debug!(intent = %inputs.intent, language = %language, "prompt assembled");

        let primary = self.config.answer_model.as_str();
        let response = match self.complete_on(primary, &system, &prompt).await {
            Err(LecternError::RateLimited { model, retry_after }) => {
                match self.config.fallback_model.as_deref() {
                    Some(fallback) if fallback != primary => {
                        warn!(
                            model = %model,
                            fallback,
                            retry_after_ms = retry_after.map(|d| d.as_millis() as u64),
                            "rate limited, switching to fallback model"
                        );
                        recording::record_fallback(fallback);
                        self.complete_on(fallback, &system, &prompt).await?
                    }
                    _ => return Err(LecternError::RateLimited { model, retry_after }),
                }
            }
            other => other?,
        };

        recording::record_tokens(
            &response.model,
            response.usage.input_tokens,
            response.usage.output_tokens,
        );
        debug!(
            model = %response.model,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "answer generated"
        );
        Ok(sanitize(&response.content))
    }

    async fn complete_on(
        &self,
        model: &str,
        system: &str,
        prompt: &str,
    ) -> Result<ProviderResponse, LecternError> {
        let timeout = Duration::from_secs(self.config.timeout_secs);
        retry(&self.policy, "generate", || {
            let request = ProviderRequest {
                model: model.to_string(),
                system_prompt: Some(system.to_string()),
                prompt: prompt.to_string(),
                max_tokens: self.config.max_tokens,
                temperature: self.config.temperature,
            };
            let provider = Arc::clone(&self.provider);
            async move {
                let response = with_timeout(timeout, provider.complete(request)).await?;
                if sanitize(&response.content).is_empty() {
                    return Err(LecternError::provider("model returned an empty answer"));
                }
                Ok(response)
            }
        })
        .await
    }
}

/// Trim and drop NUL and control characters other than line breaks and tabs.
pub fn sanitize(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\t'))
        .collect::<String>()
        .trim()
        .to_string()
}
