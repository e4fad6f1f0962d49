// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Optional model-assisted refinement of low-confidence classifications.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use lectern_config::model::IntentConfig;
use lectern_core::types::{ConversationState, IntentLabel, ProviderRequest};
use lectern_core::{LecternError, ProviderAdapter};
use lectern_resilience::with_timeout;
use tracing::{debug, warn};

use crate::classifier::{IntentClassification, IntentClassifier};

const ASSIST_SYSTEM_PROMPT: &str = "You label chat messages sent to a reading assistant. \
Reply with exactly one label from: document_question, document_list, clarification, \
new_topic, general_chat.";

/// Confidence assigned to a label chosen by the model.
const ASSISTED_CONFIDENCE: f32 = 0.8;

struct Assist {
    provider: Arc<dyn ProviderAdapter>,
    model: String,
    threshold: f32,
    timeout: Duration,
}

/// Heuristic classification with optional model refinement.
pub struct IntentRouter {
    heuristic: IntentClassifier,
    assist: Option<Assist>,
}

impl IntentRouter {
    /// Heuristic only.
    pub fn heuristic() -> Self {
        Self {
            heuristic: IntentClassifier::new(),
            assist: None,
        }
    }

    /// Build from configuration. Assistance is enabled only when
    /// `intent.llm_assist` is set and a provider is supplied.
    pub fn from_config(
        config: &IntentConfig,
        provider: Option<Arc<dyn ProviderAdapter>>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let assist = match provider {
            Some(provider) if config.llm_assist => Some(Assist {
                provider,
                model: model.into(),
                threshold: config.llm_threshold,
                timeout,
            }),
            _ => None,
        };
        Self {
            heuristic: IntentClassifier::new(),
            assist,
        }
    }

    pub fn is_assisted(&self) -> bool {
        self.assist.is_some()
    }

    /// Classify `message`, asking the model when the heuristic is unsure.
    ///
    /// Never fails: any model error keeps the heuristic result.
    pub async fn classify(&self, message: &str, state: &ConversationState) -> IntentClassification {
        let heuristic = self.heuristic.classify(message, state);
        let Some(assist) = &self.assist else {
            return heuristic;
        };
        if heuristic.confidence >= assist.threshold {
            return heuristic;
        }

        match self.ask_model(assist, message, state).await {
            Ok(Some(label)) => {
                debug!(
                    heuristic = %heuristic.label,
                    refined = %label,
                    confidence = heuristic.confidence,
                    "intent refined by model"
                );
                metrics::counter!("lectern_intent_refinements_total", "outcome" => "refined")
                    .increment(1);
                IntentClassification {
                    label,
                    confidence: ASSISTED_CONFIDENCE,
                    reason: "model refinement",
                }
            }
            Ok(None) => {
                warn!(heuristic = %heuristic.label, "unparseable intent from model, keeping heuristic");
                metrics::counter!("lectern_intent_refinements_total", "outcome" => "unparsed")
                    .increment(1);
                heuristic
            }
            Err(err) => {
                warn!(error = %err, heuristic = %heuristic.label, "intent refinement failed, keeping heuristic");
                metrics::counter!("lectern_intent_refinements_total", "outcome" => "failed")
                    .increment(1);
                heuristic
            }
        }
    }

    async fn ask_model(
        &self,
        assist: &Assist,
        message: &str,
        state: &ConversationState,
    ) -> Result<Option<IntentLabel>, LecternError> {
        let previous = state
            .last_intent
            .map(|l| l.to_string())
            .unwrap_or_else(|| "none".to_string());
        let request = ProviderRequest {
            model: assist.model.clone(),
            system_prompt: Some(ASSIST_SYSTEM_PROMPT.to_string()),
            prompt: format!("Previous intent: {previous}\nMessage: {message}\nLabel:"),
            max_tokens: 10,
            temperature: 0.0,
        };
        let response = with_timeout(assist.timeout, assist.provider.complete(request)).await?;
        Ok(parse_label(&response.content))
    }
}

/// Extract the first recognizable label from a model reply.
pub(crate) fn parse_label(reply: &str) -> Option<IntentLabel> {
    reply
        .split(|c: char| !(c.is_ascii_alphabetic() || c == '_'))
        .filter(|w| !w.is_empty())
        .find_map(|w| IntentLabel::from_str(&w.to_ascii_lowercase()).ok())
}
