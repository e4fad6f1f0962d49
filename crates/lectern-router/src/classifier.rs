// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Heuristic intent classification.
//!
//! Labels user messages as document questions, library listings,
//! clarifications, topic changes or general chat using zero-cost rules.
//! No LLM pre-call, no network, no latency.

use std::sync::LazyLock;

use lectern_core::types::{ContextFlag, ContextPhase, ConversationState, IntentLabel};
use regex::Regex;

/// Result of classifying a message.
#[derive(Debug, Clone, PartialEq)]
pub struct IntentClassification {
    pub label: IntentLabel,
    /// Confidence in the label (0.0-1.0).
    pub confidence: f32,
    /// Human-readable reason for the label.
    pub reason: &'static str,
}

impl IntentClassification {
    fn new(label: IntentLabel, confidence: f32, reason: &'static str) -> Self {
        Self {
            label,
            confidence,
            reason,
        }
    }
}

/// Explicit changes of subject (contains, case-insensitive).
const NEW_TOPIC_PHRASES: &[&str] = &[
    "new topic",
    "different topic",
    "something different",
    "change subject",
    "change the subject",
    "let's talk about",
    "lets talk about",
    "by the way",
    "speaking of",
    "on another note",
    "meanwhile",
];

/// Questions about the library itself (contains, case-insensitive).
const LIBRARY_PHRASES: &[&str] = &[
    "what books",
    "which books",
    "my books",
    "my library",
    "what documents",
    "which documents",
    "my documents",
    "what files",
    "which files",
    "did i upload",
    "have i uploaded",
    "books do i have",
    "documents do i have",
    "list my",
    "list the books",
    "list all",
];

/// Vocabulary that points at the uploaded material (whole words).
const DOCUMENT_TERMS: &[&str] = &[
    "book", "books", "chapter", "chapters", "page", "pages", "document", "section",
    "author", "text", "pdf", "passage", "quote", "summarize", "summary", "explain",
    "character", "characters", "plot", "theme", "themes", "mentioned", "uploaded",
    "excerpt", "paragraph", "argument", "conclusion", "introduction",
];

/// Openers that continue the previous exchange (prefix, case-insensitive).
const FOLLOW_UP_OPENERS: &[&str] = &[
    "what about",
    "how about",
    "and ",
    "also ",
    "why",
    "more",
    "tell me more",
    "go on",
    "continue",
    "elaborate",
    "what else",
    "same for",
    "and what",
];

/// Words that only make sense against a previous turn (whole words).
const BACK_REFERENCES: &[&str] = &["it", "that", "this", "those", "them", "there", "he", "she", "they"];

/// Small talk (exact match after trimming punctuation, case-insensitive).
const SMALL_TALK_EXACT: &[&str] = &[
    "hi", "hello", "hey", "thanks", "thank you", "bye", "ok", "okay", "yes", "no",
    "sure", "good", "great", "cool", "nice", "good morning", "good night",
];

/// General-chat patterns (contains, case-insensitive).
const GENERAL_PATTERNS: &[&str] = &[
    "how are you",
    "who are you",
    "what's your name",
    "tell me a joke",
    "weather",
    "what time",
    "what day",
];

const QUESTION_WORDS: &[&str] = &[
    "what", "who", "why", "how", "when", "where", "which", "does", "did", "is", "are", "can",
];

/// Messages at or below this many words can be follow-ups.
const FOLLOW_UP_MAX_WORDS: usize = 8;

static SECTION_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(chapter|ch\.|page|p\.|pp\.|section|part|book|volume)\s*(\d+|[ivxlc]+|one|two|three|four|five|six|seven|eight|nine|ten)\b")
        .expect("section reference pattern is valid")
});

/// Heuristic, state-aware intent classifier.
#[derive(Debug, Clone, Default)]
pub struct IntentClassifier;

impl IntentClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify `message` given the session's current state.
    pub fn classify(&self, message: &str, state: &ConversationState) -> IntentClassification {
        let trimmed = message.trim();
        if trimmed.is_empty() {
            return IntentClassification::new(IntentLabel::GeneralChat, 1.0, "empty message");
        }

        let lower = trimmed.to_lowercase();
        let words = Self::words(&lower);

        // Signal 1: explicit topic change wins over everything else.
        if NEW_TOPIC_PHRASES.iter().any(|p| lower.contains(p)) {
            return IntentClassification::new(IntentLabel::NewTopic, 0.9, "topic change phrase");
        }

        // Signal 2: questions about the library itself.
        if LIBRARY_PHRASES.iter().any(|p| lower.contains(p)) {
            return IntentClassification::new(
                IntentLabel::DocumentList,
                0.85,
                "library listing phrase",
            );
        }

        // Signal 3: short continuation of a document exchange.
        if Self::follows_document_exchange(state) && words.len() <= FOLLOW_UP_MAX_WORDS {
            let opener = FOLLOW_UP_OPENERS.iter().any(|o| lower.starts_with(o));
            let back_ref = words.iter().any(|w| BACK_REFERENCES.contains(w));
            if opener || back_ref {
                return IntentClassification::new(
                    IntentLabel::Clarification,
                    if opener { 0.85 } else { 0.7 },
                    "short follow-up to a document exchange",
                );
            }
        }

        let mut score: i32 = 0;

        // Signal 4: explicit chapter/page/section reference
        if SECTION_REF.is_match(&lower) {
            score += 3;
        }

        // Signal 5: document vocabulary
        let doc_terms = words.iter().filter(|w| DOCUMENT_TERMS.contains(*w)).count() as i32;
        score += doc_terms.min(3) * 2;

        // Signal 6: small talk
        let bare = lower.trim_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace());
        if SMALL_TALK_EXACT.contains(&bare) {
            score -= 4;
        }
        if GENERAL_PATTERNS.iter().any(|p| lower.contains(p)) {
            score -= 3;
        }

        // Signal 7: the conversation is already anchored on documents
        if state.phase == ContextPhase::Active && state.has_flag(ContextFlag::DocumentScoped) {
            score += 1;
        }

        // Signal 8: it is a question at all
        let is_question = trimmed.ends_with('?')
            || words.first().is_some_and(|w| QUESTION_WORDS.contains(w));
        if is_question {
            score += 1;
        }

        Self::score_to_label(score, is_question)
    }

    fn words(lower: &str) -> Vec<&str> {
        lower
            .split(|c: char| !(c.is_alphanumeric() || c == '\''))
            .filter(|w| !w.is_empty())
            .collect()
    }

    fn follows_document_exchange(state: &ConversationState) -> bool {
        state.phase == ContextPhase::Active
            && matches!(
                state.last_intent,
                Some(
                    IntentLabel::DocumentQuestion
                        | IntentLabel::DocumentList
                        | IntentLabel::Clarification
                )
            )
    }

    fn score_to_label(score: i32, is_question: bool) -> IntentClassification {
        if score >= 2 {
            let confidence = (0.5 + score as f32 * 0.08).min(0.95);
            IntentClassification::new(
                IntentLabel::DocumentQuestion,
                confidence,
                "document question indicators",
            )
        } else if score <= -2 {
            let confidence = (0.5 + (-score) as f32 * 0.08).min(0.95);
            IntentClassification::new(IntentLabel::GeneralChat, confidence, "small talk indicators")
        } else if is_question {
            IntentClassification::new(
                IntentLabel::DocumentQuestion,
                0.45,
                "ambiguous question, assuming documents",
            )
        } else {
            IntentClassification::new(IntentLabel::GeneralChat, 0.4, "no strong signals")
        }
    }
}
