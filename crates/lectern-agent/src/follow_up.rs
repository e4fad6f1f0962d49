// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resolving which earlier exchange a clarification points at.
//!
//! "What did you mean in your second answer?" or "go back to my first
//! question" name an exchange by position inside the retained memory window.
//! Without such a reference, or when it points past the window, the most
//! recent exchange is used.

use std::sync::LazyLock;

use lectern_core::types::{ConversationTurn, Role};
use regex::Regex;
use tracing::debug;

/// Position of an exchange within the retained window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeRef {
    /// Zero-based from the oldest retained exchange.
    FromStart(usize),
    /// Zero-based from the newest exchange.
    FromEnd(usize),
}

static SECOND_TO_LAST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:second|one)[\s-]+(?:to|before)[\s-]+(?:the[\s-]+)?last\b")
        .expect("second-to-last pattern is valid")
});

static ORDINAL_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(first|second|third|fourth|fifth|sixth|seventh|eighth|ninth|tenth|\d{1,2}(?:st|nd|rd|th)|last|previous|latest)\s+(?:\w+\s+)?(?:question|answer|reply|response|thing|message|exchange)s?\b",
    )
    .expect("ordinal reference pattern is valid")
});

const ORDINALS: &[&str] = &[
    "first", "second", "third", "fourth", "fifth", "sixth", "seventh", "eighth", "ninth", "tenth",
];

/// Find an explicit exchange reference in `message`.
pub fn parse_reference(message: &str) -> Option<ExchangeRef> {
    if SECOND_TO_LAST.is_match(message) {
        return Some(ExchangeRef::FromEnd(1));
    }
    let caps = ORDINAL_REF.captures(message)?;
    let word = caps.get(1)?.as_str().to_lowercase();
    match word.as_str() {
        "last" | "previous" | "latest" => Some(ExchangeRef::FromEnd(0)),
        _ => {
            let position = match ORDINALS.iter().position(|o| *o == word) {
                Some(i) => i + 1,
                None => word.trim_end_matches(char::is_alphabetic).parse().ok()?,
            };
            position.checked_sub(1).map(ExchangeRef::FromStart)
        }
    }
}

/// Group `turns` (oldest first) into question/answer pairs.
fn exchanges(turns: &[ConversationTurn]) -> Vec<&[ConversationTurn]> {
    turns
        .windows(2)
        .enumerate()
        .filter(|(_, pair)| pair[0].role == Role::User && pair[1].role == Role::Assistant)
        .map(|(i, _)| &turns[i..i + 2])
        .collect()
}

/// Pick the exchange `reference` names from `turns`, oldest first.
///
/// Falls back to the newest exchange when there is no reference or it is out
/// of range, and to the trailing turns when no complete exchange exists.
pub fn select_exchange(
    turns: &[ConversationTurn],
    reference: Option<ExchangeRef>,
) -> Vec<ConversationTurn> {
    let pairs = exchanges(turns);
    let picked = reference.and_then(|r| {
        let index = match r {
            ExchangeRef::FromStart(i) => Some(i),
            ExchangeRef::FromEnd(j) => pairs.len().checked_sub(j + 1),
        };
        let found = index.and_then(|i| pairs.get(i));
        if found.is_none() {
            debug!(reference = ?r, exchanges = pairs.len(), "exchange reference out of range");
        }
        found.copied()
    });

    match picked.or_else(|| pairs.last().copied()) {
        Some(pair) => pair.to_vec(),
        None => {
            let skip = turns.len().saturating_sub(2);
            turns[skip..].to_vec()
        }
    }
}
