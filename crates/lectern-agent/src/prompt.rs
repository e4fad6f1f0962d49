// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Answer prompt assembly.
//!
//! One prompt per turn: system instructions chosen by intent, then the
//! library listing (if any), the previous exchange for follow-ups, numbered
//! document evidence cited as `book_id/page_key`, recalled memory as Q/A
//! lines, and finally the user's message.

use std::fmt::Write as _;

use lectern_core::types::{ConversationTurn, IntentLabel, RetrievalCandidate, Role};

use crate::language::{Language, response_instruction};
use crate::library::BookSummary;

const BASE_INSTRUCTIONS: &str = "You are Lectern, a reading assistant that answers questions \
about the user's own uploaded books and documents. Cite evidence as [n] using the numbers \
given. If the evidence does not contain the answer, say so plainly instead of guessing.";

/// Everything the generator needs to answer one message.
#[derive(Debug, Clone, Copy)]
pub struct PromptInputs<'a> {
    pub message: &'a str,
    pub intent: IntentLabel,
    pub documents: &'a [RetrievalCandidate],
    pub memory: &'a [ConversationTurn],
    /// The exchange a clarification refers to, oldest turn first.
    pub follow_up: &'a [ConversationTurn],
    pub library: Option<&'a [BookSummary]>,
}

impl<'a> PromptInputs<'a> {
    pub fn new(
        message: &'a str,
        intent: IntentLabel,
        documents: &'a [RetrievalCandidate],
        memory: &'a [ConversationTurn],
    ) -> Self {
        Self {
            message,
            intent,
            documents,
            memory,
            follow_up: &[],
            library: None,
        }
    }

    pub fn with_follow_up(mut self, follow_up: &'a [ConversationTurn]) -> Self {
        self.follow_up = follow_up;
        self
    }

    pub fn with_library(mut self, library: &'a [BookSummary]) -> Self {
        self.library = Some(library);
        self
    }
}

/// System instructions for `intent`, answering in `language` when it is known.
pub fn system_prompt(intent: IntentLabel, language: Language) -> String {
    let focus = match intent {
        IntentLabel::DocumentQuestion => {
            "Answer from the numbered evidence. Quote sparingly and name the book and page."
        }
        IntentLabel::DocumentList => {
            "The user is asking about their library. Describe the books listed below; \
             do not invent titles that are not listed."
        }
        IntentLabel::Clarification => {
            "The user is following up on the earlier exchange shown below. Resolve \
             references such as \"it\" or \"that chapter\" against it."
        }
        IntentLabel::NewTopic => {
            "The user has changed the subject. Do not carry assumptions over from \
             earlier in the conversation."
        }
        IntentLabel::GeneralChat => {
            "This is general conversation. Answer briefly; use the evidence only if it \
             is clearly relevant."
        }
    };
    match response_instruction(language) {
        Some(language_line) => format!("{BASE_INSTRUCTIONS}\n\n{focus}\n\n{language_line}"),
        None => format!("{BASE_INSTRUCTIONS}\n\n{focus}"),
    }
}

/// The user-side prompt body.
pub fn build_prompt(inputs: &PromptInputs<'_>) -> String {
    let mut out = String::new();

    if let Some(library) = inputs.library {
        out.push_str("## Library\n");
        if library.is_empty() {
            out.push_str("The user has not uploaded any documents yet.\n");
        }
        for book in library {
            let _ = writeln!(
                out,
                "- {} ({} chunks): {}",
                book.book_id,
                book.chunk_count,
                one_line(&book.preview)
            );
        }
        out.push('\n');
    }

    if !inputs.follow_up.is_empty() {
        out.push_str("## Previous exchange\n");
        for turn in inputs.follow_up {
            let _ = writeln!(out, "{}: {}", speaker(turn.role), turn.text.trim());
        }
        out.push('\n');
    }

    out.push_str("## Evidence\n");
    if inputs.documents.is_empty() {
        out.push_str("No matching passages were found in the user's documents.\n");
    }
    for (i, candidate) in inputs.documents.iter().enumerate() {
        let _ = writeln!(
            out,
            "[{}] {}/{}\n{}",
            i + 1,
            candidate.chunk.book_id,
            candidate.chunk.page_key,
            candidate.chunk.text.trim()
        );
    }
    out.push('\n');

    if !inputs.memory.is_empty() {
        out.push_str("## Earlier in the conversation\n");
        for turn in inputs.memory {
            let tag = match turn.role {
                Role::User => "Q",
                Role::Assistant => "A",
            };
            let _ = writeln!(out, "{tag}: {}", one_line(&turn.text));
        }
        out.push('\n');
    }

    let _ = write!(out, "## Question\n{}", inputs.message.trim());
    out
}

fn speaker(role: Role) -> &'static str {
    match role {
        Role::User => "User",
        Role::Assistant => "Assistant",
    }
}

fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_core::UserId;
    use lectern_core::types::DocumentChunk;

    fn candidate(book: &str, page: &str, text: &str) -> RetrievalCandidate {
        RetrievalCandidate {
            id: format!("{book}-{page}"),
            chunk: DocumentChunk {
                book_id: book.into(),
                page_key: page.into(),
                text: text.into(),
                source_collection: "u1_documents".into(),
                page_order: 0,
            },
            vector_score: 1.0,
            keyword_score: 1.0,
            combined_score: 1.0,
            vector_rank: Some(0),
            keyword_rank: Some(0),
        }
    }

    #[test]
    fn evidence_is_numbered_with_citations() {
        let docs = [candidate("b1", "p2", "Chapter two."), candidate("b1", "p3", "More.")];
        let prompt = build_prompt(&PromptInputs::new(
            "explain chapter 2",
            IntentLabel::DocumentQuestion,
            &docs,
            &[],
        ));
        assert!(prompt.contains("[1] b1/p2\nChapter two."));
        assert!(prompt.contains("[2] b1/p3"));
        assert!(prompt.ends_with("## Question\nexplain chapter 2"));
        assert!(!prompt.contains("## Earlier"));
    }

    #[test]
    fn empty_evidence_is_stated() {
        let prompt = build_prompt(&PromptInputs::new("hi", IntentLabel::GeneralChat, &[], &[]));
        assert!(prompt.contains("No matching passages"));
    }

    #[test]
    fn memory_renders_as_question_and_answer() {
        let user = UserId::new("u1");
        let memory = [
            ConversationTurn::new(user.clone(), Role::User, "what is b1 about?"),
            ConversationTurn::new(user, Role::Assistant, "It is about\nlighthouses."),
        ];
        let prompt = build_prompt(&PromptInputs::new(
            "and chapter 3?",
            IntentLabel::Clarification,
            &[],
            &memory,
        ));
        assert!(prompt.contains("Q: what is b1 about?"));
        assert!(prompt.contains("A: It is about lighthouses."));
    }

    #[test]
    fn follow_up_and_library_sections() {
        let user = UserId::new("u1");
        let previous = [
            ConversationTurn::new(user.clone(), Role::User, "explain chapter 2"),
            ConversationTurn::new(user, Role::Assistant, "Chapter 2 covers storms."),
        ];
        let library = [BookSummary {
            book_id: "b1".into(),
            chunk_count: 3,
            preview: "Once upon a time".into(),
        }];
        let prompt = build_prompt(
            &PromptInputs::new("what about chapter 3?", IntentLabel::Clarification, &[], &[])
                .with_follow_up(&previous)
                .with_library(&library),
        );
        assert!(prompt.contains("User: explain chapter 2"));
        assert!(prompt.contains("Assistant: Chapter 2 covers storms."));
        assert!(prompt.contains("- b1 (3 chunks): Once upon a time"));
    }

    #[test]
    fn system_prompt_varies_by_intent() {
        assert_ne!(
            system_prompt(IntentLabel::DocumentList, Language::English),
            system_prompt(IntentLabel::GeneralChat, Language::English)
        );
        assert!(
            system_prompt(IntentLabel::Clarification, Language::Unknown)
                .starts_with(BASE_INSTRUCTIONS)
        );
    }

    #[test]
    fn system_prompt_pins_the_answer_language() {
        let korean = system_prompt(IntentLabel::DocumentQuestion, Language::Korean);
        assert!(korean.ends_with(&response_instruction(Language::Korean).unwrap()));
        let unknown = system_prompt(IntentLabel::DocumentQuestion, Language::Unknown);
        assert!(!unknown.contains("Respond only in"));
    }
}
