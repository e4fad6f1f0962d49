// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `lectern ingest`: split a plain-text file into document chunks and upload them.
//!
//! Form feeds (as emitted by `pdftotext`) always start a new chunk. Within a
//! page, paragraphs are packed greedily up to the chunk size; a paragraph
//! longer than the chunk size is split at whitespace.

use std::path::Path;

use lectern_agent::LecternEngine;
use lectern_core::types::DocumentChunk;
use lectern_core::{LecternError, UserId};
use tracing::info;

/// Default maximum chunk length in characters.
pub const DEFAULT_CHUNK_CHARS: usize = 1200;

/// Read `path`, chunk it as book `book_id` and upload it for `user_id`.
///
/// Returns the number of chunks stored.
pub async fn ingest_file(
    engine: &LecternEngine,
    user_id: &UserId,
    book_id: &str,
    path: &Path,
    max_chars: usize,
) -> Result<usize, LecternError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| LecternError::InvalidInput(format!("cannot read {}: {e}", path.display())))?;
    let chunks = chunk_book(book_id, &text, max_chars);
    if chunks.is_empty() {
        return Err(LecternError::InvalidInput(format!(
            "{} contains no text",
            path.display()
        )));
    }
    let stored = engine.upload_document_chunks(user_id, chunks).await?;
    info!(user_id = %user_id, book_id, path = %path.display(), chunks = stored, "file ingested");
    Ok(stored)
}

/// Book id derived from a file name: its stem, or `"book"` when there is none.
pub fn book_id_for(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("book")
        .to_string()
}

/// Chunk `text` into document chunks keyed `p1`, `p2`, ... in reading order.
///
/// `source_collection` is left empty; the engine stamps it on upload.
pub fn chunk_book(book_id: &str, text: &str, max_chars: usize) -> Vec<DocumentChunk> {
    chunk_text(text, max_chars)
        .into_iter()
        .enumerate()
        .map(|(i, text)| DocumentChunk {
            book_id: book_id.to_string(),
            page_key: format!("p{}", i + 1),
            text,
            source_collection: String::new(),
            page_order: (i + 1) as u32,
        })
        .collect()
}

/// Split `text` into trimmed chunks of at most `max_chars` characters.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();

    for page in text.split('\u{c}') {
        let mut current = String::new();
        for paragraph in page.split("\n\n") {
            let paragraph = paragraph.split_whitespace().collect::<Vec<_>>().join(" ");
            if paragraph.is_empty() {
                continue;
            }
            let joined_len = current.chars().count() + 2 + paragraph.chars().count();
            if !current.is_empty() && joined_len > max_chars {
                chunks.push(std::mem::take(&mut current));
            }
            if paragraph.chars().count() > max_chars {
                if !current.is_empty() {
                    chunks.push(std::mem::take(&mut current));
                }
                chunks.extend(split_long(&paragraph, max_chars));
                continue;
            }
            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(&paragraph);
        }
        if !current.is_empty() {
            chunks.push(current);
        }
    }
    chunks
}

/// Split one whitespace-normalized paragraph at word boundaries.
fn split_long(paragraph: &str, max_chars: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    for word in paragraph.split(' ') {
        let word_len = word.chars().count();
        if current_len > 0 && current_len + 1 + word_len > max_chars {
            pieces.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if word_len > max_chars {
            // Single word longer than a chunk; cut it by characters.
            let chars: Vec<char> = word.chars().collect();
            for piece in chars.chunks(max_chars) {
                pieces.push(piece.iter().collect());
            }
            continue;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_paragraphs_up_to_the_limit() {
        let text = "First paragraph.\n\nSecond paragraph.\n\nThird one is here.";
        let chunks = chunk_text(text, 40);
        assert_eq!(
            chunks,
            vec!["First paragraph.\n\nSecond paragraph.", "Third one is here."]
        );
    }

    #[test]
    fn form_feed_starts_a_new_chunk() {
        let chunks = chunk_text("page one\u{c}page two", 1000);
        assert_eq!(chunks, vec!["page one", "page two"]);
    }

    #[test]
    fn long_paragraphs_split_at_words() {
        let text = "alpha beta gamma delta epsilon";
        let chunks = chunk_text(text, 11);
        assert_eq!(chunks, vec!["alpha beta", "gamma delta", "epsilon"]);
        assert!(chunks.iter().all(|c| c.chars().count() <= 11));
    }

    #[test]
    fn oversized_words_are_cut() {
        let chunks = chunk_text("abcdefghij", 4);
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn blank_input_has_no_chunks() {
        assert!(chunk_text("  \n\n \u{c}\n", 100).is_empty());
    }

    #[test]
    fn chunks_are_keyed_in_reading_order() {
        let chunks = chunk_book("b1", "one\u{c}two\u{c}three", 100);
        let keys: Vec<_> = chunks.iter().map(|c| (c.page_key.as_str(), c.page_order)).collect();
        assert_eq!(keys, vec![("p1", 1), ("p2", 2), ("p3", 3)]);
        assert!(chunks.iter().all(|c| c.book_id == "b1" && c.source_collection.is_empty()));
    }

    #[tokio::test]
    async fn ingest_file_uploads_every_chunk() {
        let harness = lectern_test_utils::TestHarness::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("harbour.txt");
        std::fs::write(&path, "The pier.\u{c}The storm.\u{c}The rebuild.").unwrap();

        let user = UserId::new("u1");
        let stored = ingest_file(&harness.engine, &user, "harbour", &path, 100)
            .await
            .unwrap();
        assert_eq!(stored, 3);
        let books = harness.engine.list_library(&user).await.unwrap();
        assert_eq!(books[0].book_id, "harbour");
        assert_eq!(books[0].preview, "The pier.");
    }

    #[tokio::test]
    async fn missing_or_empty_files_are_invalid_input() {
        let harness = lectern_test_utils::TestHarness::new();
        let dir = tempfile::tempdir().unwrap();
        let user = UserId::new("u1");

        let missing = dir.path().join("missing.txt");
        let err = ingest_file(&harness.engine, &user, "b", &missing, 100)
            .await
            .unwrap_err();
        assert!(matches!(err, LecternError::InvalidInput(_)));

        let empty = dir.path().join("empty.txt");
        std::fs::write(&empty, "\n\n").unwrap();
        let err = ingest_file(&harness.engine, &user, "b", &empty, 100)
            .await
            .unwrap_err();
        assert!(matches!(err, LecternError::InvalidInput(_)));
    }

    #[test]
    fn book_id_comes_from_the_file_stem() {
        assert_eq!(book_id_for(Path::new("/tmp/moby-dick.txt")), "moby-dick");
        assert_eq!(book_id_for(Path::new("/")), "book");
    }
}
