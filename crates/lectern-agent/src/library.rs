// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-book summaries of a user's uploaded documents.

use std::collections::BTreeMap;

use lectern_core::types::{DocumentChunk, StoredPayload};
use lectern_core::{CollectionId, CollectionKind, LecternError, UserId};
use lectern_retrieval::VectorIndex;
use tracing::{debug, warn};

/// Longest preview taken from a book's first chunk, in characters.
pub const PREVIEW_CHARS: usize = 500;

/// One uploaded book as shown in a library listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookSummary {
    pub book_id: String,
    pub chunk_count: usize,
    /// Leading text of the book's first chunk by page order.
    pub preview: String,
}

/// Summaries of every book in `user_id`'s documents collection.
pub async fn list_library(
    index: &VectorIndex,
    user_id: &UserId,
) -> Result<Vec<BookSummary>, LecternError> {
    let collection = CollectionId::new(user_id, CollectionKind::Documents)?;
    let count = index.count(user_id, &collection).await?;
    if count == 0 {
        return Ok(Vec::new());
    }
    let books = summarize(index.scroll(user_id, &collection, count).await?);
    debug!(collection = %collection, chunks = count, books = books.len(), "library listed");
    Ok(books)
}

/// Group scrolled document payloads into per-book summaries ordered by book id.
pub fn summarize(payloads: Vec<StoredPayload>) -> Vec<BookSummary> {
    let mut books: BTreeMap<String, Vec<DocumentChunk>> = BTreeMap::new();
    for StoredPayload { id, payload } in payloads {
        match serde_json::from_value::<DocumentChunk>(payload) {
            Ok(chunk) => books.entry(chunk.book_id.clone()).or_default().push(chunk),
            Err(err) => warn!(point_id = %id, error = %err, "skipping undecodable chunk"),
        }
    }

    books
        .into_iter()
        .map(|(book_id, mut chunks)| {
            chunks.sort_by(|a, b| {
                a.page_order
                    .cmp(&b.page_order)
                    .then_with(|| a.page_key.cmp(&b.page_key))
            });
            let preview = chunks
                .first()
                .map(|c| c.text.chars().take(PREVIEW_CHARS).collect())
                .unwrap_or_default();
            BookSummary {
                book_id,
                chunk_count: chunks.len(),
                preview,
            }
        })
        .collect()
}
