// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Okapi BM25 keyword index over a sample of a documents collection.
//!
//! The index is built once from a payload scroll and never updated in place;
//! uploads invalidate it and the next retrieval rebuilds it. Collections larger
//! than the sample cap are sampled uniformly with a seed derived from the
//! collection name, so rebuilding an unchanged collection yields the same index.

use std::collections::HashMap;

use lectern_core::types::StoredPayload;
use rand::SeedableRng;
use rand::rngs::StdRng;
use sha2::{Digest, Sha256};

pub const BM25_K1: f32 = 1.2;
pub const BM25_B: f32 = 0.75;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "did", "do", "does", "for", "from",
    "had", "has", "have", "he", "her", "his", "how", "i", "if", "in", "into", "is", "it", "its",
    "me", "my", "no", "not", "of", "on", "or", "our", "she", "so", "that", "the", "their",
    "them", "there", "these", "they", "this", "to", "was", "we", "were", "what", "when",
    "where", "which", "who", "why", "will", "with", "you", "your",
];

/// Lowercase Unicode word tokens with stop words removed.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .filter(|w| !STOP_WORDS.contains(&w.as_str()))
        .collect()
}

/// Reproducible sampling seed for a collection name.
pub fn sample_seed(collection: &str) -> u64 {
    let digest = Sha256::digest(collection.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

#[derive(Debug, Clone, Copy)]
struct Posting {
    doc: usize,
    tf: u32,
}

/// A keyword search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordHit {
    pub id: String,
    pub payload: serde_json::Value,
    pub score: f32,
}

/// Immutable BM25 index over a set of payloads.
#[derive(Debug, Default)]
pub struct KeywordIndex {
    docs: Vec<StoredPayload>,
    postings: HashMap<String, Vec<Posting>>,
    doc_lengths: Vec<u32>,
    total_length: u64,
}

impl KeywordIndex {
    /// Index `payloads`, first sampling down to `sample_size` if needed.
    ///
    /// The indexed text is the payload's `text` field; payloads without one
    /// are indexed as empty documents.
    pub fn build(payloads: Vec<StoredPayload>, sample_size: usize, seed: u64) -> Self {
        let docs = sample(payloads, sample_size, seed);
        let mut index = KeywordIndex {
            postings: HashMap::new(),
            doc_lengths: Vec::with_capacity(docs.len()),
            total_length: 0,
            docs: Vec::new(),
        };

        for (doc, payload) in docs.iter().enumerate() {
            let text = payload
                .payload
                .get("text")
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            let tokens = tokenize(text);
            index.doc_lengths.push(tokens.len() as u32);
            index.total_length += tokens.len() as u64;

            let mut tf: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *tf.entry(token).or_insert(0) += 1;
            }
            for (term, tf) in tf {
                index.postings.entry(term).or_default().push(Posting { doc, tf });
            }
        }
        index.docs = docs;
        index
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Top `k` documents by BM25 score, descending. Only documents sharing at
    /// least one query term are returned.
    pub fn search(&self, query: &str, k: usize) -> Vec<KeywordHit> {
        let terms = tokenize(query);
        if terms.is_empty() || self.docs.is_empty() || k == 0 {
            return Vec::new();
        }

        let n = self.docs.len() as f32;
        let avgdl = (self.total_length as f32 / n).max(1.0);
        let mut scores: HashMap<usize, f32> = HashMap::new();

        let mut seen_terms: Vec<&str> = Vec::new();
        for term in &terms {
            if seen_terms.contains(&term.as_str()) {
                continue;
            }
            seen_terms.push(term);
            let Some(postings) = self.postings.get(term) else {
                continue;
            };
            let df = postings.len() as f32;
            let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
            for posting in postings {
                let dl = self.doc_lengths[posting.doc] as f32;
                let tf = posting.tf as f32;
                let norm = tf * (BM25_K1 + 1.0) / (tf + BM25_K1 * (1.0 - BM25_B + BM25_B * dl / avgdl));
                *scores.entry(posting.doc).or_insert(0.0) += idf * norm;
            }
        }

        let mut ranked: Vec<(usize, f32)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| {
            b.1.total_cmp(&a.1)
                .then_with(|| self.docs[a.0].id.cmp(&self.docs[b.0].id))
        });
        ranked.truncate(k);
        ranked
            .into_iter()
            .map(|(doc, score)| KeywordHit {
                id: self.docs[doc].id.clone(),
                payload: self.docs[doc].payload.clone(),
                score,
            })
            .collect()
    }
}

fn sample(mut payloads: Vec<StoredPayload>, sample_size: usize, seed: u64) -> Vec<StoredPayload> {
    if payloads.len() <= sample_size {
        return payloads;
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let mut picked = rand::seq::index::sample(&mut rng, payloads.len(), sample_size).into_vec();
    picked.sort_unstable();

    // Walk the sorted indices back-to-front so swap_remove never disturbs a
    // still-pending index.
    let mut kept: Vec<StoredPayload> = picked
        .iter()
        .rev()
        .map(|&i| payloads.swap_remove(i))
        .collect();
    kept.reverse();
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, text: &str) -> StoredPayload {
        StoredPayload {
            id: id.into(),
            payload: json!({ "text": text }),
        }
    }

    #[test]
    fn tokenizer_lowercases_and_drops_stop_words() {
        assert_eq!(
            tokenize("The Whale, and the SEA!"),
            vec!["whale".to_string(), "sea".to_string()]
        );
        assert!(tokenize("the and of").is_empty());
        assert_eq!(tokenize("naïve café"), vec!["naïve", "café"]);
    }

    #[test]
    fn ranks_by_term_relevance() {
        let index = KeywordIndex::build(
            vec![
                doc("a", "whales swim in the ocean"),
                doc("b", "the ocean ocean is deep and the ocean is blue"),
                doc("c", "mountains are tall"),
            ],
            100,
            1,
        );
        let hits = index.search("ocean", 10);
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn empty_index_and_empty_query_return_nothing() {
        let index = KeywordIndex::build(Vec::new(), 10, 0);
        assert!(index.is_empty());
        assert!(index.search("anything", 5).is_empty());

        let index = KeywordIndex::build(vec![doc("a", "text")], 10, 0);
        assert!(index.search("the of", 5).is_empty());
    }

    #[test]
    fn sampling_is_reproducible_and_bounded() {
        let payloads: Vec<StoredPayload> = (0..50)
            .map(|i| doc(&format!("d{i:02}"), &format!("word{i}")))
            .collect();
        let seed = sample_seed("u1_documents");
        let a = KeywordIndex::build(payloads.clone(), 10, seed);
        let b = KeywordIndex::build(payloads, 10, seed);
        assert_eq!(a.len(), 10);
        let ids_a: Vec<&str> = a.docs.iter().map(|d| d.id.as_str()).collect();
        let ids_b: Vec<&str> = b.docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids_a, ids_b);
        let mut sorted = ids_a.clone();
        sorted.sort();
        assert_eq!(ids_a, sorted, "sample keeps original order");
    }

    #[test]
    fn seed_differs_per_collection() {
        assert_ne!(sample_seed("u1_documents"), sample_seed("u2_documents"));
    }
}
