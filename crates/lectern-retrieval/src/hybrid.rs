// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hybrid retriever combining vector similarity and BM25 via weighted
//! min-max fusion.
//!
//! Each side's scores are normalized to `[0, 1]` independently per query, then
//! combined as `vector_weight * v + keyword_weight * k`; a candidate found by
//! only one side gets 0 from the other. Ties are broken by vector rank, then
//! keyword rank, then id.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use lectern_config::model::RetrievalConfig;
use lectern_core::types::{DocumentChunk, RetrievalCandidate, ScoredPoint};
use lectern_core::{CollectionId, CollectionKind, LecternError, UserId};
use tracing::{debug, info, warn};

use crate::embedding_cache::EmbeddingCache;
use crate::handle_cache::{HandleCache, RetrieverHandle};
use crate::keyword::{KeywordHit, KeywordIndex, sample_seed};
use crate::vector_index::{SearchParams, VectorIndex};

/// Candidates whose text agrees on this many leading characters are duplicates.
pub const DEDUPE_PREFIX_CHARS: usize = 200;

/// Hybrid retriever over a user's documents collection.
pub struct HybridRetriever {
    index: Arc<VectorIndex>,
    embeddings: Arc<EmbeddingCache>,
    handles: Arc<HandleCache>,
    config: RetrievalConfig,
    embedding_model: String,
}

impl HybridRetriever {
    pub fn new(
        index: Arc<VectorIndex>,
        embeddings: Arc<EmbeddingCache>,
        handles: Arc<HandleCache>,
        config: RetrievalConfig,
        embedding_model: impl Into<String>,
    ) -> Self {
        Self {
            index,
            embeddings,
            handles,
            config,
            embedding_model: embedding_model.into(),
        }
    }

    /// Ranked document candidates for `query` from `user_id`'s documents.
    pub async fn retrieve(
        &self,
        user_id: &UserId,
        query: &str,
    ) -> Result<Vec<RetrievalCandidate>, LecternError> {
        let started = Instant::now();
        let collection = CollectionId::new(user_id, CollectionKind::Documents)?;
        let handle = self
            .handles
            .get_or_build(&collection, || self.build_handle(user_id, &collection))
            .await?;

        if handle.collection_size == 0 {
            debug!(collection = %collection, "no documents uploaded");
            return Ok(Vec::new());
        }

        let embedding = self
            .embeddings
            .get_or_compute(query, &self.embedding_model)
            .await?;
        let params = SearchParams::for_query(query, handle.collection_size, &self.config);

        let (vector, keyword) = tokio::join!(
            self.index.query(
                user_id,
                &collection,
                &embedding,
                params.k,
                params.score_threshold,
            ),
            async {
                handle
                    .keyword
                    .as_ref()
                    .map(|index| index.search(query, params.k))
                    .unwrap_or_default()
            },
        );

        let vector = match vector {
            Ok(hits) => hits,
            Err(err) if err.is_fatal() || keyword.is_empty() => return Err(err),
            Err(err) => {
                warn!(collection = %collection, error = %err, "vector search failed, using keyword hits only");
                metrics::counter!("lectern_degraded_total", "branch" => "vector_search").increment(1);
                Vec::new()
            }
        };

        let fused = fuse(
            &vector,
            &keyword,
            self.config.vector_weight,
            self.config.keyword_weight,
        );
        let mut candidates = dedupe_by_prefix(fused, DEDUPE_PREFIX_CHARS);
        candidates.truncate(self.config.top_n);
        for candidate in &mut candidates {
            if candidate.chunk.source_collection.is_empty() {
                candidate.chunk.source_collection = collection.to_string();
            }
        }

        info!(
            collection = %collection,
            k = params.k,
            score_threshold = params.score_threshold,
            vector_hits = vector.len(),
            keyword_hits = keyword.len(),
            returned = candidates.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "hybrid retrieval complete"
        );
        Ok(candidates)
    }

    /// Drop cached handles for every collection owned by `user_id`.
    pub fn invalidate_user(&self, user_id: &UserId) {
        self.handles.invalidate_user(user_id);
    }

    pub fn invalidate(&self, collection: &CollectionId) {
        self.handles.invalidate(collection);
    }

    async fn build_handle(
        &self,
        user_id: &UserId,
        collection: &CollectionId,
    ) -> Result<RetrieverHandle, LecternError> {
        let collection_size = self.index.count(user_id, collection).await?;

        let keyword = if collection_size == 0 {
            Some(KeywordIndex::default())
        } else {
            match self.index.scroll(user_id, collection, collection_size).await {
                Ok(payloads) => Some(KeywordIndex::build(
                    payloads,
                    self.config.keyword_sample_size,
                    sample_seed(collection.as_str()),
                )),
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!(collection = %collection, error = %err, "keyword index build failed, retrieval will be vector-only");
                    metrics::counter!("lectern_degraded_total", "branch" => "keyword_build").increment(1);
                    None
                }
            }
        };

        debug!(
            collection = %collection,
            collection_size,
            keyword_docs = keyword.as_ref().map_or(0, KeywordIndex::len),
            "retriever handle built"
        );
        Ok(RetrieverHandle {
            collection: collection.clone(),
            keyword,
            collection_size,
            built_at: tokio::time::Instant::now(),
        })
    }
}

/// Min-max normalize `scores` to `[0, 1]`. A set whose scores are all equal
/// maps to 1.0.
pub fn normalize(scores: &[f32]) -> Vec<f32> {
    let Some(min) = scores.iter().copied().reduce(f32::min) else {
        return Vec::new();
    };
    let max = scores.iter().copied().fold(min, f32::max);
    let range = max - min;
    scores
        .iter()
        .map(|s| if range < f32::EPSILON { 1.0 } else { (s - min) / range })
        .collect()
}

/// Merge the two ranked lists into weighted, ordered candidates.
///
/// Hits whose payload does not describe a document chunk are skipped.
pub fn fuse(
    vector: &[ScoredPoint],
    keyword: &[KeywordHit],
    vector_weight: f32,
    keyword_weight: f32,
) -> Vec<RetrievalCandidate> {
    let vector_norm = normalize(&vector.iter().map(|h| h.score).collect::<Vec<_>>());
    let keyword_norm = normalize(&keyword.iter().map(|h| h.score).collect::<Vec<_>>());

    let mut merged: HashMap<String, RetrievalCandidate> = HashMap::new();

    for (rank, (hit, score)) in vector.iter().zip(vector_norm).enumerate() {
        let Some(chunk) = parse_chunk(&hit.id, &hit.payload) else {
            continue;
        };
        merged
            .entry(hit.id.clone())
            .or_insert_with(|| empty_candidate(&hit.id, chunk))
            .set_vector(rank, score);
    }

    for (rank, (hit, score)) in keyword.iter().zip(keyword_norm).enumerate() {
        if !merged.contains_key(&hit.id) {
            let Some(chunk) = parse_chunk(&hit.id, &hit.payload) else {
                continue;
            };
            merged.insert(hit.id.clone(), empty_candidate(&hit.id, chunk));
        }
        if let Some(entry) = merged.get_mut(&hit.id) {
            entry.set_keyword(rank, score);
        }
    }

    let mut candidates: Vec<RetrievalCandidate> = merged
        .into_values()
        .map(|mut c| {
            c.combined_score = vector_weight * c.vector_score + keyword_weight * c.keyword_score;
            c
        })
        .collect();
    candidates.sort_by(compare_candidates);
    candidates
}

/// Drop candidates whose first `prefix_chars` characters repeat an earlier,
/// higher-ranked candidate.
pub fn dedupe_by_prefix(
    candidates: Vec<RetrievalCandidate>,
    prefix_chars: usize,
) -> Vec<RetrievalCandidate> {
    let mut seen: HashSet<String> = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| seen.insert(c.chunk.text.chars().take(prefix_chars).collect()))
        .collect()
}

fn compare_candidates(a: &RetrievalCandidate, b: &RetrievalCandidate) -> Ordering {
    fn rank(r: Option<usize>) -> usize {
        r.unwrap_or(usize::MAX)
    }
    b.combined_score
        .total_cmp(&a.combined_score)
        .then_with(|| rank(a.vector_rank).cmp(&rank(b.vector_rank)))
        .then_with(|| rank(a.keyword_rank).cmp(&rank(b.keyword_rank)))
        .then_with(|| a.id.cmp(&b.id))
}

fn parse_chunk(id: &str, payload: &serde_json::Value) -> Option<DocumentChunk> {
    match serde_json::from_value(payload.clone()) {
        Ok(chunk) => Some(chunk),
        Err(err) => {
            warn!(point_id = id, error = %err, "skipping point without a document payload");
            None
        }
    }
}

fn empty_candidate(id: &str, chunk: DocumentChunk) -> RetrievalCandidate {
    RetrievalCandidate {
        id: id.to_string(),
        chunk,
        vector_score: 0.0,
        keyword_score: 0.0,
        combined_score: 0.0,
        vector_rank: None,
        keyword_rank: None,
    }
}

trait CandidateExt {
    fn set_vector(&mut self, rank: usize, score: f32);
    fn set_keyword(&mut self, rank: usize, score: f32);
}

impl CandidateExt for RetrievalCandidate {
    fn set_vector(&mut self, rank: usize, score: f32) {
        if self.vector_rank.is_none() {
            self.vector_rank = Some(rank);
            self.vector_score = score;
        }
    }

    fn set_keyword(&mut self, rank: usize, score: f32) {
        if self.keyword_rank.is_none() {
            self.keyword_rank = Some(rank);
            self.keyword_score = score;
        }
    }
}
