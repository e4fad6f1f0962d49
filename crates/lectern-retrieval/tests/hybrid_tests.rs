// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end retrieval over the in-memory store.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use lectern_config::model::RetrievalConfig;
use lectern_core::types::{
    AdapterType, DocumentChunk, EmbeddingInput, EmbeddingOutput, HealthStatus, VectorPoint,
};
use lectern_core::{
    CollectionId, CollectionKind, EmbeddingAdapter, LecternError, PluginAdapter, UserId,
    VectorStoreAdapter,
};
use lectern_retrieval::keyword::tokenize;
use lectern_retrieval::{
    EmbeddingCache, HandleCache, HybridRetriever, InMemoryVectorStore, VectorIndex,
};

const DIMS: usize = 32;

/// Bag-of-words hashing embedder: texts sharing terms point the same way.
struct WordHashEmbedder {
    calls: AtomicUsize,
}

fn embed_text(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIMS];
    for token in tokenize(text) {
        let bucket = token.bytes().fold(7usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize));
        v[bucket % DIMS] += 1.0;
    }
    v
}

#[async_trait]
impl PluginAdapter for WordHashEmbedder {
    fn name(&self) -> &str {
        "word-hash"
    }
    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }
    async fn health_check(&self) -> Result<HealthStatus, LecternError> {
        Ok(HealthStatus::Healthy)
    }
}

#[async_trait]
impl EmbeddingAdapter for WordHashEmbedder {
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, LecternError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(EmbeddingOutput {
            embeddings: input.texts.iter().map(|t| embed_text(t)).collect(),
            dimensions: DIMS,
        })
    }
}

fn chunk(user: &str, book: &str, page: &str, text: &str) -> DocumentChunk {
    DocumentChunk {
        book_id: book.into(),
        page_key: page.into(),
        text: text.into(),
        source_collection: format!("{user}_documents"),
        page_order: 0,
    }
}

async fn seed(store: &InMemoryVectorStore, user: &str, chunks: &[DocumentChunk]) {
    let collection = CollectionId::new(&UserId::new(user), CollectionKind::Documents).unwrap();
    let points = chunks
        .iter()
        .map(|c| VectorPoint {
            id: c.point_id(),
            vector: embed_text(&c.text),
            payload: serde_json::to_value(c).unwrap(),
        })
        .collect();
    store.upsert(&collection, points).await.unwrap();
}

fn retriever(store: Arc<InMemoryVectorStore>) -> (HybridRetriever, Arc<WordHashEmbedder>) {
    let embedder = Arc::new(WordHashEmbedder {
        calls: AtomicUsize::new(0),
    });
    let config = RetrievalConfig {
        score_threshold: 0.1,
        ..RetrievalConfig::default()
    };
    let retriever = HybridRetriever::new(
        Arc::new(VectorIndex::new(store, Duration::from_secs(1))),
        Arc::new(EmbeddingCache::new(embedder.clone(), 64, Duration::from_secs(1))),
        Arc::new(HandleCache::new(Duration::from_secs(600))),
        config,
        "word-hash",
    );
    (retriever, embedder)
}

#[tokio::test]
async fn retrieves_only_from_own_collection() {
    let store = Arc::new(InMemoryVectorStore::new());
    seed(
        &store,
        "u1",
        &[
            chunk("u1", "b1", "p1", "Chapter one introduces the harbour town."),
            chunk("u1", "b1", "p2", "Chapter two explains the lighthouse keeper's duties."),
            chunk("u1", "b1", "p3", "Chapter three describes the storm."),
        ],
    )
    .await;
    seed(
        &store,
        "u2",
        &[chunk("u2", "secret", "p1", "Chapter two of a private diary.")],
    )
    .await;

    let (retriever, _) = retriever(Arc::clone(&store));
    let results = retriever
        .retrieve(&UserId::new("u1"), "explain chapter two")
        .await
        .unwrap();

    assert!(!results.is_empty());
    assert!(results.iter().all(|c| c.chunk.source_collection == "u1_documents"));
    assert!(results.iter().all(|c| c.chunk.book_id == "b1"));
    assert_eq!(results[0].chunk.page_key, "p2");
}

#[tokio::test]
async fn empty_collection_returns_nothing_without_embedding() {
    let store = Arc::new(InMemoryVectorStore::new());
    let (retriever, embedder) = retriever(store);
    let results = retriever
        .retrieve(&UserId::new("nobody"), "anything at all")
        .await
        .unwrap();
    assert!(results.is_empty());
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn invalidation_picks_up_new_uploads() {
    let store = Arc::new(InMemoryVectorStore::new());
    let user = UserId::new("u1");
    let (retriever, _) = retriever(Arc::clone(&store));

    seed(&store, "u1", &[chunk("u1", "b1", "p1", "whales and oceans")]).await;
    let first = retriever.retrieve(&user, "volcano eruption").await.unwrap();
    assert!(first.iter().all(|c| !c.chunk.text.contains("volcano")));

    seed(&store, "u1", &[chunk("u1", "b2", "p1", "the volcano eruption buried the city")]).await;
    retriever.invalidate_user(&user);
    let second = retriever.retrieve(&user, "volcano eruption").await.unwrap();
    assert_eq!(second[0].chunk.book_id, "b2");
}
