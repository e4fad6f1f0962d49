// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Qdrant vector store adapter.
//!
//! Talks to the Qdrant REST API. Collections are created on first upsert
//! with cosine distance and the dimension of the first vector written.
//! Reads against a missing collection (HTTP 404) return empty results.
//! Every other failure maps to [`LecternError::IndexUnavailable`].

pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashSet;
use lectern_config::model::VectorStoreConfig;
use lectern_core::types::{AdapterType, HealthStatus, ScoredPoint, StoredPayload, VectorPoint};
use lectern_core::{CollectionId, LecternError, PluginAdapter, VectorStoreAdapter};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use types::{
    CountRequest, CountResult, CreateCollection, DeletePoints, PointStruct, QdrantResponse,
    ScoredHit, ScrollRequest, ScrollResult, SearchRequest, UpsertPoints, VectorParams,
};

/// Vector store backed by a Qdrant instance.
pub struct QdrantVectorStore {
    client: reqwest::Client,
    base_url: String,
    /// Collections known to exist on the server.
    known: DashSet<String>,
}

impl QdrantVectorStore {
    /// Creates a store for `url`, sending `api_key` in the `api-key` header.
    pub fn new(url: &str, api_key: Option<&str>, timeout: Duration) -> Result<Self, LecternError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key.filter(|k| !k.is_empty()) {
            headers.insert(
                "api-key",
                HeaderValue::from_str(key).map_err(|e| {
                    LecternError::Config(format!("invalid Qdrant API key header value: {e}"))
                })?,
            );
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| LecternError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
            known: DashSet::new(),
        })
    }

    /// Creates a store from the `vector_store` configuration section.
    pub fn from_config(config: &VectorStoreConfig) -> Result<Self, LecternError> {
        let store = Self::new(
            &config.url,
            config.api_key.as_deref(),
            Duration::from_millis(config.timeout_ms),
        )?;
        info!(url = %store.base_url, "qdrant vector store initialized");
        Ok(store)
    }

    /// Sends one request and decodes the `result` field.
    ///
    /// Returns `Ok(None)` when Qdrant answers 404.
    async fn call<B, T>(
        &self,
        method: Method,
        collection: &CollectionId,
        path: &str,
        body: Option<&B>,
    ) -> Result<Option<T>, LecternError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/collections/{}{}", self.base_url, collection.as_str(), path);
        let mut request = self.client.request(method.clone(), &url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| unavailable(collection, format!("request failed: {e}")))?;
        let status = response.status();
        debug!(%method, collection = %collection, path, status = %status, "qdrant response");

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(unavailable(collection, format!("qdrant returned {status}: {body}")));
        }

        let parsed = response
            .json::<QdrantResponse<T>>()
            .await
            .map_err(|e| unavailable(collection, format!("failed to parse response: {e}")))?;
        Ok(Some(parsed.result))
    }

    async fn ensure_collection(
        &self,
        collection: &CollectionId,
        dimensions: usize,
    ) -> Result<(), LecternError> {
        if self.known.contains(collection.as_str()) {
            return Ok(());
        }

        let existing: Option<serde_json::Value> = self
            .call::<(), _>(Method::GET, collection, "", None)
            .await?;
        if existing.is_none() {
            let body = CreateCollection {
                vectors: VectorParams {
                    size: dimensions,
                    distance: "Cosine",
                },
            };
            let created: Option<serde_json::Value> = self
                .call(Method::PUT, collection, "", Some(&body))
                .await?;
            if created.is_none() {
                return Err(unavailable(collection, "collection could not be created".into()));
            }
            info!(collection = %collection, dimensions, "collection created");
        }

        self.known.insert(collection.as_str().to_string());
        Ok(())
    }
}

fn unavailable(collection: &CollectionId, message: String) -> LecternError {
    LecternError::IndexUnavailable {
        collection: collection.to_string(),
        message,
    }
}

#[async_trait]
impl PluginAdapter for QdrantVectorStore {
    fn name(&self) -> &str {
        "qdrant"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::VectorStore
    }

    async fn health_check(&self) -> Result<HealthStatus, LecternError> {
        let url = format!("{}/healthz", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => Ok(HealthStatus::Healthy),
            Ok(response) => Ok(HealthStatus::Unhealthy(format!(
                "qdrant returned {}",
                response.status()
            ))),
            Err(e) => Ok(HealthStatus::Unhealthy(format!("qdrant unreachable: {e}"))),
        }
    }
}

#[async_trait]
impl VectorStoreAdapter for QdrantVectorStore {
    async fn upsert(
        &self,
        collection: &CollectionId,
        points: Vec<VectorPoint>,
    ) -> Result<(), LecternError> {
        let Some(first) = points.first() else {
            return Ok(());
        };
        self.ensure_collection(collection, first.vector.len()).await?;

        let body = UpsertPoints {
            points: points
                .iter()
                .map(|p| PointStruct {
                    id: &p.id,
                    vector: &p.vector,
                    payload: &p.payload,
                })
                .collect(),
        };
        let written: Option<serde_json::Value> = self
            .call(Method::PUT, collection, "/points?wait=true", Some(&body))
            .await?;
        if written.is_none() {
            // Dropped behind our back; recreate on the next upsert.
            self.known.remove(collection.as_str());
            return Err(unavailable(collection, "collection disappeared during upsert".into()));
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: &CollectionId,
        vector: &[f32],
        k: usize,
        score_threshold: f32,
    ) -> Result<Vec<ScoredPoint>, LecternError> {
        let body = SearchRequest {
            vector,
            limit: k,
            score_threshold,
            with_payload: true,
        };
        let hits: Option<Vec<ScoredHit>> = self
            .call(Method::POST, collection, "/points/search", Some(&body))
            .await?;
        Ok(hits
            .unwrap_or_default()
            .into_iter()
            .map(|hit| ScoredPoint {
                id: hit.id.to_string(),
                payload: hit.payload.unwrap_or_default(),
                score: hit.score,
            })
            .collect())
    }

    async fn scroll(
        &self,
        collection: &CollectionId,
        limit: usize,
    ) -> Result<Vec<StoredPayload>, LecternError> {
        let body = ScrollRequest {
            limit,
            with_payload: true,
            with_vector: false,
        };
        let page: Option<ScrollResult> = self
            .call(Method::POST, collection, "/points/scroll", Some(&body))
            .await?;
        Ok(page
            .map(|p| p.points)
            .unwrap_or_default()
            .into_iter()
            .map(|record| StoredPayload {
                id: record.id.to_string(),
                payload: record.payload.unwrap_or_default(),
            })
            .collect())
    }

    async fn delete(&self, collection: &CollectionId, ids: &[String]) -> Result<(), LecternError> {
        if ids.is_empty() {
            return Ok(());
        }
        let body = DeletePoints { points: ids };
        let _: Option<serde_json::Value> = self
            .call(Method::POST, collection, "/points/delete?wait=true", Some(&body))
            .await?;
        Ok(())
    }

    async fn count(&self, collection: &CollectionId) -> Result<usize, LecternError> {
        let body = CountRequest { exact: true };
        let result: Option<CountResult> = self
            .call(Method::POST, collection, "/points/count", Some(&body))
            .await?;
        Ok(result.map_or(0, |r| r.count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_core::{CollectionKind, UserId};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn docs() -> CollectionId {
        CollectionId::new(&UserId::new("u1"), CollectionKind::Documents).unwrap()
    }

    fn store(server: &MockServer) -> QdrantVectorStore {
        QdrantVectorStore::new(&server.uri(), Some("secret"), Duration::from_secs(5)).unwrap()
    }

    fn ok(result: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "result": result,
            "status": "ok",
            "time": 0.001
        }))
    }

    fn point(id: &str) -> VectorPoint {
        VectorPoint {
            id: id.into(),
            vector: vec![0.1, 0.2, 0.3],
            payload: json!({"book_id": "b1", "page_key": "p1", "text": "storm"}),
        }
    }

    #[tokio::test]
    async fn upsert_creates_missing_collection_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/collections/u1_documents"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/collections/u1_documents"))
            .and(header("api-key", "secret"))
            .and(body_partial_json(json!({"vectors": {"size": 3, "distance": "Cosine"}})))
            .respond_with(ok(json!(true)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/collections/u1_documents/points"))
            .respond_with(ok(json!({"operation_id": 1, "status": "completed"})))
            .expect(2)
            .mount(&server)
            .await;

        let store = store(&server);
        store.upsert(&docs(), vec![point("a")]).await.unwrap();
        store.upsert(&docs(), vec![point("b")]).await.unwrap();
    }

    #[tokio::test]
    async fn query_decodes_scored_points() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/collections/u1_documents/points/search"))
            .and(body_partial_json(json!({"limit": 4, "with_payload": true})))
            .respond_with(ok(json!([
                {"id": "6f1c0d2e-0000-5000-8000-000000000001", "version": 1, "score": 0.91,
                 "payload": {"book_id": "b1"}},
                {"id": 7, "version": 1, "score": 0.42, "payload": {"book_id": "b2"}}
            ])))
            .mount(&server)
            .await;

        let hits = store(&server)
            .query(&docs(), &[0.1, 0.2, 0.3], 4, 0.3)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "6f1c0d2e-0000-5000-8000-000000000001");
        assert_eq!(hits[1].id, "7");
        assert_eq!(hits[1].payload["book_id"], "b2");
    }

    #[tokio::test]
    async fn reads_of_missing_collection_are_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "status": {"error": "Not found: Collection `u1_documents` doesn't exist!"}
            })))
            .mount(&server)
            .await;

        let store = store(&server);
        assert!(store.query(&docs(), &[1.0], 5, 0.0).await.unwrap().is_empty());
        assert!(store.scroll(&docs(), 10).await.unwrap().is_empty());
        assert_eq!(store.count(&docs()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn scroll_and_count_decode_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/collections/u1_documents/points/scroll"))
            .and(body_partial_json(json!({"with_vector": false})))
            .respond_with(ok(json!({
                "points": [{"id": "a", "payload": {"text": "storm"}}],
                "next_page_offset": null
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/collections/u1_documents/points/count"))
            .respond_with(ok(json!({"count": 12})))
            .mount(&server)
            .await;

        let store = store(&server);
        let payloads = store.scroll(&docs(), 10).await.unwrap();
        assert_eq!(payloads[0].payload["text"], "storm");
        assert_eq!(store.count(&docs()).await.unwrap(), 12);
    }

    #[tokio::test]
    async fn server_errors_map_to_index_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("disk full"))
            .mount(&server)
            .await;

        let err = store(&server).count(&docs()).await.unwrap_err();
        match err {
            LecternError::IndexUnavailable { collection, message } => {
                assert_eq!(collection, "u1_documents");
                assert!(message.contains("disk full"));
            }
            other => panic!("expected IndexUnavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_server_is_index_unavailable() {
        let store =
            QdrantVectorStore::new("http://127.0.0.1:9", None, Duration::from_millis(200)).unwrap();
        let err = store.count(&docs()).await.unwrap_err();
        assert!(matches!(err, LecternError::IndexUnavailable { .. }));
        assert!(err.is_transient());

        let health = store.health_check().await.unwrap();
        assert!(matches!(health, HealthStatus::Unhealthy(_)));
    }

    #[tokio::test]
    async fn delete_sends_point_ids() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/collections/u1_chat/points/delete"))
            .and(body_partial_json(json!({"points": ["t1", "t2"]})))
            .respond_with(ok(json!({"operation_id": 2, "status": "completed"})))
            .expect(1)
            .mount(&server)
            .await;

        let chat = CollectionId::new(&UserId::new("u1"), CollectionKind::Chat).unwrap();
        store(&server)
            .delete(&chat, &["t1".to_string(), "t2".to_string()])
            .await
            .unwrap();
    }
}
