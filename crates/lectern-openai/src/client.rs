// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for OpenAI-compatible REST APIs.
//!
//! Provides [`OpenAiClient`], which owns authentication headers and maps HTTP
//! status codes onto [`LecternError`]. Retries are the caller's concern.

use std::time::Duration;

use lectern_core::LecternError;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::types::ApiErrorResponse;

/// Default base URL of the OpenAI API.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Authenticated JSON client for one OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
}

impl OpenAiClient {
    /// Creates a client sending `api_key` as a bearer token to `base_url`.
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self, LecternError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|e| {
                LecternError::Config(format!("invalid API key header value: {e}"))
            })?,
        );
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| LecternError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POSTs `body` to `{base_url}/{path}` and decodes the JSON reply.
    ///
    /// `model` names the rate-limited model when the API answers 429.
    pub async fn post_json<Req, Resp>(
        &self,
        path: &str,
        body: &Req,
        model: &str,
    ) -> Result<Resp, LecternError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| LecternError::Provider {
                message: format!("HTTP request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        debug!(status = %status, path, "response received");

        if status.is_success() {
            return response.json::<Resp>().await.map_err(|e| LecternError::Provider {
                message: format!("failed to parse response: {e}"),
                source: Some(Box::new(e)),
            });
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            warn!(model, retry_after_ms = retry_after.map(|d| d.as_millis() as u64), "rate limited");
            return Err(LecternError::RateLimited {
                model: model.to_string(),
                retry_after,
            });
        }

        let body = response.text().await.unwrap_or_default();
        Err(LecternError::provider(error_message(status, &body)))
    }
}

/// Seconds form of a `retry-after` header; HTTP dates are ignored.
fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<f64>().ok().filter(|s| *s >= 0.0).map(Duration::from_secs_f64)
}

fn error_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(api_err) => match api_err.error.type_ {
            Some(kind) => format!("API error ({status}): {kind}: {}", api_err.error.message),
            None => format!("API error ({status}): {}", api_err.error.message),
        },
        Err(_) => format!("API returned {status}: {body}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> OpenAiClient {
        OpenAiClient::new("sk-test", &server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn sends_bearer_auth_and_decodes_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/echo"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let reply: Value = client(&server)
            .post_json("/echo", &json!({"x": 1}), "m")
            .await
            .unwrap();
        assert_eq!(reply["ok"], true);
    }

    #[tokio::test]
    async fn too_many_requests_maps_to_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/echo"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "3"))
            .mount(&server)
            .await;

        let err = client(&server)
            .post_json::<_, Value>("echo", &json!({}), "gpt-4o")
            .await
            .unwrap_err();
        match err {
            LecternError::RateLimited { model, retry_after } => {
                assert_eq!(model, "gpt-4o");
                assert_eq!(retry_after, Some(Duration::from_secs(3)));
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn api_error_body_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/echo"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"message": "max_tokens is too large", "type": "invalid_request_error"}
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .post_json::<_, Value>("echo", &json!({}), "m")
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("invalid_request_error"));
        assert!(msg.contains("max_tokens is too large"));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn server_errors_are_transient_provider_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let err = client(&server)
            .post_json::<_, Value>("echo", &json!({}), "m")
            .await
            .unwrap_err();
        assert!(matches!(err, LecternError::Provider { .. }));
        assert!(err.to_string().contains("upstream down"));
    }

    #[test]
    fn retry_after_accepts_seconds_only() {
        assert_eq!(parse_retry_after("2"), Some(Duration::from_secs(2)));
        assert_eq!(parse_retry_after("0.5"), Some(Duration::from_millis(500)));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
        assert_eq!(parse_retry_after("-1"), None);
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client =
            OpenAiClient::new("k", "http://localhost:1234/v1/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:1234/v1");
    }
}
