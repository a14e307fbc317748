#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use biochat_core::backend::{GeminiBackend, GeminiConfig, PROBE_PROMPT};
use biochat_core::{CandidateModels, ChatService, ModelResolver, ProfileContext, ResolverConfig};
use biochat_daemon::{router, AppState};
use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_API_KEY: &str = "test-api-key";

pub struct TestHarness {
    pub mock_server: MockServer,
    pub models: Vec<&'static str>,
    pub expose_error_detail: bool,
}

impl TestHarness {
    pub async fn new(models: &[&'static str]) -> Self {
        Self {
            mock_server: MockServer::start().await,
            models: models.to_vec(),
            expose_error_detail: false,
        }
    }

    pub fn exposing_errors(mut self) -> Self {
        self.expose_error_detail = true;
        self
    }

    /// Resolver pointed at the mock server
    pub fn resolver(&self) -> Arc<ModelResolver> {
        let backend = GeminiBackend::new(
            GeminiConfig::new(TEST_API_KEY).with_base_url(self.mock_server.uri()),
        )
        .unwrap();
        let config = ResolverConfig::default()
            .with_probe_timeout(Duration::from_secs(2))
            .with_request_timeout(Duration::from_secs(2));
        Arc::new(ModelResolver::new(
            Arc::new(backend),
            CandidateModels::new(&self.models).unwrap(),
            config,
        ))
    }

    pub fn router(&self) -> Router {
        self.router_with(self.resolver())
    }

    pub fn router_with(&self, resolver: Arc<ModelResolver>) -> Router {
        let chat = ChatService::new(resolver, ProfileContext::new("Test profile"), 200);
        router(AppState::new(chat, Some(TEST_API_KEY), self.expose_error_detail))
    }

    fn endpoint(model: &str) -> String {
        format!("/v1beta/models/{model}:generateContent")
    }

    pub async fn mount_probe(&self, model: &str, status: u16, body: Value, expected: u64) {
        Mock::given(method("POST"))
            .and(path(Self::endpoint(model)))
            .and(header("x-goog-api-key", TEST_API_KEY))
            .and(body_string_contains(PROBE_PROMPT))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .expect(expected)
            .mount(&self.mock_server)
            .await;
    }

    pub async fn mount_probe_ok(&self, model: &str) {
        self.mount_probe(model, 200, gemini_reply("ok"), 1).await;
    }

    pub async fn mount_generation(&self, model: &str, status: u16, body: Value, expected: u64) {
        Mock::given(method("POST"))
            .and(path(Self::endpoint(model)))
            .and(header("x-goog-api-key", TEST_API_KEY))
            .and(body_string_contains("User: "))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .expect(expected)
            .mount(&self.mock_server)
            .await;
    }

    /// Fail the test if anything reaches the upstream
    pub async fn expect_no_upstream_calls(&self) {
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&self.mock_server)
            .await;
    }
}

pub fn gemini_reply(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }],
        "usageMetadata": {"totalTokenCount": 12}
    })
}

pub fn gemini_error(code: u16, message: &str, status: &str) -> Value {
    json!({"error": {"code": code, "message": message, "status": status}})
}

pub fn build_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/chat")
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

pub fn raw_request(content_type: &str, body: &'static str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/chat")
        .header("Content-Type", content_type)
        .body(Body::from(body))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn response_to_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
