//! HTTP Surface
//!
//! Axum router exposing the chat service.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Liveness check |
//! | `POST` | `/chat` | `{"message": "..."}` -> `{"reply": "..."}` |
//! | `GET`  | `/diagnostic` | Key presence, resolver state and counters |
//! | `GET`  | `/test-model` | One generation with a fixed self-test prompt |
//!
//! `/test-gemini` is kept as an alias of `/test-model`.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use biochat_core::{ChatReply, ChatService, ModelResolver};

use crate::error::ApiError;

/// Prompt used by the self-test endpoint
pub const SELF_TEST_PROMPT: &str = "Say 'Hello, I am working!' in one sentence";

/// Status text reported by the liveness endpoints
pub const RUNNING_STATUS: &str = "Backend is running";

// ─────────────────────────────────────────────────────────────────────────────
// Shared application state
// ─────────────────────────────────────────────────────────────────────────────

/// Shared state injected into every handler
#[derive(Clone, Debug)]
pub struct AppState {
    chat: ChatService,
    api_key_length: usize,
    expose_error_detail: bool,
    started_at: Instant,
}

impl AppState {
    /// Create handler state
    ///
    /// Only the key's length is kept, for the diagnostic endpoint.
    #[must_use]
    pub fn new(chat: ChatService, api_key: Option<&str>, expose_error_detail: bool) -> Self {
        Self {
            chat,
            api_key_length: api_key.map_or(0, str::len),
            expose_error_detail,
            started_at: Instant::now(),
        }
    }

    fn resolver(&self) -> &Arc<ModelResolver> {
        self.chat.resolver()
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/chat", post(chat))
        .route("/diagnostic", get(diagnostic))
        .route("/test-model", get(test_model))
        .route("/test-gemini", get(test_model))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Body of `POST /chat`
#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {
    /// Message from the caller
    #[serde(default)]
    pub message: Option<String>,
}

/// GET / - liveness probe
async fn health() -> impl IntoResponse {
    Json(json!({ "status": RUNNING_STATUS }))
}

/// POST /chat
async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatReply>, ApiError> {
    let request_id = Uuid::new_v4();
    let span = info_span!("chat_request", %request_id);

    async move {
        let Json(request) = payload.map_err(|rejection| {
            warn!(
                status = %rejection.status(),
                detail = %rejection.body_text(),
                "Rejected chat request body"
            );
            ApiError::from_rejection(&rejection, state.expose_error_detail)
        })?;

        info!(
            chars = request.message.as_deref().map_or(0, |m| m.chars().count()),
            "Chat request received"
        );

        match state.chat.handle(request.message.as_deref()).await {
            Ok(reply) => Ok(Json(reply)),
            Err(err) => {
                warn!(
                    status = err.status_code(),
                    kind = ?err.kind(),
                    detail = err.detail().unwrap_or_default(),
                    "Chat request failed"
                );
                Err(ApiError::from_chat(&err, state.expose_error_detail))
            }
        }
    }
    .instrument(span)
    .await
}

/// GET /diagnostic
async fn diagnostic(State(state): State<AppState>) -> impl IntoResponse {
    let resolver = state.resolver();
    let resolved = resolver.resolved_model();
    Json(json!({
        "status": RUNNING_STATUS,
        "api_key_present": state.api_key_length > 0,
        "api_key_length": state.api_key_length,
        "version": env!("CARGO_PKG_VERSION"),
        "backend": resolver.backend_name(),
        "resolver": resolver.state(),
        "resolved_model": resolved.as_ref().map(|r| r.model_id.as_str()),
        "resolved_age_secs": resolved.as_ref().map(|r| r.resolved_at.elapsed().as_secs()),
        "candidates": resolver.candidates().as_slice(),
        "profile_chars": state.chat.profile().as_str().chars().count(),
        "stats": resolver.stats(),
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// GET /test-model
async fn test_model(State(state): State<AppState>) -> Response {
    info!("Running model self-test");

    match state.resolver().generate_detailed(SELF_TEST_PROMPT).await {
        Ok(response) => {
            info!(model = %response.model, "Model self-test succeeded");
            Json(json!({
                "status": "SUCCESS",
                "reply": response.text,
                "model": response.model,
                "timestamp": Utc::now().to_rfc3339(),
            }))
            .into_response()
        }
        Err(err) => {
            warn!(kind = %err.kind(), detail = err.detail(), "Model self-test failed");
            let mut body = json!({
                "status": "FAILED",
                "kind": err.kind(),
                "message": err.user_message(),
            });
            if state.expose_error_detail {
                body["debug"] = json!(err.detail());
            }
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
    }
}
