//! HTTP error responses

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use biochat_core::chat::EMPTY_MESSAGE_REPLY;
use biochat_core::{ChatError, ErrorKind};

/// A failed chat request, ready to be rendered as JSON
///
/// Body shape: `{"reply": "...", "kind": "...", "debug": "..."}`. `kind` is
/// present for generation failures; `debug` only when detail exposure is on.
#[derive(Debug, Error)]
#[error("{status}: {}", .body.reply)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    reply: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    debug: Option<String>,
}

impl ApiError {
    /// Build from a chat failure; raw detail is included only if `expose_detail`
    #[must_use]
    pub fn from_chat(err: &ChatError, expose_detail: bool) -> Self {
        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self {
            status,
            body: ErrorBody {
                reply: err.user_message().into_owned(),
                kind: err.kind(),
                debug: err.detail().filter(|_| expose_detail).map(str::to_string),
            },
        }
    }

    /// Build from a request body axum could not decode
    ///
    /// Always a 400 with the empty-message reply, whatever axum's own status.
    #[must_use]
    pub fn from_rejection(rejection: &JsonRejection, expose_detail: bool) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody {
                reply: EMPTY_MESSAGE_REPLY.to_string(),
                kind: None,
                debug: expose_detail.then(|| rejection.body_text()),
            },
        }
    }

    /// HTTP status
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
