//! Gemini Backend Implementation
//!
//! Text backend for the Google Generative Language REST API.
//!
//! # Gemini API
//!
//! - `POST /v1beta/models/{model}:generateContent` - single-shot generation
//!
//! The API key travels in the `x-goog-api-key` header. Failures are mapped to
//! an [`ErrorKind`] from the HTTP status first and from the error message
//! second (see [`error_from_status`]).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use super::traits::{GenerateRequest, GenerateResponse, TextBackend};
use crate::error::{classify, BackendError, ErrorKind};

/// Default public endpoint
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Finish reasons that mean the output was withheld
const BLOCKED_FINISH_REASONS: &[&str] = &["SAFETY", "PROHIBITED_CONTENT", "BLOCKLIST", "SPII"];

/// Gemini connection settings
#[derive(Clone)]
pub struct GeminiConfig {
    /// API key sent with every request
    pub api_key: String,
    /// Base URL (scheme + host, no trailing path)
    pub base_url: String,
    /// Default timeout when a request carries none
    pub request_timeout: Duration,
}

impl GeminiConfig {
    /// Configuration for the public endpoint
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Override the base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the default request timeout
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Gemini backend client
#[derive(Clone, Debug)]
pub struct GeminiBackend {
    config: GeminiConfig,
    http_client: reqwest::Client,
}

impl GeminiBackend {
    /// Create a new Gemini backend
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed (TLS backend
    /// initialisation failure).
    pub fn new(config: GeminiConfig) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            config: GeminiConfig {
                base_url: config.base_url.trim_end_matches('/').to_string(),
                ..config
            },
            http_client,
        })
    }

    /// Get generateContent endpoint URL for a model
    fn generate_url(&self, model: &str) -> String {
        let model = model.strip_prefix("models/").unwrap_or(model);
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url, model
        )
    }
}

#[async_trait]
impl TextBackend for GeminiBackend {
    fn name(&self) -> &'static str {
        "Gemini"
    }

    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, BackendError> {
        let start = Instant::now();
        let body = GenerateContentBody::from_request(request);

        let mut builder = self
            .http_client
            .post(self.generate_url(&request.model))
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body);
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(error_from_transport)?;
        let status = response.status();
        let text = response.text().await.map_err(error_from_transport)?;

        if !status.is_success() {
            let err = error_from_status(status, &text);
            warn!(status = %status, kind = %err.kind, "Gemini returned an error");
            return Err(err);
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&text).map_err(|e| {
            BackendError::new(
                ErrorKind::Unknown,
                format!("unparseable Gemini response: {e}"),
            )
        })?;
        let tokens_used = parsed
            .usage_metadata
            .as_ref()
            .and_then(|u| u.total_token_count);
        let (reply, finish_reason) = extract_reply(parsed)?;

        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        debug!(duration_ms, chars = reply.len(), "Gemini generation complete");

        Ok(GenerateResponse {
            text: reply,
            model: request.model.clone(),
            finish_reason,
            tokens_used,
            duration_ms,
        })
    }
}

// ============================================================================
// Error Mapping
// ============================================================================

/// Map a non-success HTTP response to a [`BackendError`]
///
/// Status codes with an unambiguous meaning decide the kind directly;
/// everything else falls back to [`classify`] on the upstream message.
#[must_use]
pub fn error_from_status(status: StatusCode, body: &str) -> BackendError {
    let message = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => match envelope.error.status {
            Some(code) => format!("{} ({code})", envelope.error.message),
            None => envelope.error.message,
        },
        Err(_) => format!("upstream returned {status}: {}", body.trim()),
    };

    let kind = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ErrorKind::InvalidCredentials,
        StatusCode::TOO_MANY_REQUESTS => ErrorKind::QuotaExceeded,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ErrorKind::Timeout,
        _ => classify(&message),
    };

    BackendError::new(kind, message)
}

fn error_from_transport(err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::new(ErrorKind::Timeout, format!("request timed out: {err}"))
    } else if err.is_connect() || err.is_request() {
        BackendError::new(ErrorKind::NetworkError, format!("network error: {err}"))
    } else {
        BackendError::from_message(err.to_string())
    }
}

/// Pull the reply text out of a successful response
fn extract_reply(
    response: GenerateContentResponse,
) -> Result<(String, Option<String>), BackendError> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(BackendError::new(
            ErrorKind::ContentBlocked,
            format!("prompt blocked by safety filters ({reason})"),
        ));
    }

    let candidate = response.candidates.into_iter().next().ok_or_else(|| {
        BackendError::new(ErrorKind::Unknown, "upstream returned no candidates")
    })?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        if let Some(reason) = candidate
            .finish_reason
            .as_deref()
            .filter(|r| BLOCKED_FINISH_REASONS.contains(r))
        {
            return Err(BackendError::new(
                ErrorKind::ContentBlocked,
                format!("response blocked by safety filters ({reason})"),
            ));
        }
    }

    Ok((text, candidate.finish_reason))
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentBody<'a> {
    contents: [Content<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

impl<'a> GenerateContentBody<'a> {
    fn from_request(request: &'a GenerateRequest) -> Self {
        let generation_config = request
            .max_output_tokens
            .map(|max_output_tokens| GenerationConfig { max_output_tokens });

        Self {
            contents: [Content {
                role: "user",
                parts: [Part {
                    text: &request.prompt,
                }],
            }],
            generation_config,
        }
    }
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Clone, Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    total_token_count: Option<u32>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
    status: Option<String>,
}

// ============================================================================
// Tests
// ============================================================================
