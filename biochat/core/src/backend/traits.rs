//! Text Backend Traits
//!
//! Trait definitions for the upstream text-generation service. The resolver
//! only talks to upstreams through [`TextBackend`], which keeps it testable
//! with scripted backends and lets another provider slot in without touching
//! resolution logic.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::BackendError;

/// Prompt sent by the default [`TextBackend::probe`]
pub const PROBE_PROMPT: &str = "Reply with the single word: ok";

/// Output-token cap used for probes
pub const PROBE_MAX_OUTPUT_TOKENS: u32 = 8;

/// A single generation request against one model
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GenerateRequest {
    /// Upstream model identifier
    pub model: String,
    /// Fully assembled prompt text
    pub prompt: String,
    /// Maximum output tokens (`None` = upstream default)
    pub max_output_tokens: Option<u32>,
    /// Per-call timeout hint for the transport
    pub timeout: Option<Duration>,
}

impl GenerateRequest {
    /// Create a new request with model and prompt
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    /// Minimal request used to test whether `model` is usable
    pub fn probe(model: impl Into<String>) -> Self {
        Self::new(model, PROBE_PROMPT).with_max_output_tokens(PROBE_MAX_OUTPUT_TOKENS)
    }

    /// Set max output tokens
    #[must_use]
    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = Some(max_output_tokens);
        self
    }

    /// Set transport timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Response from a generation request
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GenerateResponse {
    /// Generated text, verbatim
    pub text: String,
    /// Model that produced the text
    pub model: String,
    /// Upstream finish reason, if reported
    pub finish_reason: Option<String>,
    /// Total tokens used, if reported
    pub tokens_used: Option<u32>,
    /// Round-trip time in milliseconds
    pub duration_ms: u64,
}

/// Upstream text-generation service
///
/// Implement this trait to add support for a different provider.
#[async_trait]
pub trait TextBackend: Send + Sync {
    /// Backend name (e.g., "Gemini")
    fn name(&self) -> &str;

    /// Send a request and wait for the complete response
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, BackendError>;

    /// Check whether `model` currently answers at all
    ///
    /// Any successful response counts, including an empty one.
    async fn probe(&self, model: &str) -> Result<(), BackendError> {
        self.generate(&GenerateRequest::probe(model)).await.map(|_| ())
    }
}
