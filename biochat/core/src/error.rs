//! Error Taxonomy
//!
//! Every failure that can reach a chat caller is reduced to an [`ErrorKind`].
//! The kind only selects the human-readable message shown to the caller; it
//! never changes control flow.
//!
//! Backends report a structured kind when the upstream gives one (HTTP status,
//! block reason, transport error). When all we have is free text, the kind is
//! derived by [`classify`].

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

// ============================================================================
// Error Kind
// ============================================================================

/// Classification of an upstream or resolution failure
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Every candidate model failed its probe
    NoUsableModel,
    /// The upstream rejected the API key
    InvalidCredentials,
    /// Quota or rate limit exhausted
    QuotaExceeded,
    /// Prompt or response blocked by safety filters
    ContentBlocked,
    /// The upstream call did not finish in time
    Timeout,
    /// Connection-level failure reaching the upstream
    NetworkError,
    /// Anything else
    Unknown,
}

impl ErrorKind {
    /// Short, user-safe message for this kind of failure
    #[must_use]
    pub fn user_message(self) -> &'static str {
        match self {
            Self::NoUsableModel => "No AI model is currently available. Please try again later.",
            Self::InvalidCredentials => "Invalid API key. Please check configuration.",
            Self::QuotaExceeded => "API quota exceeded. Please try again later.",
            Self::ContentBlocked => "Response was blocked by safety filters. Try rephrasing.",
            Self::Timeout => "Request timed out. Please try again.",
            Self::NetworkError => "Network error. Check your internet connection.",
            Self::Unknown => "AI temporarily unavailable. Please try again.",
        }
    }

    /// Stable snake_case identifier (matches the serde representation)
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoUsableModel => "no_usable_model",
            Self::InvalidCredentials => "invalid_credentials",
            Self::QuotaExceeded => "quota_exceeded",
            Self::ContentBlocked => "content_blocked",
            Self::Timeout => "timeout",
            Self::NetworkError => "network_error",
            Self::Unknown => "unknown",
        }
    }

    /// Whether a failure of this kind suggests the resolved model itself is
    /// unhealthy. Blocked content and bad credentials are not fixed by
    /// switching models.
    #[must_use]
    pub fn counts_against_model(self) -> bool {
        matches!(
            self,
            Self::QuotaExceeded | Self::Timeout | Self::NetworkError | Self::Unknown
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a free-text failure message.
///
/// Case-insensitive substring match, first rule wins:
///
/// | Substring | Kind |
/// |-----------|------|
/// | `api key`, `invalid key` | [`ErrorKind::InvalidCredentials`] |
/// | `quota`, `rate limit` | [`ErrorKind::QuotaExceeded`] |
/// | `safety`, `blocked` | [`ErrorKind::ContentBlocked`] |
/// | `timeout`, `timed out` | [`ErrorKind::Timeout`] |
/// | `network`, `fetch` | [`ErrorKind::NetworkError`] |
///
/// Anything else is [`ErrorKind::Unknown`].
#[must_use]
pub fn classify(raw: &str) -> ErrorKind {
    const RULES: &[(&[&str], ErrorKind)] = &[
        (&["api key", "invalid key"], ErrorKind::InvalidCredentials),
        (&["quota", "rate limit"], ErrorKind::QuotaExceeded),
        (&["safety", "blocked"], ErrorKind::ContentBlocked),
        (&["timeout", "timed out"], ErrorKind::Timeout),
        (&["network", "fetch"], ErrorKind::NetworkError),
    ];

    let lower = raw.to_lowercase();
    RULES
        .iter()
        .find(|(needles, _)| needles.iter().any(|n| lower.contains(n)))
        .map_or(ErrorKind::Unknown, |(_, kind)| *kind)
}

// ============================================================================
// Backend Error
// ============================================================================

/// A single failed upstream call (probe or generation)
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct BackendError {
    /// Classified kind
    pub kind: ErrorKind,
    /// Raw upstream detail (debug only, never shown to chat callers)
    pub message: String,
}

impl BackendError {
    /// Create an error with an explicit kind
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create an error whose kind is derived from its message
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: classify(&message),
            message,
        }
    }

    /// The call exceeded its time budget
    #[must_use]
    pub fn timeout(after: Duration) -> Self {
        Self::new(
            ErrorKind::Timeout,
            format!("upstream call timed out after {}ms", after.as_millis()),
        )
    }
}

// ============================================================================
// Resolution Failure
// ============================================================================

/// Every candidate model failed its probe
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("no usable model after probing {} candidate(s) ({}); last error: {last_error}", .tried.len(), .tried.join(", "))]
pub struct NoUsableModel {
    /// Candidates probed during the failed pass, in probe order
    pub tried: Vec<String>,
    /// Failure reported by the last probed candidate
    pub last_error: BackendError,
}

// ============================================================================
// Generation Error
// ============================================================================

/// Failure surfaced by [`ModelResolver::generate`](crate::resolver::ModelResolver::generate)
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("generation failed ({kind}){}: {detail}", .model.as_deref().map(|m| format!(" on {m}")).unwrap_or_default())]
pub struct GenerationError {
    kind: ErrorKind,
    detail: String,
    model: Option<String>,
}

impl GenerationError {
    /// Wrap a backend failure observed on `model`
    pub fn from_backend(error: BackendError, model: impl Into<String>) -> Self {
        Self {
            kind: error.kind,
            detail: error.message,
            model: Some(model.into()),
        }
    }

    /// Classified kind
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Raw failure detail (for logs)
    #[must_use]
    pub fn detail(&self) -> &str {
        &self.detail
    }

    /// Model the failing call targeted, if one had been resolved
    #[must_use]
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// Short, user-safe message
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        self.kind.user_message()
    }
}

impl From<NoUsableModel> for GenerationError {
    fn from(error: NoUsableModel) -> Self {
        Self {
            kind: ErrorKind::NoUsableModel,
            detail: error.to_string(),
            model: None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
