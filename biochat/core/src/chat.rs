//! Chat Handling
//!
//! The HTTP-agnostic chat operation: validate the caller's message, wrap it
//! in the profile context, generate through the resolver, and map failures
//! to a status code plus a user-safe reply.

use std::borrow::Cow;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::error::{ErrorKind, GenerationError};
use crate::profile::ProfileContext;
use crate::resolver::ModelResolver;

/// Reply shown for a missing or blank message
pub const EMPTY_MESSAGE_REPLY: &str = "Please provide a message";

/// Assemble the upstream prompt
#[must_use]
pub fn build_prompt(context: &str, message: &str) -> String {
    format!("{context}\n\nUser: {message}\nAssistant:")
}

/// Successful chat reply
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatReply {
    /// Generated text, verbatim
    pub reply: String,
    /// Model that produced it
    #[serde(skip)]
    pub model: String,
}

/// Chat failure, carrying enough to build an HTTP response
#[derive(Debug, Error)]
pub enum ChatError {
    /// Message missing, empty or whitespace only
    #[error("empty message")]
    EmptyMessage,

    /// Message exceeds the configured length
    #[error("message is {chars} characters, limit is {max}")]
    MessageTooLong {
        /// Characters received
        chars: usize,
        /// Configured limit
        max: usize,
    },

    /// Resolution or generation failed
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

impl ChatError {
    /// HTTP status code for this failure
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::EmptyMessage | Self::MessageTooLong { .. } => 400,
            Self::Generation(_) => 500,
        }
    }

    /// User-safe reply text
    #[must_use]
    pub fn user_message(&self) -> Cow<'static, str> {
        match self {
            Self::EmptyMessage => Cow::Borrowed(EMPTY_MESSAGE_REPLY),
            Self::MessageTooLong { max, .. } => {
                Cow::Owned(format!("Message is too long (max {max} characters)"))
            }
            Self::Generation(err) => Cow::Borrowed(err.user_message()),
        }
    }

    /// Error kind, for generation failures
    #[must_use]
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Generation(err) => Some(err.kind()),
            _ => None,
        }
    }

    /// Raw failure detail, for generation failures
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Generation(err) => Some(err.detail()),
            _ => None,
        }
    }
}

/// Handles chat messages against a shared resolver
#[derive(Clone, Debug)]
pub struct ChatService {
    resolver: Arc<ModelResolver>,
    profile: ProfileContext,
    max_message_chars: usize,
}

impl ChatService {
    /// Create a chat service
    pub fn new(resolver: Arc<ModelResolver>, profile: ProfileContext, max_message_chars: usize) -> Self {
        Self {
            resolver,
            profile,
            max_message_chars,
        }
    }

    /// Shared resolver
    #[must_use]
    pub fn resolver(&self) -> &Arc<ModelResolver> {
        &self.resolver
    }

    /// Profile context
    #[must_use]
    pub fn profile(&self) -> &ProfileContext {
        &self.profile
    }

    /// Handle one chat message
    ///
    /// Invalid input is rejected before any upstream call.
    ///
    /// # Errors
    ///
    /// [`ChatError`] for invalid input or a failed generation.
    #[instrument(skip(self, message))]
    pub async fn handle(&self, message: Option<&str>) -> Result<ChatReply, ChatError> {
        let message = match message {
            Some(m) if !m.trim().is_empty() => m,
            _ => {
                warn!("Empty message received");
                return Err(ChatError::EmptyMessage);
            }
        };

        let chars = message.chars().count();
        if chars > self.max_message_chars {
            warn!(chars, max = self.max_message_chars, "Message too long");
            return Err(ChatError::MessageTooLong {
                chars,
                max: self.max_message_chars,
            });
        }

        let prompt = build_prompt(self.profile.as_str(), message);
        let response = self.resolver.generate_detailed(&prompt).await?;

        info!(
            model = %response.model,
            reply_chars = response.text.chars().count(),
            duration_ms = response.duration_ms,
            "Chat reply generated"
        );
        Ok(ChatReply {
            reply: response.text,
            model: response.model,
        })
    }
}
