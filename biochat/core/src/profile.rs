//! Profile context prepended to every chat prompt

use std::path::Path;
use std::sync::Arc;

use crate::config::ConfigError;

/// Context used when no profile file is configured
pub const DEFAULT_PROFILE: &str = "You are an AI assistant answering questions about the \
person described below. Answer strictly from this information.

Profile:
- No profile has been configured for this service yet.

Rules:
- Do NOT invent information
- If unknown, say you don't know";

/// Static biography/context text, shared across requests
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProfileContext(Arc<str>);

impl ProfileContext {
    /// Wrap context text
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        Self(text.into())
    }

    /// Read context text from a file, trimming trailing whitespace
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ReadError`] if the file cannot be read.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), chars = text.chars().count(), "Loaded profile context");
        Ok(Self::new(text.trim_end()))
    }

    /// Load from `path` when given, otherwise use [`DEFAULT_PROFILE`]
    ///
    /// # Errors
    ///
    /// See [`ProfileContext::from_file`].
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        path.map_or_else(|| Ok(Self::default()), Self::from_file)
    }

    /// Context text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ProfileContext {
    fn default() -> Self {
        Self::new(DEFAULT_PROFILE)
    }
}
