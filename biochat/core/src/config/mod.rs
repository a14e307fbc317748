//! TOML Configuration File Support
//!
//! Centralized configuration loading for the biochat service, with a TOML
//! file at `~/.config/biochat/biochat.toml`.
//!
//! # Configuration Priority
//!
//! Values are applied in this order (highest first):
//! 1. CLI arguments (via [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! The upstream API key is only ever read from `GEMINI_API_KEY`.
//!
//! # Example Configuration
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0"
//! port = 5000
//! expose_error_detail = false
//! max_message_chars = 4000
//!
//! [upstream]
//! base_url = "https://generativelanguage.googleapis.com"
//! probe_timeout_secs = 8
//! request_timeout_secs = 30
//!
//! [models]
//! candidates = ["gemini-1.5-flash", "gemini-1.5-pro", "gemini-pro"]
//! failure_threshold = 3
//!
//! [profile]
//! path = "/etc/biochat/profile.txt"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::{GeminiConfig, DEFAULT_BASE_URL};
use crate::resolver::{
    CandidateError, CandidateModels, ResolverConfig, DEFAULT_FAILURE_THRESHOLD,
    DEFAULT_PROBE_TIMEOUT, DEFAULT_REQUEST_TIMEOUT,
};

/// Default candidate models, most preferred first
pub const DEFAULT_CANDIDATES: &[&str] = &["gemini-1.5-flash", "gemini-1.5-pro", "gemini-pro"];

/// Default listen port
pub const DEFAULT_PORT: u16 = 5000;

/// Default listen address
pub const DEFAULT_BIND: &str = "0.0.0.0";

/// Default maximum chat message length in characters
pub const DEFAULT_MAX_MESSAGE_CHARS: usize = 4000;

/// Smallest accepted probe or generation timeout, in seconds
pub const MIN_TIMEOUT_SECS: u64 = 1;

/// Environment variable holding the upstream API key
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// The candidate model list is unusable
    #[error("Invalid candidate models: {0}")]
    Candidates(#[from] CandidateError),

    /// `GEMINI_API_KEY` is not set
    #[error("GEMINI_API_KEY is not set; export it before starting the service")]
    MissingApiKey,
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where the highest-priority configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// `[server]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerToml {
    /// Listen address
    pub bind: Option<String>,
    /// Listen port
    pub port: Option<u16>,
    /// Include raw upstream detail in chat error bodies
    pub expose_error_detail: Option<bool>,
    /// Maximum chat message length in characters
    pub max_message_chars: Option<usize>,
}

/// `[upstream]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamToml {
    /// Base URL of the generative-language API
    pub base_url: Option<String>,
    /// Probe timeout in seconds
    pub probe_timeout_secs: Option<u64>,
    /// Generation timeout in seconds
    pub request_timeout_secs: Option<u64>,
}

/// `[models]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsToml {
    /// Candidate models, most preferred first
    pub candidates: Option<Vec<String>>,
    /// Consecutive failures before the resolved model is dropped
    pub failure_threshold: Option<u32>,
}

/// `[profile]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileToml {
    /// File holding the context text prepended to every prompt
    pub path: Option<PathBuf>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BiochatToml {
    /// Server section
    pub server: ServerToml,
    /// Upstream section
    pub upstream: UpstreamToml,
    /// Models section
    pub models: ModelsToml,
    /// Profile section
    pub profile: ProfileToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Effective configuration after all sources have been applied
#[derive(Clone)]
pub struct BiochatConfig {
    /// Upstream API key (from `GEMINI_API_KEY` only)
    pub api_key: Option<String>,
    /// Listen address
    pub bind: String,
    /// Listen port
    pub port: u16,
    /// Include raw upstream detail in chat error bodies
    pub expose_error_detail: bool,
    /// Maximum chat message length in characters
    pub max_message_chars: usize,
    /// Base URL of the generative-language API
    pub base_url: String,
    /// Probe timeout
    pub probe_timeout: Duration,
    /// Generation timeout
    pub request_timeout: Duration,
    /// Candidate models, most preferred first
    pub candidates: Vec<String>,
    /// Consecutive failures before the resolved model is dropped (0 = never)
    pub failure_threshold: u32,
    /// Profile context file, if any
    pub profile_path: Option<PathBuf>,
    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,
    source: ConfigSource,
}

impl Default for BiochatConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            bind: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
            expose_error_detail: false,
            max_message_chars: DEFAULT_MAX_MESSAGE_CHARS,
            base_url: DEFAULT_BASE_URL.to_string(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            candidates: DEFAULT_CANDIDATES.iter().map(ToString::to_string).collect(),
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            profile_path: None,
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl std::fmt::Debug for BiochatConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BiochatConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("bind", &self.bind)
            .field("port", &self.port)
            .field("expose_error_detail", &self.expose_error_detail)
            .field("max_message_chars", &self.max_message_chars)
            .field("base_url", &self.base_url)
            .field("probe_timeout", &self.probe_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("candidates", &self.candidates)
            .field("failure_threshold", &self.failure_threshold)
            .field("profile_path", &self.profile_path)
            .field("config_file_path", &self.config_file_path)
            .field("source", &self.source)
            .finish()
    }
}

impl BiochatConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Validated candidate list
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Candidates`] for an empty list, blank entries or
    /// duplicates.
    pub fn candidate_models(&self) -> Result<CandidateModels, ConfigError> {
        Ok(CandidateModels::new(&self.candidates)?)
    }

    /// Resolver tuning derived from this configuration
    #[must_use]
    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig::default()
            .with_probe_timeout(self.probe_timeout)
            .with_request_timeout(self.request_timeout)
            .with_failure_threshold(self.failure_threshold)
    }

    /// Gemini client configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingApiKey`] when no key is configured.
    pub fn gemini_config(&self) -> Result<GeminiConfig, ConfigError> {
        let key = self
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;
        Ok(GeminiConfig::new(key)
            .with_base_url(&self.base_url)
            .with_request_timeout(self.request_timeout))
    }

    /// Socket address string (`bind:port`)
    #[must_use]
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/biochat/biochat.toml` or
/// `~/.config/biochat/biochat.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("biochat").join("biochat.toml"))
}

/// Load configuration from the default file and the process environment
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed.
/// A missing config file is not an error (defaults are used).
pub fn load_config() -> Result<BiochatConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path and the process environment
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<BiochatConfig, ConfigError> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Load configuration using `env` to look up environment variables
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed.
pub fn load_config_with_env<F>(path: Option<PathBuf>, env: F) -> Result<BiochatConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = BiochatConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: BiochatToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, env);

    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut BiochatConfig, toml: &BiochatToml) {
    // Server settings
    if let Some(ref bind) = toml.server.bind {
        config.bind = bind.clone();
    }
    if let Some(port) = toml.server.port {
        config.port = port;
    }
    if let Some(expose) = toml.server.expose_error_detail {
        config.expose_error_detail = expose;
    }
    if let Some(max) = toml.server.max_message_chars {
        config.max_message_chars = max;
    }

    // Upstream settings
    if let Some(ref url) = toml.upstream.base_url {
        config.base_url = url.clone();
    }
    if let Some(secs) = toml.upstream.probe_timeout_secs {
        config.probe_timeout = timeout_from_secs("probe_timeout_secs", secs);
    }
    if let Some(secs) = toml.upstream.request_timeout_secs {
        config.request_timeout = timeout_from_secs("request_timeout_secs", secs);
    }

    // Model settings
    if let Some(ref candidates) = toml.models.candidates {
        config.candidates = candidates.clone();
    }
    if let Some(threshold) = toml.models.failure_threshold {
        config.failure_threshold = threshold;
    }

    if toml.profile.path.is_some() {
        config.profile_path = toml.profile.path.clone();
    }
}

/// Convert a configured timeout, raising zero to [`MIN_TIMEOUT_SECS`]
fn timeout_from_secs(field: &str, secs: u64) -> Duration {
    if secs < MIN_TIMEOUT_SECS {
        tracing::warn!(
            field,
            value = secs,
            min = MIN_TIMEOUT_SECS,
            "Timeout below minimum, using minimum"
        );
        return Duration::from_secs(MIN_TIMEOUT_SECS);
    }
    Duration::from_secs(secs)
}

/// Parse a numeric environment value, warning and ignoring it when invalid
fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Option<T> {
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!(var = name, value, "Ignoring unparseable environment value");
            None
        }
    }
}

/// Apply environment variable overrides to the config
fn apply_env_config<F>(config: &mut BiochatConfig, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    // The key never marks the config as env-sourced; it has no other source
    config.api_key = env(API_KEY_ENV).filter(|k| !k.is_empty());

    if let Some(port) = env("PORT").and_then(|v| parse_env::<u16>("PORT", &v)) {
        config.port = port;
        config.source = ConfigSource::Env;
    }
    if let Some(bind) = env("BIOCHAT_BIND") {
        config.bind = bind;
        config.source = ConfigSource::Env;
    }
    if let Some(models) = env("BIOCHAT_MODELS") {
        config.candidates = models.split(',').map(|m| m.trim().to_string()).collect();
        config.source = ConfigSource::Env;
    }
    if let Some(threshold) = env("BIOCHAT_FAILURE_THRESHOLD")
        .and_then(|v| parse_env::<u32>("BIOCHAT_FAILURE_THRESHOLD", &v))
    {
        config.failure_threshold = threshold;
        config.source = ConfigSource::Env;
    }
    if let Some(url) = env("GEMINI_BASE_URL") {
        config.base_url = url;
        config.source = ConfigSource::Env;
    }
    if let Some(path) = env("BIOCHAT_PROFILE") {
        config.profile_path = Some(PathBuf::from(path));
        config.source = ConfigSource::Env;
    }
    if let Some(expose) = env("BIOCHAT_EXPOSE_ERRORS") {
        config.expose_error_detail = expose != "0" && expose.to_lowercase() != "false";
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Listen port override
    pub port: Option<u16>,
    /// Listen address override
    pub bind: Option<String>,
    /// Candidate list override (comma separated)
    pub models: Option<String>,
    /// Failure threshold override
    pub failure_threshold: Option<u32>,
    /// Profile file override
    pub profile_path: Option<PathBuf>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set port override
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set bind address override
    #[must_use]
    pub fn with_bind(mut self, bind: impl Into<String>) -> Self {
        self.bind = Some(bind.into());
        self
    }

    /// Set candidate list override
    #[must_use]
    pub fn with_models(mut self, models: impl Into<String>) -> Self {
        self.models = Some(models.into());
        self
    }

    /// Set failure threshold override
    #[must_use]
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = Some(threshold);
        self
    }

    /// Set profile file override
    #[must_use]
    pub fn with_profile_path(mut self, path: PathBuf) -> Self {
        self.profile_path = Some(path);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut BiochatConfig) {
        if self.port.is_some()
            || self.bind.is_some()
            || self.models.is_some()
            || self.failure_threshold.is_some()
            || self.profile_path.is_some()
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(ref bind) = self.bind {
            config.bind = bind.clone();
        }
        if let Some(ref models) = self.models {
            config.candidates = models.split(',').map(|m| m.trim().to_string()).collect();
        }
        if let Some(threshold) = self.failure_threshold {
            config.failure_threshold = threshold;
        }
        if let Some(ref path) = self.profile_path {
            config.profile_path = Some(path.clone());
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
