//! Upstream Backend Integration
//!
//! Abstracted access to the text-generation service through a common trait.
//!
//! # Available Backends
//!
//! - **Gemini**: Google Generative Language API (default)
//!
//! # Usage
//!
//! ```ignore
//! use biochat_core::backend::{GeminiBackend, GeminiConfig, GenerateRequest, TextBackend};
//!
//! let backend = GeminiBackend::new(GeminiConfig::new(api_key))?;
//! let response = backend.generate(&GenerateRequest::new("gemini-1.5-flash", "Hello")).await?;
//! ```

mod gemini;
mod traits;

pub use gemini::{error_from_status, GeminiBackend, GeminiConfig, DEFAULT_BASE_URL};
pub use traits::{
    GenerateRequest, GenerateResponse, TextBackend, PROBE_MAX_OUTPUT_TOKENS, PROBE_PROMPT,
};
