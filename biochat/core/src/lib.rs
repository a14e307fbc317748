//! biochat Core - Resilient Model Resolution for a Profile Chat Service
//!
//! This crate holds everything the biochat HTTP service needs apart from the
//! HTTP layer itself: the upstream text-generation backend, the model
//! resolver that picks and caches a working upstream model, the error
//! taxonomy, configuration, and the chat handling operation.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                       biochat-daemon                          │
//! │              POST /chat   GET /diagnostic   ...               │
//! └──────────────────────────────┬────────────────────────────────┘
//!                                │ ChatService::handle
//! ┌──────────────────────────────┼────────────────────────────────┐
//! │                        BIOCHAT CORE                           │
//! │  ┌───────────┐   ┌───────────┴──────────┐   ┌──────────────┐  │
//! │  │  Profile  │──>│     ChatService      │   │    Config    │  │
//! │  └───────────┘   └───────────┬──────────┘   └──────────────┘  │
//! │                  ┌───────────┴──────────┐                     │
//! │                  │    ModelResolver     │                     │
//! │                  │  SequentialFallback  │                     │
//! │                  └───────────┬──────────┘                     │
//! │                  ┌───────────┴──────────┐                     │
//! │                  │ TextBackend (Gemini) │                     │
//! │                  └──────────────────────┘                     │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`ModelResolver`]: probes candidates in order, caches the first usable one
//! - [`TextBackend`]: upstream text-generation trait ([`GeminiBackend`] ships)
//! - [`ChatService`]: validates messages and builds prompts
//! - [`ErrorKind`]: classification that selects user-facing messages
//! - [`BiochatConfig`]: layered file/env/CLI configuration
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use biochat_core::{
//!     backend::{GeminiBackend, GeminiConfig},
//!     ChatService, ModelResolver, ProfileContext,
//! };
//!
//! let config = biochat_core::config::load_config()?;
//! let backend = Arc::new(GeminiBackend::new(config.gemini_config()?)?);
//! let resolver = ModelResolver::new(backend, config.candidate_models()?, config.resolver_config());
//! let chat = ChatService::new(Arc::new(resolver), ProfileContext::default(), config.max_message_chars);
//!
//! let reply = chat.handle(Some("What do you work on?")).await?;
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod chat;
pub mod config;
pub mod error;
pub mod profile;
pub mod resolver;

pub use backend::{GeminiBackend, GeminiConfig, GenerateRequest, GenerateResponse, TextBackend};
pub use chat::{build_prompt, ChatError, ChatReply, ChatService};
pub use config::{BiochatConfig, ConfigError, ConfigOverrides, ConfigSource};
pub use error::{classify, BackendError, ErrorKind, GenerationError, NoUsableModel};
pub use profile::ProfileContext;
pub use resolver::{
    CandidateError, CandidateModels, ModelResolver, ResolvedModel, ResolverConfig, ResolverState,
    ResolverStats, SelectionStrategy, SequentialFallback,
};
