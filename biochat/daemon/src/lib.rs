//! biochat Daemon - HTTP surface for the biochat chat service
//!
//! The binary in `main.rs` loads configuration, builds the Gemini backend and
//! model resolver from `biochat-core`, and serves [`router`]. The router is
//! exposed here so integration tests can drive it without a socket.

pub mod error;
pub mod server;

pub use error::ApiError;
pub use server::{router, AppState, ChatRequest, SELF_TEST_PROMPT};
