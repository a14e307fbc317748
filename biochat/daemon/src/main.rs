//! biochat Daemon - Profile Chat Server
//!
//! Serves the chat endpoint backed by a Gemini model chosen at runtime from
//! an ordered candidate list.
//!
//! # Usage
//!
//! ```bash
//! # Start with defaults (port 5000)
//! GEMINI_API_KEY=... biochat-daemon
//!
//! # Custom port and candidate models
//! biochat-daemon --port 8080 --models gemini-1.5-flash,gemini-pro
//!
//! # With config file
//! biochat-daemon --config /etc/biochat/biochat.toml
//!
//! # Verbose logging
//! RUST_LOG=debug biochat-daemon
//! ```
//!
//! # Signals
//!
//! - `SIGTERM` / `SIGINT`: Graceful shutdown

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use biochat_core::backend::GeminiBackend;
use biochat_core::config::{self, ConfigOverrides, API_KEY_ENV};
use biochat_core::{ChatService, ModelResolver, ProfileContext};
use biochat_daemon::{router, AppState};

/// biochat Daemon - chat endpoint over a resilient Gemini model resolver
#[derive(Parser, Debug)]
#[command(name = "biochat-daemon")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, env = "BIOCHAT_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// Address to bind
    #[arg(short = 'b', long, value_name = "ADDR")]
    bind: Option<String>,

    /// Candidate models, most preferred first (comma separated)
    #[arg(short = 'm', long, value_name = "LIST")]
    models: Option<String>,

    /// Consecutive failures before the resolved model is dropped (0 = never)
    #[arg(long, value_name = "N")]
    failure_threshold: Option<u32>,

    /// Profile context file
    #[arg(long, value_name = "FILE")]
    profile: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "BIOCHAT_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        if let Some(port) = self.port {
            overrides = overrides.with_port(port);
        }
        if let Some(ref bind) = self.bind {
            overrides = overrides.with_bind(bind.clone());
        }
        if let Some(ref models) = self.models {
            overrides = overrides.with_models(models.clone());
        }
        if let Some(threshold) = self.failure_threshold {
            overrides = overrides.with_failure_threshold(threshold);
        }
        if let Some(ref path) = self.profile {
            overrides = overrides.with_profile_path(path.clone());
        }
        overrides
    }
}

/// Initialize logging with the specified level
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("biochat_daemon={level},biochat_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

/// Resolve once SIGINT or SIGTERM arrives
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    info!("biochat daemon starting");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config_path = args.config.clone().or_else(config::default_config_path);
    let mut config = config::load_config_from_path(config_path).context("Failed to load configuration")?;
    args.overrides().apply(&mut config);
    info!(source = %config.source(), "Configuration loaded");

    let gemini = config
        .gemini_config()
        .with_context(|| format!("{API_KEY_ENV} missing; set it with: export {API_KEY_ENV}='your-key-here'"))?;
    info!(length = gemini.api_key.len(), "API key found");

    let candidates = config.candidate_models().context("Invalid candidate model list")?;
    let profile = ProfileContext::load(config.profile_path.as_deref()).context("Failed to load profile context")?;

    let backend = GeminiBackend::new(gemini).context("Failed to build HTTP client")?;
    let resolver = Arc::new(ModelResolver::new(
        Arc::new(backend),
        candidates,
        config.resolver_config(),
    ));
    info!(candidates = %resolver.candidates(), base_url = %config.base_url, "Model resolver ready");

    // Resolve in the background so the first chat usually hits a warm cache
    let warmup = Arc::clone(&resolver);
    tokio::spawn(async move {
        if let Err(e) = warmup.resolve().await {
            warn!(error = %e, "Startup model resolution failed; will retry on first request");
        }
    });

    let chat = ChatService::new(resolver, profile, config.max_message_chars);
    let state = AppState::new(chat, config.api_key.as_deref(), config.expose_error_detail);
    if config.expose_error_detail {
        warn!("Raw upstream error detail will be included in responses");
    }

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!(%addr, "Backend running");
    info!("Diagnostic endpoint: http://{addr}/diagnostic");
    info!("Test endpoint: http://{addr}/test-model");
    info!("Chat endpoint: POST http://{addr}/chat");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("biochat daemon stopped");
    Ok(())
}
