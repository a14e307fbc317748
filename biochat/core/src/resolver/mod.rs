//! Model Resolution
//!
//! Finds the first usable model in an ordered candidate list, caches it, and
//! routes generation through it.
//!
//! # Lifecycle
//!
//! ```text
//!              resolve()                    pass ok
//! Unresolved ───────────> Resolving ──────────────────> Resolved(model)
//!     ^                       │                              │
//!     │        every probe    │                              │ invalidate()
//!     └─────── failed ────────┘                              │ or repeated
//!     ^                                                      │ generate failures
//!     └──────────────────────────────────────────────────────┘
//! ```
//!
//! A failed pass caches nothing, so the next call probes the whole list
//! again. There is no permanent failure state.
//!
//! # Concurrency
//!
//! At most one resolution pass runs at a time. Callers that arrive while a
//! pass is running wait for it and share its outcome instead of probing the
//! candidates themselves. Reads of the cached model never wait on a pass.

mod candidates;
mod strategy;

#[cfg(test)]
pub(crate) mod test_utils;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::{Mutex as SyncMutex, RwLock};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

pub use candidates::{CandidateError, CandidateModels};
pub use strategy::{ModelProbe, ProbeTrail, SelectionStrategy, SequentialFallback};

use crate::backend::{GenerateRequest, GenerateResponse, TextBackend};
use crate::error::{BackendError, GenerationError, NoUsableModel};

/// Default time budget for a single probe
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(8);

/// Default time budget for a single generation call
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of consecutive generate failures that invalidate the cache
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

// ============================================================================
// Configuration
// ============================================================================

/// Resolver tuning
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Time budget per probe
    pub probe_timeout: Duration,
    /// Time budget per generation call
    pub request_timeout: Duration,
    /// Consecutive model-health failures before the cached model is dropped
    /// (0 = never drop automatically)
    pub failure_threshold: u32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
        }
    }
}

impl ResolverConfig {
    /// Set the probe timeout
    #[must_use]
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Set the generation timeout
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the failure threshold (0 disables automatic invalidation)
    #[must_use]
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }
}

// ============================================================================
// Resolution Results
// ============================================================================

/// The model chosen by a successful resolution pass
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedModel {
    /// Upstream model identifier
    pub model_id: String,
    /// Position in the candidate list (0 = most preferred)
    pub position: usize,
    /// Probes issued by the pass that chose it
    pub probes: usize,
    /// When the pass finished
    pub resolved_at: Instant,
}

impl ResolvedModel {
    /// Record a model chosen at `position` after `probes` probes
    pub fn new(model_id: impl Into<String>, position: usize, probes: usize) -> Self {
        Self {
            model_id: model_id.into(),
            position,
            probes,
            resolved_at: Instant::now(),
        }
    }

    /// Whether a less preferred candidate had to be used
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.position > 0
    }
}

/// Observable resolver state
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "model", rename_all = "snake_case")]
pub enum ResolverState {
    /// No model cached and no pass running
    Unresolved,
    /// A pass is running
    Resolving,
    /// A model is cached
    Resolved(String),
}

/// Counters since the resolver was created
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ResolverStats {
    /// Probes sent upstream
    pub probes_issued: u64,
    /// Passes that found a model
    pub resolutions: u64,
    /// Passes where every candidate failed
    pub failed_resolutions: u64,
    /// Times a cached model was dropped
    pub invalidations: u64,
    /// Successful generation calls
    pub generations: u64,
    /// Failed generation calls (including resolution failures)
    pub failed_generations: u64,
    /// Current run of model-health failures on the cached model
    pub consecutive_failures: u32,
}

#[derive(Debug, Default)]
struct Counters {
    probes_issued: AtomicU64,
    resolutions: AtomicU64,
    failed_resolutions: AtomicU64,
    invalidations: AtomicU64,
    generations: AtomicU64,
    failed_generations: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

// ============================================================================
// Model Resolver
// ============================================================================

/// Caches the first usable candidate model and generates through it
///
/// Share one instance per process behind an [`Arc`].
///
/// # Example
///
/// ```ignore
/// let resolver = ModelResolver::new(backend, candidates, ResolverConfig::default());
/// let reply = resolver.generate("User: hi\nAssistant:").await?;
/// ```
pub struct ModelResolver {
    backend: Arc<dyn TextBackend>,
    strategy: Box<dyn SelectionStrategy>,
    config: ResolverConfig,
    /// Cached model; read on every request
    cache: RwLock<Option<ResolvedModel>>,
    /// Held for the duration of a pass; remembers the last pass failure
    gate: Mutex<Option<NoUsableModel>>,
    /// Completed passes
    epoch: AtomicU64,
    resolving: AtomicBool,
    failures: SyncMutex<FailureRun>,
    counters: Counters,
}

impl ModelResolver {
    /// Create a resolver that probes `candidates` in order
    pub fn new(
        backend: Arc<dyn TextBackend>,
        candidates: CandidateModels,
        config: ResolverConfig,
    ) -> Self {
        Self::with_strategy(backend, SequentialFallback::new(candidates), config)
    }

    /// Create a resolver with a custom selection strategy
    pub fn with_strategy(
        backend: Arc<dyn TextBackend>,
        strategy: impl SelectionStrategy + 'static,
        config: ResolverConfig,
    ) -> Self {
        Self {
            backend,
            strategy: Box::new(strategy),
            config,
            cache: RwLock::new(None),
            gate: Mutex::new(None),
            epoch: AtomicU64::new(0),
            resolving: AtomicBool::new(false),
            failures: SyncMutex::new(FailureRun::default()),
            counters: Counters::default(),
        }
    }

    /// Return the cached model, running a resolution pass if there is none
    ///
    /// Concurrent callers share a single pass. A caller that waited on a pass
    /// which failed gets that pass's failure rather than starting another.
    ///
    /// # Errors
    ///
    /// [`NoUsableModel`] when every candidate failed its probe. Nothing is
    /// cached in that case; the next call probes again from the top.
    pub async fn resolve(&self) -> Result<ResolvedModel, NoUsableModel> {
        if let Some(resolved) = self.resolved_model() {
            return Ok(resolved);
        }

        let observed_epoch = self.epoch.load(Ordering::Acquire);
        let mut last_failure = self.gate.lock().await;

        // A pass may have finished while we waited
        if let Some(resolved) = self.resolved_model() {
            return Ok(resolved);
        }
        if self.epoch.load(Ordering::Acquire) != observed_epoch {
            if let Some(failure) = last_failure.as_ref() {
                debug!("Sharing outcome of concurrent resolution pass");
                return Err(failure.clone());
            }
        }

        let _resolving = ResolvingFlag::raise(&self.resolving);
        info!(candidates = %self.strategy.candidates(), "Resolving model");

        let probe = TimedProbe {
            backend: self.backend.as_ref(),
            timeout: self.config.probe_timeout,
            counters: &self.counters,
        };
        let outcome = self.strategy.select(&probe).await;

        match &outcome {
            Ok(resolved) => {
                *self.cache.write() = Some(resolved.clone());
                self.failures.lock().clear();
                *last_failure = None;
                Counters::bump(&self.counters.resolutions);
                if resolved.is_fallback() {
                    warn!(
                        model = %resolved.model_id,
                        position = resolved.position,
                        probes = resolved.probes,
                        "Resolved to fallback model"
                    );
                } else {
                    info!(model = %resolved.model_id, probes = resolved.probes, "Resolved model");
                }
            }
            Err(failure) => {
                *last_failure = Some(failure.clone());
                Counters::bump(&self.counters.failed_resolutions);
                error!(
                    tried = failure.tried.len(),
                    last_error = %failure.last_error,
                    "No usable model found"
                );
            }
        }

        self.epoch.fetch_add(1, Ordering::AcqRel);
        outcome
    }

    /// Generate a reply for a fully assembled prompt
    ///
    /// # Errors
    ///
    /// A [`GenerationError`] classified from the resolution or upstream
    /// failure.
    pub async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.generate_detailed(prompt).await.map(|response| response.text)
    }

    /// Like [`generate`](Self::generate) but returns the full response
    ///
    /// # Errors
    ///
    /// See [`generate`](Self::generate).
    #[instrument(skip(self, prompt), fields(prompt_chars = prompt.chars().count()))]
    pub async fn generate_detailed(&self, prompt: &str) -> Result<GenerateResponse, GenerationError> {
        let resolved = match self.resolve().await {
            Ok(resolved) => resolved,
            Err(failure) => {
                Counters::bump(&self.counters.failed_generations);
                return Err(failure.into());
            }
        };

        let timeout = self.config.request_timeout;
        let request = GenerateRequest::new(&resolved.model_id, prompt).with_timeout(timeout);
        let result = match tokio::time::timeout(timeout, self.backend.generate(&request)).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::timeout(timeout)),
        };

        match result {
            Ok(response) => {
                self.failures.lock().clear_for(&resolved.model_id);
                Counters::bump(&self.counters.generations);
                debug!(model = %resolved.model_id, duration_ms = response.duration_ms, "Generation succeeded");
                Ok(response)
            }
            Err(err) => {
                Counters::bump(&self.counters.failed_generations);
                warn!(model = %resolved.model_id, kind = %err.kind, error = %err.message, "Generation failed");
                self.record_failure(&resolved.model_id, &err);
                Err(GenerationError::from_backend(err, resolved.model_id))
            }
        }
    }

    /// Cached model id, without resolving
    #[must_use]
    pub fn resolved(&self) -> Option<String> {
        self.cache.read().as_ref().map(|r| r.model_id.clone())
    }

    /// Cached model with resolution details, without resolving
    #[must_use]
    pub fn resolved_model(&self) -> Option<ResolvedModel> {
        self.cache.read().clone()
    }

    /// Drop the cached model; the next call re-resolves
    ///
    /// Returns the model that was dropped, if any.
    pub fn invalidate(&self) -> Option<String> {
        let dropped = self.cache.write().take();
        self.failures.lock().clear();
        if let Some(resolved) = &dropped {
            Counters::bump(&self.counters.invalidations);
            info!(model = %resolved.model_id, "Resolved model invalidated");
        }
        dropped.map(|r| r.model_id)
    }

    /// Invalidate and immediately run a fresh pass
    ///
    /// # Errors
    ///
    /// See [`resolve`](Self::resolve).
    pub async fn reresolve(&self) -> Result<ResolvedModel, NoUsableModel> {
        self.invalidate();
        self.resolve().await
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> ResolverState {
        if let Some(model) = self.resolved() {
            ResolverState::Resolved(model)
        } else if self.resolving.load(Ordering::Acquire) {
            ResolverState::Resolving
        } else {
            ResolverState::Unresolved
        }
    }

    /// Snapshot of the counters
    #[must_use]
    pub fn stats(&self) -> ResolverStats {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        ResolverStats {
            probes_issued: load(&self.counters.probes_issued),
            resolutions: load(&self.counters.resolutions),
            failed_resolutions: load(&self.counters.failed_resolutions),
            invalidations: load(&self.counters.invalidations),
            generations: load(&self.counters.generations),
            failed_generations: load(&self.counters.failed_generations),
            consecutive_failures: self.failures.lock().count,
        }
    }

    /// Candidate list in preference order
    #[must_use]
    pub fn candidates(&self) -> &CandidateModels {
        self.strategy.candidates()
    }

    /// Resolver tuning
    #[must_use]
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Name of the upstream backend
    #[must_use]
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    fn record_failure(&self, model: &str, err: &BackendError) {
        let threshold = self.config.failure_threshold;
        if threshold == 0 || !err.kind.counts_against_model() {
            return;
        }

        let mut cache = self.cache.write();
        // Failures from a model that was already replaced do not count
        if !cache.as_ref().is_some_and(|r| r.model_id == model) {
            debug!(model, "Ignoring failure from a model that is no longer resolved");
            return;
        }

        let mut run = self.failures.lock();
        let failures = run.record(model);
        if failures < threshold {
            return;
        }

        *cache = None;
        run.clear();
        drop(run);
        drop(cache);
        Counters::bump(&self.counters.invalidations);
        warn!(model, failures, "Dropping resolved model after repeated failures");
    }
}

impl std::fmt::Debug for ModelResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelResolver")
            .field("backend", &self.backend.name())
            .field("candidates", self.strategy.candidates())
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Internals
// ============================================================================

/// Probe adapter that enforces the probe timeout and counts probes
struct TimedProbe<'a> {
    backend: &'a dyn TextBackend,
    timeout: Duration,
    counters: &'a Counters,
}

#[async_trait]
impl<'a> ModelProbe for TimedProbe<'a> {
    async fn probe(&self, model: &str) -> Result<(), BackendError> {
        Counters::bump(&self.counters.probes_issued);
        match tokio::time::timeout(self.timeout, self.backend.probe(model)).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::timeout(self.timeout)),
        }
    }
}

/// Consecutive model-health failures, tied to the model they happened on
#[derive(Debug, Default)]
struct FailureRun {
    model: Option<String>,
    count: u32,
}

impl FailureRun {
    /// Count a failure on `model`, starting a new run if the model changed
    fn record(&mut self, model: &str) -> u32 {
        if self.model.as_deref() != Some(model) {
            self.model = Some(model.to_string());
            self.count = 0;
        }
        self.count += 1;
        self.count
    }

    /// End the run if it belongs to `model`
    fn clear_for(&mut self, model: &str) {
        if self.model.as_deref() == Some(model) {
            self.clear();
        }
    }

    fn clear(&mut self) {
        self.model = None;
        self.count = 0;
    }
}

/// Sets the resolving flag for its lifetime, including on cancellation
struct ResolvingFlag<'a>(&'a AtomicBool);

impl<'a> ResolvingFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for ResolvingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ============================================================================
// Tests
// ============================================================================
