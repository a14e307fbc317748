//! Scripted Backend for Resolver Tests
//!
//! A [`TextBackend`] whose probe and generate outcomes are scripted per model.
//! Every call is recorded so tests can assert exactly which models were hit
//! and in what order.
//!
//! ```ignore
//! let backend = ScriptedBackend::new()
//!     .with_probe("m-a", Outcome::fail("quota exceeded"))
//!     .with_probe_delay(Duration::from_millis(50));
//!
//! // m-a fails, m-b answers
//! assert_eq!(backend.probe_history(), vec!["m-a", "m-b"]);
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::strategy::ModelProbe;
use crate::backend::{GenerateRequest, GenerateResponse, TextBackend};
use crate::error::{BackendError, ErrorKind};

/// Scripted result of one call
#[derive(Clone, Debug)]
pub enum Outcome {
    /// Succeed (generate returns the text)
    Ok(String),
    /// Fail with this error
    Fail(BackendError),
    /// Never answer
    Hang,
}

impl Outcome {
    /// Success with `text`
    pub fn ok(text: impl Into<String>) -> Self {
        Self::Ok(text.into())
    }

    /// Failure classified from free text
    pub fn fail(message: &str) -> Self {
        Self::Fail(BackendError::from_message(message))
    }

    /// Failure with an explicit kind
    pub fn error(kind: ErrorKind, message: &str) -> Self {
        Self::Fail(BackendError::new(kind, message))
    }
}

/// One recorded call
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    /// `probe(model)`
    Probe(String),
    /// `generate` against model with prompt
    Generate { model: String, prompt: String },
}

#[derive(Debug, Default)]
struct Script {
    probes: HashMap<String, Outcome>,
    generates: HashMap<String, Outcome>,
    queued_generates: HashMap<String, VecDeque<Outcome>>,
}

/// Backend with per-model scripted outcomes and call history
///
/// Unscripted models succeed: probes pass and generate answers
/// `"reply from {model}"`. Clones share script and history.
#[derive(Clone, Debug, Default)]
pub struct ScriptedBackend {
    script: Arc<Mutex<Script>>,
    history: Arc<Mutex<Vec<Call>>>,
    probe_delay: Option<Duration>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the probe outcome for `model`
    pub fn with_probe(self, model: &str, outcome: Outcome) -> Self {
        self.set_probe(model, outcome);
        self
    }

    /// Script the persistent generate outcome for `model`
    pub fn with_generate(self, model: &str, outcome: Outcome) -> Self {
        self.set_generate(model, outcome);
        self
    }

    /// Delay every probe by `delay` before answering
    pub fn with_probe_delay(mut self, delay: Duration) -> Self {
        self.probe_delay = Some(delay);
        self
    }

    /// Change the probe outcome for `model` mid-test
    pub fn set_probe(&self, model: &str, outcome: Outcome) {
        self.script.lock().probes.insert(model.to_string(), outcome);
    }

    /// Change the persistent generate outcome for `model` mid-test
    pub fn set_generate(&self, model: &str, outcome: Outcome) {
        self.script.lock().generates.insert(model.to_string(), outcome);
    }

    /// Queue a one-shot generate outcome, used before the persistent one
    pub fn push_generate(&self, model: &str, outcome: Outcome) {
        self.script
            .lock()
            .queued_generates
            .entry(model.to_string())
            .or_default()
            .push_back(outcome);
    }

    /// Every recorded call, in order
    pub fn calls(&self) -> Vec<Call> {
        self.history.lock().clone()
    }

    /// Models probed, in order
    pub fn probe_history(&self) -> Vec<String> {
        self.history
            .lock()
            .iter()
            .filter_map(|call| match call {
                Call::Probe(model) => Some(model.clone()),
                Call::Generate { .. } => None,
            })
            .collect()
    }

    /// Models that received a generate call, in order
    pub fn generate_history(&self) -> Vec<String> {
        self.history
            .lock()
            .iter()
            .filter_map(|call| match call {
                Call::Generate { model, .. } => Some(model.clone()),
                Call::Probe(_) => None,
            })
            .collect()
    }

    /// Total number of probes
    pub fn probe_count(&self) -> usize {
        self.probe_history().len()
    }

    /// Total number of upstream calls of any kind
    pub fn call_count(&self) -> usize {
        self.history.lock().len()
    }

    fn next_generate(&self, model: &str) -> Outcome {
        let mut script = self.script.lock();
        if let Some(outcome) = script
            .queued_generates
            .get_mut(model)
            .and_then(VecDeque::pop_front)
        {
            return outcome;
        }
        script
            .generates
            .get(model)
            .cloned()
            .unwrap_or_else(|| Outcome::ok(format!("reply from {model}")))
    }
}

async fn settle(outcome: Outcome) -> Result<String, BackendError> {
    match outcome {
        Outcome::Ok(text) => Ok(text),
        Outcome::Fail(err) => Err(err),
        Outcome::Hang => std::future::pending().await,
    }
}

#[async_trait]
impl TextBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "Scripted"
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, BackendError> {
        self.history.lock().push(Call::Generate {
            model: request.model.clone(),
            prompt: request.prompt.clone(),
        });
        let outcome = self.next_generate(&request.model);
        let text = settle(outcome).await?;
        Ok(GenerateResponse {
            text,
            model: request.model.clone(),
            finish_reason: Some("STOP".to_string()),
            tokens_used: None,
            duration_ms: 0,
        })
    }

    async fn probe(&self, model: &str) -> Result<(), BackendError> {
        self.history.lock().push(Call::Probe(model.to_string()));
        if let Some(delay) = self.probe_delay {
            tokio::time::sleep(delay).await;
        }
        let outcome = self
            .script
            .lock()
            .probes
            .get(model)
            .cloned()
            .unwrap_or_else(|| Outcome::ok("ok"));
        settle(outcome).await.map(|_| ())
    }
}

#[async_trait]
impl ModelProbe for ScriptedBackend {
    async fn probe(&self, model: &str) -> Result<(), BackendError> {
        TextBackend::probe(self, model).await
    }
}
