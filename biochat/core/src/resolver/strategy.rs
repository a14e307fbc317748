//! Model Selection Strategies
//!
//! A strategy owns the ordered candidate list and decides, given a probe
//! capability, which candidate becomes the resolved model.
//!
//! ```text
//! probe(gemini-1.5-flash) fails
//!         |
//!         v
//! probe(gemini-1.5-pro) fails
//!         |
//!         v
//! probe(gemini-pro) ok  -->  ResolvedModel { gemini-pro, position 2, probes 3 }
//! ```

use async_trait::async_trait;
use tracing::{debug, warn};

use super::candidates::CandidateModels;
use super::ResolvedModel;
use crate::error::{BackendError, ErrorKind, NoUsableModel};

/// Capability to test whether a single model is usable
#[async_trait]
pub trait ModelProbe: Send + Sync {
    /// Issue one probe against `model`
    async fn probe(&self, model: &str) -> Result<(), BackendError>;
}

/// Policy that turns a candidate list into a resolved model
#[async_trait]
pub trait SelectionStrategy: Send + Sync {
    /// Candidates this strategy chooses from
    fn candidates(&self) -> &CandidateModels;

    /// Run one selection pass
    async fn select(&self, probe: &dyn ModelProbe) -> Result<ResolvedModel, NoUsableModel>;
}

// ============================================================================
// Sequential Fallback
// ============================================================================

/// Probe candidates one at a time in preference order; first success wins
///
/// Probing is never parallel so a rate-limited upstream is not hit with one
/// request per candidate at once.
#[derive(Clone, Debug)]
pub struct SequentialFallback {
    candidates: CandidateModels,
}

impl SequentialFallback {
    /// Create a strategy over `candidates`
    #[must_use]
    pub fn new(candidates: CandidateModels) -> Self {
        Self { candidates }
    }
}

#[async_trait]
impl SelectionStrategy for SequentialFallback {
    fn candidates(&self) -> &CandidateModels {
        &self.candidates
    }

    async fn select(&self, probe: &dyn ModelProbe) -> Result<ResolvedModel, NoUsableModel> {
        let mut trail = ProbeTrail::default();

        for (position, model) in self.candidates.iter().enumerate() {
            debug!(model, position, "Probing candidate model");
            match probe.probe(model).await {
                Ok(()) => {
                    return Ok(ResolvedModel::new(model, position, trail.attempts() + 1));
                }
                Err(err) => {
                    warn!(model, position, kind = %err.kind, error = %err.message, "Candidate probe failed");
                    trail.record(model, err);
                }
            }
        }

        Err(trail.into_failure())
    }
}

// ============================================================================
// Probe Trail
// ============================================================================

/// Models probed during one pass, in order, with the last failure
#[derive(Clone, Debug, Default)]
pub struct ProbeTrail {
    tried: Vec<String>,
    last_error: Option<BackendError>,
}

impl ProbeTrail {
    /// Record a failed probe
    pub fn record(&mut self, model: impl Into<String>, error: BackendError) {
        self.tried.push(model.into());
        self.last_error = Some(error);
    }

    /// Number of failed probes so far
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.tried.len()
    }

    /// Convert the trail of an exhausted pass into its failure
    #[must_use]
    pub fn into_failure(self) -> NoUsableModel {
        NoUsableModel {
            tried: self.tried,
            last_error: self
                .last_error
                .unwrap_or_else(|| BackendError::new(ErrorKind::Unknown, "no candidate was probed")),
        }
    }
}
