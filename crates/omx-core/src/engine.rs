//! Seams to the external model-matching engine.
//!
//! The harness never looks inside the engine: models are opaque, matching
//! is a black box bounded by a timeout, and replay validation happens on
//! the engine's side of the fence. Every collaborator is reached through
//! one of the traits below.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ExperimentConfig;
use crate::errors::OmxError;
use crate::model::InstanceData;
use crate::observation::ObservationData;
use crate::trace::Trace;

/// Result of one matching attempt.
///
/// `is_timeout == true` means the search was inconclusive; assertions must
/// never read it as a negative result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchOutcome {
    /// Whether a consistent execution trace exists.
    pub is_matching: bool,
    /// Whether the search hit its wall-clock budget first.
    pub is_timeout: bool,
    /// The matched trace, when one was requested and found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matching_trace: Option<Trace>,
}

/// Result of replaying a matched trace on the original model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayOutcome {
    /// Whether the edge sequence replayed successfully.
    pub is_simulated: bool,
    /// Whether the candidate trace is included in the replayed trace.
    pub is_included: bool,
    /// The full replayed trace, kept for diagnostics.
    pub simulated_trace: Trace,
}

/// Produces synthetic observation datasets for a prepared model.
pub trait ObservationSource {
    /// Generates a dataset consistent with some real execution.
    fn generate(&mut self) -> Result<ObservationData, OmxError>;

    /// Generates a dataset guaranteed to contradict the model's dynamics.
    fn generate_negative(&mut self) -> Result<ObservationData, OmxError>;
}

/// Decides whether an execution trace consistent with an observation
/// dataset exists, bounded by the timeout fixed at construction.
pub trait ObservationMatcher {
    /// Builds or refreshes the matcher model ahead of repeated queries.
    fn prepare(&mut self) -> Result<(), OmxError>;

    /// Runs one matching attempt. Timeouts are reported through the
    /// outcome, never as an error.
    fn match_observation(
        &mut self,
        observation: &ObservationData,
        return_trace: bool,
    ) -> Result<MatchOutcome, OmxError>;
}

/// Replays edge sequences on the original model.
pub trait TraceSimulator {
    /// Replays `edge_trace` and reports whether `candidate` is included in
    /// the replayed trace.
    fn replay(
        &mut self,
        edge_trace: &[Vec<String>],
        candidate: &Trace,
    ) -> Result<ReplayOutcome, OmxError>;
}

/// Factory for the engine-side collaborators of one model.
pub trait Engine {
    /// Opaque in-memory model representation.
    type Model;

    /// Parses a model description file.
    fn load_model(&self, path: &Path) -> Result<Self::Model, OmxError>;

    /// Extracts structural instance data from a loaded model.
    fn instance_data(
        &self,
        model: &Self::Model,
        config: &ExperimentConfig,
    ) -> Result<InstanceData, OmxError>;

    /// Produces the preprocessed model the generator and matcher operate on.
    fn preprocess(
        &self,
        model: &Self::Model,
        instance: &InstanceData,
        config: &ExperimentConfig,
    ) -> Result<Self::Model, OmxError>;

    /// Creates a seeded observation generator for a prepared model.
    fn observation_generator(
        &self,
        config: &ExperimentConfig,
        model: &Self::Model,
        seed: u64,
    ) -> Result<Box<dyn ObservationSource>, OmxError>;

    /// Creates a matcher for the named variant, bounded by `timeout`.
    fn matcher(
        &self,
        config: &ExperimentConfig,
        model: &Self::Model,
        instance: &InstanceData,
        variant: &str,
        timeout: Duration,
    ) -> Result<Box<dyn ObservationMatcher>, OmxError>;

    /// Creates a trace simulator replaying on the original model.
    fn simulator(
        &self,
        config: &ExperimentConfig,
        model: &Self::Model,
        instance: &InstanceData,
    ) -> Result<Box<dyn TraceSimulator>, OmxError>;
}
