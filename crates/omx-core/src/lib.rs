//! Core types and collaborator seams for the OMX observation-matcher
//! experiment harness.

/// Typed configuration, override layers, and variant registries.
pub mod config;
/// Seams to the external matching engine.
pub mod engine;
/// Structured error payloads and the canonical error enum.
pub mod errors;
/// Stable hashing of serializable payloads.
pub mod hash;
/// Model descriptors and the model registry.
pub mod model;
/// Observation datasets.
pub mod observation;
/// Per-cell run records.
pub mod record;
/// Deterministic substream seed derivation.
pub mod seeds;
/// Min/max/average summaries.
pub mod summary;
/// Transition traces and the inclusion check.
pub mod trace;

pub use config::{
    apply_layers, base_matcher_layer, base_observation_layer, full_matcher_layer,
    full_observation_layer, ConfigLayer, EngineOptions, ExperimentConfig, GenerationOptions,
    MatcherOptions, ObservationTypeRegistry, PathOptions, RunOptions, TransitionTimes,
    VariantRegistry,
};
pub use engine::{
    Engine, MatchOutcome, ObservationMatcher, ObservationSource, ReplayOutcome, TraceSimulator,
};
pub use errors::{ErrorInfo, OmxError};
pub use hash::stable_hash_string;
pub use model::{InstanceData, ModelDescriptor, ModelRegistry};
pub use observation::{ObservationData, ObservationPoint};
pub use record::{RunRecord, PHASE_MATCHING};
pub use seeds::scenario_seed;
pub use summary::{summarize, summarize_records, MinMaxAvg, Summary};
pub use trace::{Trace, Transition};
