//! Experiment matrices, result store, and report exporters for the OMX
//! observation-matcher harness.

/// Nested per-scenario aggregation structures.
pub mod aggregate;
/// Fixed observation datasets for the variant comparison.
pub mod fixtures;
/// Per-experiment run manifests.
pub mod manifest;
/// Observation-type comparison matrix.
pub mod obs_types;
/// Deterministic reference engine used by tests and the demo CLI.
pub mod reference;
/// Named-task capability interface and registry.
pub mod registry;
/// Tabular and LaTeX report exporters.
pub mod report;
/// Shared harness state and per-cell helpers.
pub mod runner;
/// Run-log persistence.
pub mod store;
/// Observation-size and observation-extent sweeps.
pub mod sweeps;
/// Positive/negative validation matrix.
pub mod validation;
/// Matcher-variant comparison matrix.
pub mod variants;

pub use aggregate::{GroupedScenarioTable, ScenarioLog, ScenarioTable, ValidationLog};
pub use manifest::ExperimentManifest;
pub use reference::{ReferenceEngine, ReferenceModel};
pub use registry::{FnTask, Task, TaskRegistry};
pub use runner::{prepare_model, timed_match, Harness, PreparedModel};
pub use store::RunLogStore;
