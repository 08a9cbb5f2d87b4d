//! Shared harness state and per-cell execution helpers.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::Serialize;

use omx_core::{
    scenario_seed, Engine, ErrorInfo, ExperimentConfig, InstanceData, MatchOutcome,
    ModelRegistry, ObservationData, ObservationMatcher, ObservationTypeRegistry, OmxError,
    RunRecord, VariantRegistry, PHASE_MATCHING,
};

use crate::store::RunLogStore;

/// Everything an experiment matrix needs: the engine seam, the registries
/// (constructed once at startup, held by reference), the base
/// configuration, and the directory layout.
///
/// Execution is single-threaded; the only state shared between cells is the
/// per-model prepared model, which is dropped before the next model starts.
pub struct Harness<'a, E: Engine> {
    /// External engine collaborators.
    pub engine: &'a E,
    /// Models under test, iterated in registry order.
    pub models: &'a ModelRegistry,
    /// Matcher-variant layers.
    pub variants: &'a VariantRegistry,
    /// Observation-type layers.
    pub observation_types: &'a ObservationTypeRegistry,
    /// Base configuration every cell layers on top of.
    pub base_config: ExperimentConfig,
    /// Root directory for temporary model/trace artifacts.
    pub output_root: PathBuf,
    /// Run-log persistence.
    pub store: RunLogStore,
}

impl<'a, E: Engine> Harness<'a, E> {
    /// Assembles a harness over the given collaborators and directories.
    pub fn new(
        engine: &'a E,
        models: &'a ModelRegistry,
        variants: &'a VariantRegistry,
        observation_types: &'a ObservationTypeRegistry,
        base_config: ExperimentConfig,
        output_root: impl Into<PathBuf>,
        log_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            engine,
            models,
            variants,
            observation_types,
            base_config,
            output_root: output_root.into(),
            store: RunLogStore::new(log_root),
        }
    }

    /// The master seed all scenario substreams derive from.
    pub fn master_seed(&self) -> u64 {
        self.base_config.run.master_seed
    }

    /// Wall-clock budget for one matching attempt.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.base_config.run.timeout_secs)
    }
}

/// A model loaded and preprocessed once, reused across the whole inner
/// loop of its experiment (loading is expensive and model-invariant).
pub struct PreparedModel<M> {
    /// Model name (file stem).
    pub name: String,
    /// Preprocessed in-memory model.
    pub model: M,
    /// Structural instance data of the model.
    pub instance: InstanceData,
}

/// Loads, extracts, and preprocesses the model named by `config.paths`.
pub fn prepare_model<E: Engine>(
    engine: &E,
    config: &ExperimentConfig,
) -> Result<PreparedModel<E::Model>, OmxError> {
    config.paths.ensure_directories()?;
    let name = config
        .paths
        .original_model_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "model".to_string());
    let input = engine.load_model(&config.paths.original_model_file)?;
    let instance = engine.instance_data(&input, config)?;
    let model = engine.preprocess(&input, &instance, config)?;
    Ok(PreparedModel {
        name,
        model,
        instance,
    })
}

/// Runs one matching attempt, recording the elapsed wall-clock time under
/// the `matching` phase regardless of the outcome, and folds the outcome
/// flags into the record.
pub fn timed_match(
    matcher: &mut dyn ObservationMatcher,
    observation: &ObservationData,
    return_trace: bool,
    record: &mut RunRecord,
) -> Result<MatchOutcome, OmxError> {
    let started = Instant::now();
    let result = matcher.match_observation(observation, return_trace);
    record
        .durations
        .insert(PHASE_MATCHING.to_string(), started.elapsed().as_secs_f64());
    let outcome = result?;
    record.is_matching = outcome.is_matching;
    record.is_timeout = outcome.is_timeout;
    Ok(outcome)
}

/// Derives the substream seed for scenario `minor` of model `major`.
pub fn substream(master_seed: u64, major: u64, minor: u64) -> u64 {
    scenario_seed(scenario_seed(master_seed, major), minor)
}

/// Builds an invariant-violation error carrying the full diagnostic
/// context of the offending cell.
pub fn invariant(
    code: &str,
    message: &str,
    model: &str,
    scenario: &str,
    run_idx: usize,
) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_context("model", model.to_string())
        .with_context("scenario", scenario.to_string())
        .with_context("run", run_idx.to_string())
}

/// Renders a payload as compact JSON for diagnostic context entries.
pub fn json_context<T: Serialize>(payload: &T) -> String {
    serde_json::to_string(payload).unwrap_or_else(|_| "<unserializable>".to_string())
}
