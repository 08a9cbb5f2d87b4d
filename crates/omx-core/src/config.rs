//! Typed experiment configuration and override layering.
//!
//! A configuration is a record with named option families instead of a
//! free-form key/value map. Named override layers ([`ConfigLayer`]) are
//! applied with key-wise replacement: later layers win, map-valued options
//! are replaced wholesale, and the inputs are never mutated.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::errors::{ErrorInfo, OmxError};

/// Strategy used to pick concrete transition times during generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionTimes {
    /// Earliest admissible time per transition.
    Min,
    /// Latest admissible time per transition.
    Max,
    /// Seeded random time within the admissible window.
    Random,
}

impl Default for TransitionTimes {
    fn default() -> Self {
        TransitionTimes::Random
    }
}

/// Options consumed by the external engine itself (binary location and
/// scratch space). Carried through from the configuration file; the harness
/// never interprets them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EngineOptions {
    /// Engine installation root.
    #[serde(default)]
    pub root: PathBuf,
    /// Engine executable, usually given relative to `${root}`.
    #[serde(default)]
    pub command: PathBuf,
}

/// Filesystem layout for one model's experiment artifacts, derived
/// deterministically from the model file and the output root.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PathOptions {
    /// Root directory for all experiment outputs.
    #[serde(default)]
    pub output_dir: PathBuf,
    /// Scratch directory for intermediate artifacts.
    #[serde(default)]
    pub temp_dir: PathBuf,
    /// Directory receiving generated model files.
    #[serde(default)]
    pub model_output_dir: PathBuf,
    /// Directory receiving generated trace files.
    #[serde(default)]
    pub trace_output_dir: PathBuf,
    /// Source model file under test.
    #[serde(default)]
    pub original_model_file: PathBuf,
    /// Preprocessed model emitted by the engine.
    #[serde(default)]
    pub preprocessed_model_file: PathBuf,
    /// Matcher model emitted by the engine.
    #[serde(default)]
    pub matcher_model_file: PathBuf,
    /// Trace file produced by matching runs.
    #[serde(default)]
    pub matcher_trace_file: PathBuf,
    /// Trace file produced by replay runs.
    #[serde(default)]
    pub simulator_trace_file: PathBuf,
}

impl PathOptions {
    /// Derives the full path layout for `model_file` under `output_root`.
    pub fn derive(model_file: &Path, output_root: &Path) -> Self {
        let stem = model_file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "model".to_string());
        let temp_dir = output_root.join("temp");
        let model_output_dir = temp_dir.join("models");
        let trace_output_dir = temp_dir.join("traces");
        Self {
            output_dir: output_root.to_path_buf(),
            preprocessed_model_file: model_output_dir.join(format!("{stem}_preprocessed.json")),
            matcher_model_file: model_output_dir.join(format!("{stem}_matcher.json")),
            matcher_trace_file: trace_output_dir.join(format!("{stem}_matcher-trace.json")),
            simulator_trace_file: trace_output_dir.join(format!("{stem}_simulated-trace.json")),
            original_model_file: model_file.to_path_buf(),
            temp_dir,
            model_output_dir,
            trace_output_dir,
        }
    }

    /// Creates the output directory tree.
    pub fn ensure_directories(&self) -> Result<(), OmxError> {
        for dir in [&self.model_output_dir, &self.trace_output_dir] {
            fs::create_dir_all(dir).map_err(|err| {
                OmxError::Config(
                    ErrorInfo::new("config-mkdir", err.to_string())
                        .with_context("path", dir.display().to_string()),
                )
            })?;
        }
        Ok(())
    }
}

/// Matching-feature toggles defining a matcher variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatcherOptions {
    /// Accept observation points that omit observed variables.
    #[serde(default)]
    pub support_partial_matching: bool,
    /// Accept bounded per-variable value deviations.
    #[serde(default)]
    pub support_deviating_matching: bool,
    /// Match observed process locations in addition to variables.
    #[serde(default)]
    pub support_location_matching: bool,
    /// Accept globally time-shifted observations.
    #[serde(default)]
    pub support_shifted_matching: bool,
    /// Allow observation points anchored at committed states.
    #[serde(default)]
    pub support_committed_matching: bool,
    /// Maximum accepted deviation per variable.
    #[serde(default)]
    pub allowed_deviations: IndexMap<String, i64>,
    /// Maximum accepted delay before the first observation.
    #[serde(default)]
    pub maximum_initial_delay: i64,
}

impl Default for MatcherOptions {
    fn default() -> Self {
        Self {
            support_partial_matching: false,
            support_deviating_matching: false,
            support_location_matching: false,
            support_shifted_matching: false,
            support_committed_matching: false,
            allowed_deviations: IndexMap::new(),
            maximum_initial_delay: 0,
        }
    }
}

/// Shape options for synthetic observation generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Include variable values in observation points.
    #[serde(default = "default_true")]
    pub observe_variables: bool,
    /// Variables visible to the observer (empty observes all).
    #[serde(default)]
    pub observed_variables: Vec<String>,
    /// Drop individual variables from individual points.
    #[serde(default)]
    pub allow_partial_observations: bool,
    /// Deviation bounds applied to variables without a dedicated entry.
    #[serde(default)]
    pub default_deviation_bounds: (i64, i64),
    /// Per-variable deviation bounds.
    #[serde(default)]
    pub allowed_observation_deviations: IndexMap<String, (i64, i64)>,
    /// Include process locations in observation points.
    #[serde(default)]
    pub allow_location_observations: bool,
    /// Processes visible to the location observer (empty observes all).
    #[serde(default)]
    pub observed_processes: Vec<String>,
    /// Bounds for the global time shift applied to all points.
    #[serde(default)]
    pub time_shift_bounds: (i64, i64),
    /// Permit observation points taken in committed states.
    #[serde(default)]
    pub allow_committed_observations: bool,
    /// Concrete transition time selection strategy.
    #[serde(default)]
    pub concrete_transition_times: TransitionTimes,
    /// Always keep the first simulated snapshot as an observation point.
    #[serde(default)]
    pub force_keep_first_observation: bool,
    /// Always keep the last simulated snapshot as an observation point.
    #[serde(default)]
    pub force_keep_last_observation: bool,
    /// Number of simulation steps backing one generated dataset.
    #[serde(default = "default_step_count")]
    pub step_count: usize,
    /// Inclusive bounds for the number of observation points.
    #[serde(default = "default_observation_count_bounds")]
    pub observation_count_bounds: (usize, usize),
}

fn default_true() -> bool {
    true
}

fn default_step_count() -> usize {
    1
}

fn default_observation_count_bounds() -> (usize, usize) {
    (1, 1)
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            observe_variables: true,
            observed_variables: Vec::new(),
            allow_partial_observations: false,
            default_deviation_bounds: (0, 0),
            allowed_observation_deviations: IndexMap::new(),
            allow_location_observations: false,
            observed_processes: Vec::new(),
            time_shift_bounds: (0, 0),
            allow_committed_observations: false,
            concrete_transition_times: TransitionTimes::default(),
            force_keep_first_observation: false,
            force_keep_last_observation: false,
            step_count: default_step_count(),
            observation_count_bounds: default_observation_count_bounds(),
        }
    }
}

/// Run-shape options shared by all experiments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    /// Wall-clock budget for a single matching attempt, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Number of runs executed per matrix scenario.
    #[serde(default = "default_runs_per_scenario")]
    pub runs_per_scenario: usize,
    /// Master seed from which per-scenario substreams are derived.
    #[serde(default = "default_master_seed")]
    pub master_seed: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_runs_per_scenario() -> usize {
    10
}

fn default_master_seed() -> u64 {
    0x0B5E_0B5E_0B5E_0B5E_u64
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            runs_per_scenario: default_runs_per_scenario(),
            master_seed: default_master_seed(),
        }
    }
}

/// Effective configuration for one experiment invocation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// External engine settings.
    #[serde(default)]
    pub engine: EngineOptions,
    /// Derived filesystem layout.
    #[serde(default)]
    pub paths: PathOptions,
    /// Matcher variant feature set.
    #[serde(default)]
    pub matcher: MatcherOptions,
    /// Observation generation shape.
    #[serde(default)]
    pub generation: GenerationOptions,
    /// Run counts, timeout, seeding.
    #[serde(default)]
    pub run: RunOptions,
}

impl ExperimentConfig {
    /// Loads the base configuration from a YAML file, resolving `${key}`
    /// references between sibling keys of the same section first.
    pub fn load(path: &Path) -> Result<Self, OmxError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            OmxError::Config(
                ErrorInfo::new("config-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        let mut value: Value = serde_yaml::from_str(&contents).map_err(|err| {
            OmxError::Config(
                ErrorInfo::new("config-parse", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        interpolate_sections(&mut value)?;
        serde_yaml::from_value(value).map_err(|err| {
            OmxError::Config(
                ErrorInfo::new("config-schema", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }

    /// Returns a new configuration with `layers` applied in order.
    pub fn layered(&self, layers: &[&ConfigLayer]) -> Self {
        apply_layers(self, layers)
    }
}

/// Applies override layers onto a copy of `base`, in argument order.
///
/// Neither `base` nor the layers are modified; sibling branches of an
/// experiment matrix never observe each other's overrides.
pub fn apply_layers(base: &ExperimentConfig, layers: &[&ConfigLayer]) -> ExperimentConfig {
    let mut config = base.clone();
    for layer in layers {
        layer.apply_to(&mut config);
    }
    config
}

macro_rules! overlay {
    ($layer:expr, { $($field:ident => $target:expr),+ $(,)? }) => {
        $(
            if let Some(value) = &$layer.$field {
                $target = value.clone();
            }
        )+
    };
}

/// A named override layer. Every field is optional; set fields replace the
/// base value key-wise, map-valued fields wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigLayer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub support_partial_matching: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub support_deviating_matching: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub support_location_matching: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub support_shifted_matching: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub support_committed_matching: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_deviations: Option<IndexMap<String, i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum_initial_delay: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matcher_model_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observe_variables: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_variables: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_partial_observations: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_deviation_bounds: Option<(i64, i64)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_observation_deviations: Option<IndexMap<String, (i64, i64)>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_location_observations: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_processes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_shift_bounds: Option<(i64, i64)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_committed_observations: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concrete_transition_times: Option<TransitionTimes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_keep_first_observation: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_keep_last_observation: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation_count_bounds: Option<(usize, usize)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runs_per_scenario: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_seed: Option<u64>,
}

impl ConfigLayer {
    fn apply_to(&self, config: &mut ExperimentConfig) {
        overlay!(self, {
            support_partial_matching => config.matcher.support_partial_matching,
            support_deviating_matching => config.matcher.support_deviating_matching,
            support_location_matching => config.matcher.support_location_matching,
            support_shifted_matching => config.matcher.support_shifted_matching,
            support_committed_matching => config.matcher.support_committed_matching,
            allowed_deviations => config.matcher.allowed_deviations,
            maximum_initial_delay => config.matcher.maximum_initial_delay,
            matcher_model_file => config.paths.matcher_model_file,
            observe_variables => config.generation.observe_variables,
            observed_variables => config.generation.observed_variables,
            allow_partial_observations => config.generation.allow_partial_observations,
            default_deviation_bounds => config.generation.default_deviation_bounds,
            allowed_observation_deviations => config.generation.allowed_observation_deviations,
            allow_location_observations => config.generation.allow_location_observations,
            observed_processes => config.generation.observed_processes,
            time_shift_bounds => config.generation.time_shift_bounds,
            allow_committed_observations => config.generation.allow_committed_observations,
            concrete_transition_times => config.generation.concrete_transition_times,
            force_keep_first_observation => config.generation.force_keep_first_observation,
            force_keep_last_observation => config.generation.force_keep_last_observation,
            step_count => config.generation.step_count,
            observation_count_bounds => config.generation.observation_count_bounds,
            timeout_secs => config.run.timeout_secs,
            runs_per_scenario => config.run.runs_per_scenario,
            master_seed => config.run.master_seed,
        });
    }
}

/// Ordered registry of matcher-variant layers, constructed once at startup
/// and passed by reference into the runner.
#[derive(Debug, Clone, Default)]
pub struct VariantRegistry {
    layers: IndexMap<String, ConfigLayer>,
}

impl VariantRegistry {
    /// The standard variant ladder: raw, basic, each single extension, the
    /// shifted+committed pair, and the full feature set.
    pub fn standard() -> Self {
        let mut layers = IndexMap::new();
        layers.insert("R".to_string(), ConfigLayer::default());
        layers.insert("B".to_string(), ConfigLayer::default());
        layers.insert(
            "B+P".to_string(),
            ConfigLayer {
                support_partial_matching: Some(true),
                ..ConfigLayer::default()
            },
        );
        layers.insert(
            "B+D".to_string(),
            ConfigLayer {
                support_deviating_matching: Some(true),
                ..ConfigLayer::default()
            },
        );
        layers.insert(
            "B+L".to_string(),
            ConfigLayer {
                support_location_matching: Some(true),
                ..ConfigLayer::default()
            },
        );
        layers.insert(
            "B+S".to_string(),
            ConfigLayer {
                support_shifted_matching: Some(true),
                ..ConfigLayer::default()
            },
        );
        layers.insert(
            "B+C".to_string(),
            ConfigLayer {
                support_committed_matching: Some(true),
                ..ConfigLayer::default()
            },
        );
        layers.insert(
            "B+S+C".to_string(),
            ConfigLayer {
                support_shifted_matching: Some(true),
                support_committed_matching: Some(true),
                ..ConfigLayer::default()
            },
        );
        layers.insert("All".to_string(), full_matcher_layer());
        Self { layers }
    }

    /// Iterates variants in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigLayer)> {
        self.layers.iter().map(|(name, layer)| (name.as_str(), layer))
    }

    /// Looks up a variant layer by name.
    pub fn get(&self, name: &str) -> Option<&ConfigLayer> {
        self.layers.get(name)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

/// The layer resetting every matching feature to the basic matcher.
pub fn base_matcher_layer() -> ConfigLayer {
    ConfigLayer {
        support_partial_matching: Some(false),
        support_deviating_matching: Some(false),
        support_location_matching: Some(false),
        support_shifted_matching: Some(false),
        support_committed_matching: Some(false),
        allowed_deviations: Some(IndexMap::new()),
        maximum_initial_delay: Some(0),
        ..ConfigLayer::default()
    }
}

/// The layer enabling every matching feature.
pub fn full_matcher_layer() -> ConfigLayer {
    ConfigLayer {
        support_partial_matching: Some(true),
        support_deviating_matching: Some(true),
        support_location_matching: Some(true),
        support_shifted_matching: Some(true),
        support_committed_matching: Some(true),
        ..ConfigLayer::default()
    }
}

/// Ordered registry of observation-type layers.
#[derive(Debug, Clone, Default)]
pub struct ObservationTypeRegistry {
    layers: IndexMap<String, ConfigLayer>,
}

impl ObservationTypeRegistry {
    /// The standard observation ladder: basic, each single trait, and the
    /// combined advanced type.
    pub fn standard() -> Self {
        let mut layers = IndexMap::new();
        layers.insert("B".to_string(), ConfigLayer::default());
        layers.insert(
            "P".to_string(),
            ConfigLayer {
                allow_partial_observations: Some(true),
                ..ConfigLayer::default()
            },
        );
        layers.insert(
            "D".to_string(),
            ConfigLayer {
                default_deviation_bounds: Some((1, 5)),
                ..ConfigLayer::default()
            },
        );
        layers.insert(
            "L".to_string(),
            ConfigLayer {
                allow_location_observations: Some(true),
                ..ConfigLayer::default()
            },
        );
        layers.insert(
            "S".to_string(),
            ConfigLayer {
                time_shift_bounds: Some((1, 10)),
                ..ConfigLayer::default()
            },
        );
        layers.insert(
            "C".to_string(),
            ConfigLayer {
                allow_committed_observations: Some(true),
                ..ConfigLayer::default()
            },
        );
        layers.insert("All".to_string(), full_observation_layer());
        Self { layers }
    }

    /// Iterates observation types in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigLayer)> {
        self.layers.iter().map(|(name, layer)| (name.as_str(), layer))
    }

    /// Looks up an observation-type layer by name.
    pub fn get(&self, name: &str) -> Option<&ConfigLayer> {
        self.layers.get(name)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

/// The layer resetting generation to basic full-and-exact observations.
pub fn base_observation_layer() -> ConfigLayer {
    ConfigLayer {
        observe_variables: Some(true),
        observed_variables: Some(Vec::new()),
        allow_partial_observations: Some(false),
        default_deviation_bounds: Some((0, 0)),
        allowed_observation_deviations: Some(IndexMap::new()),
        allow_location_observations: Some(false),
        observed_processes: Some(Vec::new()),
        time_shift_bounds: Some((0, 0)),
        allow_committed_observations: Some(false),
        concrete_transition_times: Some(TransitionTimes::Random),
        force_keep_first_observation: Some(false),
        force_keep_last_observation: Some(false),
        step_count: Some(1),
        observation_count_bounds: Some((1, 1)),
        ..ConfigLayer::default()
    }
}

/// The layer enabling every observation trait at once.
pub fn full_observation_layer() -> ConfigLayer {
    ConfigLayer {
        allow_partial_observations: Some(true),
        default_deviation_bounds: Some((1, 5)),
        allow_location_observations: Some(true),
        time_shift_bounds: Some((1, 10)),
        allow_committed_observations: Some(true),
        ..ConfigLayer::default()
    }
}

fn interpolate_sections(value: &mut Value) -> Result<(), OmxError> {
    match value {
        Value::Mapping(mapping) => {
            let mut scope: IndexMap<String, String> = IndexMap::new();
            for (key, val) in mapping.iter() {
                if let (Value::String(name), Value::String(text)) = (key, val) {
                    scope.insert(name.clone(), text.clone());
                }
            }
            // Chained references resolve in at most one pass per key.
            for _ in 0..scope.len() {
                let mut changed = false;
                for (name, text) in scope.clone() {
                    let resolved = substitute(&text, &scope)?;
                    if resolved != text {
                        scope.insert(name, resolved);
                        changed = true;
                    }
                }
                if !changed {
                    break;
                }
            }
            for (_, val) in mapping.iter_mut() {
                if let Value::String(text) = val {
                    *text = substitute(text, &scope)?;
                } else {
                    interpolate_sections(val)?;
                }
            }
        }
        Value::Sequence(items) => {
            for item in items {
                interpolate_sections(item)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn substitute(text: &str, scope: &IndexMap<String, String>) -> Result<String, OmxError> {
    let mut output = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let tail = &rest[start + 2..];
        let Some(end) = tail.find('}') else {
            return Err(OmxError::Config(
                ErrorInfo::new("config-interpolation", "unterminated ${ reference")
                    .with_context("value", text.to_string()),
            ));
        };
        let name = &tail[..end];
        let Some(replacement) = scope.get(name) else {
            return Err(OmxError::Config(
                ErrorInfo::new("config-interpolation", "reference to unknown sibling key")
                    .with_context("key", name.to_string())
                    .with_context("value", text.to_string()),
            ));
        };
        output.push_str(replacement);
        rest = &tail[end + 1..];
    }
    output.push_str(rest);
    Ok(output)
}
