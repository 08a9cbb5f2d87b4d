//! Deterministic reference engine.
//!
//! A minimal discrete transition system implementing every collaborator
//! seam, used by the test suite and the bundled demo models. Execution is
//! fully deterministic: processes fire round-robin, each step advances the
//! clock by one, and the `t` variable mirrors the clock. The production
//! engine is an external system consumed through the same traits.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use omx_core::{
    Engine, ExperimentConfig, GenerationOptions, InstanceData, MatchOutcome, MatcherOptions,
    ObservationData, ObservationMatcher, ObservationPoint, ObservationSource, OmxError,
    ReplayOutcome, Trace, TraceSimulator, Transition, ErrorInfo,
};

/// One process of a reference model: a cyclic location graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceProcess {
    /// Process name.
    pub name: String,
    /// Initial location.
    pub initial: String,
    /// Committed locations of the process.
    #[serde(default)]
    pub committed: Vec<String>,
    /// Outgoing edges, tried in declaration order.
    pub edges: Vec<ReferenceEdge>,
}

/// One edge of a reference process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceEdge {
    /// Stable edge identifier.
    pub id: String,
    /// Source location.
    pub source: String,
    /// Target location.
    pub target: String,
    /// Variable deltas applied when the edge fires.
    #[serde(default)]
    pub updates: IndexMap<String, i64>,
}

/// A reference model: initial variable values plus processes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceModel {
    /// Model name.
    pub name: String,
    /// Declared variables with initial values.
    pub variables: IndexMap<String, i64>,
    /// Process set, fired round-robin.
    pub processes: Vec<ReferenceProcess>,
}

/// Snapshot of the system after `time` steps.
#[derive(Debug, Clone)]
struct SimState {
    time: i64,
    values: IndexMap<String, i64>,
    locations: IndexMap<String, String>,
    committed: bool,
    /// Edge fired to reach this state; `None` for the initial state.
    edge: Option<String>,
}

/// Replays the deterministic round-robin schedule for `steps` steps and
/// returns all `steps + 1` snapshots, the initial state first.
fn simulate(model: &ReferenceModel, steps: usize) -> Result<Vec<SimState>, OmxError> {
    let mut values = model.variables.clone();
    let mut locations: IndexMap<String, String> = model
        .processes
        .iter()
        .map(|p| (p.name.clone(), p.initial.clone()))
        .collect();
    let mut states = Vec::with_capacity(steps + 1);
    states.push(SimState {
        time: 0,
        values: values.clone(),
        locations: locations.clone(),
        committed: is_committed(model, &locations),
        edge: None,
    });
    if model.processes.is_empty() {
        return Err(OmxError::Model(
            ErrorInfo::new("model-empty", "model declares no processes")
                .with_context("model", model.name.clone()),
        ));
    }
    for step in 1..=steps {
        let process = &model.processes[(step - 1) % model.processes.len()];
        let location = locations
            .get(&process.name)
            .cloned()
            .unwrap_or_else(|| process.initial.clone());
        let edge = process
            .edges
            .iter()
            .find(|edge| edge.source == location)
            .ok_or_else(|| {
                OmxError::Model(
                    ErrorInfo::new("model-stuck", "no outgoing edge from location")
                        .with_context("model", model.name.clone())
                        .with_context("process", process.name.clone())
                        .with_context("location", location.clone()),
                )
            })?;
        for (variable, delta) in &edge.updates {
            *values.entry(variable.clone()).or_insert(0) += delta;
        }
        if values.contains_key("t") {
            values.insert("t".to_string(), step as i64);
        }
        locations.insert(process.name.clone(), edge.target.clone());
        states.push(SimState {
            time: step as i64,
            values: values.clone(),
            locations: locations.clone(),
            committed: is_committed(model, &locations),
            edge: Some(edge.id.clone()),
        });
    }
    Ok(states)
}

fn is_committed(model: &ReferenceModel, locations: &IndexMap<String, String>) -> bool {
    model.processes.iter().any(|process| {
        locations
            .get(&process.name)
            .is_some_and(|location| process.committed.contains(location))
    })
}

/// The set of variables an observer is expected to report, given the
/// generation options.
fn expected_variables(model: &ReferenceModel, generation: &GenerationOptions) -> Vec<String> {
    if !generation.observe_variables {
        return Vec::new();
    }
    if generation.observed_variables.is_empty() {
        model.variables.keys().cloned().collect()
    } else {
        generation
            .observed_variables
            .iter()
            .filter(|v| model.variables.contains_key(*v))
            .cloned()
            .collect()
    }
}

fn trace_from_states(states: &[SimState], last: usize) -> Trace {
    let transitions = states
        .iter()
        .take(last + 1)
        .skip(1)
        .map(|state| Transition {
            time: state.time,
            triggered_edges: state.edge.iter().cloned().collect(),
            values: state.values.clone(),
        })
        .collect();
    Trace::new(transitions)
}

/// Seeded observation generator over a prepared reference model.
pub struct ReferenceGenerator {
    model: ReferenceModel,
    generation: GenerationOptions,
    rng: StdRng,
}

impl ReferenceGenerator {
    /// Creates a generator drawing from the substream identified by `seed`.
    pub fn new(model: ReferenceModel, generation: GenerationOptions, seed: u64) -> Self {
        Self {
            model,
            generation,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn deviation_bounds(&self, variable: &str) -> (i64, i64) {
        self.generation
            .allowed_observation_deviations
            .get(variable)
            .copied()
            .unwrap_or(self.generation.default_deviation_bounds)
    }

    fn observed_processes(&self) -> Vec<String> {
        if self.generation.observed_processes.is_empty() {
            self.model.processes.iter().map(|p| p.name.clone()).collect()
        } else {
            self.generation.observed_processes.clone()
        }
    }
}

impl ObservationSource for ReferenceGenerator {
    fn generate(&mut self) -> Result<ObservationData, OmxError> {
        let generation = self.generation.clone();
        let states = simulate(&self.model, generation.step_count)?;

        let eligible: Vec<usize> = (0..states.len())
            .filter(|&idx| generation.allow_committed_observations || !states[idx].committed)
            .collect();
        if eligible.is_empty() {
            return Ok(ObservationData::default());
        }

        let (lo, hi) = generation.observation_count_bounds;
        let count = self
            .rng
            .gen_range(lo.min(hi)..=hi.max(lo))
            .clamp(1, eligible.len());

        let mut chosen: Vec<usize> = Vec::with_capacity(count);
        if generation.force_keep_first_observation {
            chosen.push(eligible[0]);
        }
        if generation.force_keep_last_observation {
            chosen.push(eligible[eligible.len() - 1]);
        }
        chosen.dedup();
        let remaining: Vec<usize> = eligible
            .iter()
            .copied()
            .filter(|idx| !chosen.contains(idx))
            .collect();
        let missing = count.saturating_sub(chosen.len());
        chosen.extend(
            remaining
                .choose_multiple(&mut self.rng, missing)
                .copied()
                .collect::<Vec<_>>(),
        );
        chosen.sort_unstable();

        let variables = expected_variables(&self.model, &generation);
        let observed_processes = self.observed_processes();
        let shift = match generation.time_shift_bounds {
            (0, 0) => 0,
            (lo, hi) => self.rng.gen_range(lo.min(hi)..=hi.max(lo)),
        };

        let mut points = Vec::with_capacity(chosen.len());
        for idx in chosen {
            let state = &states[idx];
            let mut values = IndexMap::new();
            for (var_idx, variable) in variables.iter().enumerate() {
                let is_last_chance = values.is_empty() && var_idx + 1 == variables.len();
                if generation.allow_partial_observations
                    && !is_last_chance
                    && self.rng.gen_bool(0.3)
                {
                    continue;
                }
                let actual = state.values.get(variable).copied().unwrap_or(0);
                let (dev_lo, dev_hi) = self.deviation_bounds(variable);
                let observed = if (dev_lo, dev_hi) == (0, 0) {
                    actual
                } else {
                    let magnitude = self.rng.gen_range(dev_lo.min(dev_hi)..=dev_hi.max(dev_lo));
                    if self.rng.gen_bool(0.5) {
                        actual + magnitude
                    } else {
                        actual - magnitude
                    }
                };
                values.insert(variable.clone(), observed);
            }
            let mut locations = IndexMap::new();
            if generation.allow_location_observations {
                for process in &observed_processes {
                    if let Some(location) = state.locations.get(process) {
                        locations.insert(process.clone(), location.clone());
                    }
                }
            }
            points.push(ObservationPoint {
                time: state.time + shift,
                values,
                locations,
            });
        }
        Ok(ObservationData::new(points))
    }

    fn generate_negative(&mut self) -> Result<ObservationData, OmxError> {
        let mut data = self.generate()?;
        let states = simulate(&self.model, self.generation.step_count)?;
        let reachable_extreme = states
            .iter()
            .flat_map(|state| state.values.values())
            .map(|value| value.abs())
            .max()
            .unwrap_or(0);
        // Far beyond any reachable value plus every admissible deviation.
        let impossible = reachable_extreme + 1_000;

        if let Some(point) = data
            .points
            .iter_mut()
            .find(|point| !point.values.is_empty())
        {
            let variable = point.values.keys().next().cloned();
            if let Some(variable) = variable {
                point.values.insert(variable, impossible);
                return Ok(data);
            }
        }
        let variable = self
            .model
            .variables
            .keys()
            .next()
            .cloned()
            .unwrap_or_else(|| "t".to_string());
        data.points.push(ObservationPoint {
            time: 0,
            values: IndexMap::from_iter([(variable, impossible)]),
            locations: IndexMap::new(),
        });
        Ok(data)
    }
}

/// Reference matcher: replays the model and searches for a monotone
/// assignment of observation points to replay steps under the feature set
/// enabled for its variant.
pub struct ReferenceMatcher {
    model: ReferenceModel,
    features: MatcherOptions,
    generation: GenerationOptions,
    matcher_model_file: PathBuf,
    timeout: Duration,
}

impl ReferenceMatcher {
    /// Creates a matcher for the given feature set, bounded by `timeout`.
    pub fn new(
        model: ReferenceModel,
        features: MatcherOptions,
        generation: GenerationOptions,
        matcher_model_file: PathBuf,
        timeout: Duration,
    ) -> Self {
        Self {
            model,
            features,
            generation,
            matcher_model_file,
            timeout,
        }
    }

    fn candidate_offsets(&self) -> Vec<i64> {
        let mut offsets = vec![0];
        if self.features.support_shifted_matching {
            let (lo, hi) = self.generation.time_shift_bounds;
            offsets.extend(lo.min(hi)..=hi.max(lo));
            offsets.extend(1..=self.features.maximum_initial_delay);
        }
        offsets.sort_unstable();
        offsets.dedup();
        offsets
    }

    fn allowed_deviation(&self, variable: &str) -> i64 {
        if !self.features.support_deviating_matching {
            return 0;
        }
        self.features
            .allowed_deviations
            .get(variable)
            .copied()
            .unwrap_or(0)
    }

    fn point_matches(&self, point: &ObservationPoint, state: &SimState) -> bool {
        if state.committed && !self.features.support_committed_matching {
            return false;
        }
        if !point.locations.is_empty() && !self.features.support_location_matching {
            return false;
        }
        for (process, location) in &point.locations {
            if state.locations.get(process) != Some(location) {
                return false;
            }
        }
        if !self.features.support_partial_matching {
            let expected = expected_variables(&self.model, &self.generation);
            if expected.iter().any(|v| !point.values.contains_key(v)) {
                return false;
            }
        }
        for (variable, observed) in &point.values {
            let Some(actual) = state.values.get(variable) else {
                return false;
            };
            if (observed - actual).abs() > self.allowed_deviation(variable) {
                return false;
            }
        }
        true
    }
}

impl ObservationMatcher for ReferenceMatcher {
    fn prepare(&mut self) -> Result<(), OmxError> {
        if self.matcher_model_file.as_os_str().is_empty() {
            return Ok(());
        }
        let json = serde_json::to_string_pretty(&self.model).map_err(|err| {
            OmxError::Matcher(ErrorInfo::new("matcher-model-serialize", err.to_string()))
        })?;
        fs::write(&self.matcher_model_file, json).map_err(|err| {
            OmxError::Matcher(
                ErrorInfo::new("matcher-model-write", err.to_string())
                    .with_context("path", self.matcher_model_file.display().to_string()),
            )
        })
    }

    fn match_observation(
        &mut self,
        observation: &ObservationData,
        return_trace: bool,
    ) -> Result<MatchOutcome, OmxError> {
        let started = Instant::now();
        // The replay horizon must cover pre-recorded datasets whose span
        // exceeds the configured step count.
        let max_time = observation
            .points
            .iter()
            .map(|point| point.time)
            .max()
            .unwrap_or(0)
            .max(0) as usize;
        let horizon = self.generation.step_count.max(max_time);
        let states = simulate(&self.model, horizon)?;

        for offset in self.candidate_offsets() {
            if started.elapsed() > self.timeout {
                return Ok(MatchOutcome {
                    is_matching: false,
                    is_timeout: true,
                    matching_trace: None,
                });
            }
            let mut last_step = 0usize;
            let mut matched = true;
            for point in &observation.points {
                let target = point.time - offset;
                if target < 0 || target as usize >= states.len() {
                    matched = false;
                    break;
                }
                let step = target as usize;
                if !self.point_matches(point, &states[step]) {
                    matched = false;
                    break;
                }
                last_step = last_step.max(step);
            }
            if matched {
                let trace = return_trace.then(|| trace_from_states(&states, last_step));
                return Ok(MatchOutcome {
                    is_matching: true,
                    is_timeout: false,
                    matching_trace: trace,
                });
            }
        }
        Ok(MatchOutcome {
            is_matching: false,
            is_timeout: started.elapsed() > self.timeout,
            matching_trace: None,
        })
    }
}

/// Reference simulator: replays an edge sequence on the original model.
pub struct ReferenceSimulator {
    model: ReferenceModel,
}

impl ReferenceSimulator {
    pub fn new(model: ReferenceModel) -> Self {
        Self { model }
    }
}

impl TraceSimulator for ReferenceSimulator {
    fn replay(
        &mut self,
        edge_trace: &[Vec<String>],
        candidate: &Trace,
    ) -> Result<ReplayOutcome, OmxError> {
        let states = simulate(&self.model, edge_trace.len())?;
        for (step, expected) in edge_trace.iter().enumerate() {
            let fired = states[step + 1].edge.as_ref();
            let replayed = match (fired, expected.as_slice()) {
                (Some(fired), [edge]) => fired == edge,
                (None, []) => true,
                _ => false,
            };
            if !replayed {
                return Ok(ReplayOutcome {
                    is_simulated: false,
                    is_included: false,
                    simulated_trace: trace_from_states(&states, step),
                });
            }
        }
        let simulated_trace = trace_from_states(&states, edge_trace.len());
        let is_included = simulated_trace.includes(candidate);
        Ok(ReplayOutcome {
            is_simulated: true,
            is_included,
            simulated_trace,
        })
    }
}

/// Engine factory over reference models stored as JSON files.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceEngine;

impl Engine for ReferenceEngine {
    type Model = ReferenceModel;

    fn load_model(&self, path: &Path) -> Result<Self::Model, OmxError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            OmxError::Model(
                ErrorInfo::new("model-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        serde_json::from_str(&contents).map_err(|err| {
            OmxError::Model(
                ErrorInfo::new("model-parse", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }

    fn instance_data(
        &self,
        model: &Self::Model,
        _config: &ExperimentConfig,
    ) -> Result<InstanceData, OmxError> {
        Ok(InstanceData {
            variables: model.variables.keys().cloned().collect(),
            processes: model.processes.iter().map(|p| p.name.clone()).collect(),
        })
    }

    fn preprocess(
        &self,
        model: &Self::Model,
        _instance: &InstanceData,
        config: &ExperimentConfig,
    ) -> Result<Self::Model, OmxError> {
        let preprocessed = model.clone();
        let path = &config.paths.preprocessed_model_file;
        if !path.as_os_str().is_empty() {
            let json = serde_json::to_string_pretty(&preprocessed).map_err(|err| {
                OmxError::Model(ErrorInfo::new("model-serialize", err.to_string()))
            })?;
            fs::write(path, json).map_err(|err| {
                OmxError::Model(
                    ErrorInfo::new("model-write", err.to_string())
                        .with_context("path", path.display().to_string()),
                )
            })?;
        }
        Ok(preprocessed)
    }

    fn observation_generator(
        &self,
        config: &ExperimentConfig,
        model: &Self::Model,
        seed: u64,
    ) -> Result<Box<dyn ObservationSource>, OmxError> {
        Ok(Box::new(ReferenceGenerator::new(
            model.clone(),
            config.generation.clone(),
            seed,
        )))
    }

    fn matcher(
        &self,
        config: &ExperimentConfig,
        model: &Self::Model,
        _instance: &InstanceData,
        _variant: &str,
        timeout: Duration,
    ) -> Result<Box<dyn ObservationMatcher>, OmxError> {
        Ok(Box::new(ReferenceMatcher::new(
            model.clone(),
            config.matcher.clone(),
            config.generation.clone(),
            config.paths.matcher_model_file.clone(),
            timeout,
        )))
    }

    fn simulator(
        &self,
        _config: &ExperimentConfig,
        model: &Self::Model,
        _instance: &InstanceData,
    ) -> Result<Box<dyn TraceSimulator>, OmxError> {
        Ok(Box::new(ReferenceSimulator::new(model.clone())))
    }
}

/// A small deterministic demo model used by unit tests.
pub fn demo_model(name: &str) -> ReferenceModel {
    ReferenceModel {
        name: name.to_string(),
        variables: IndexMap::from_iter([
            ("t".to_string(), 0),
            ("count".to_string(), 0),
        ]),
        processes: vec![ReferenceProcess {
            name: "Counter".to_string(),
            initial: "idle".to_string(),
            committed: vec!["busy".to_string()],
            edges: vec![
                ReferenceEdge {
                    id: "start".to_string(),
                    source: "idle".to_string(),
                    target: "busy".to_string(),
                    updates: IndexMap::from_iter([("count".to_string(), 1)]),
                },
                ReferenceEdge {
                    id: "finish".to_string(),
                    source: "busy".to_string(),
                    target: "idle".to_string(),
                    updates: IndexMap::new(),
                },
            ],
        }],
    }
}
