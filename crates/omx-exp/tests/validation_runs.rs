use std::fs;
use std::path::Path;
use std::time::Duration;

use omx_core::{
    Engine, ExperimentConfig, InstanceData, MatchOutcome, ModelDescriptor, ModelRegistry,
    ObservationData, ObservationMatcher, ObservationSource, ObservationTypeRegistry, OmxError,
    Trace, TraceSimulator, VariantRegistry,
};
use omx_exp::aggregate::ValidationLog;
use omx_exp::reference::{demo_model, ReferenceEngine, ReferenceModel};
use omx_exp::runner::Harness;
use omx_exp::store::RunLogStore;
use omx_exp::validation;

fn write_model(dir: &Path, name: &str) -> ModelDescriptor {
    let model = demo_model(name);
    let path = dir.join(format!("{name}.json"));
    fs::write(&path, serde_json::to_string(&model).unwrap()).unwrap();
    ModelDescriptor {
        path,
        variables: vec!["t".to_string(), "count".to_string()],
    }
}

fn base_config(runs: usize, seed: u64) -> ExperimentConfig {
    let mut config = ExperimentConfig::default();
    config.run.runs_per_scenario = runs;
    config.run.master_seed = seed;
    config
}

#[test]
fn validation_matrix_classifies_positives_and_negatives() {
    let dir = tempfile::tempdir().unwrap();
    let models = ModelRegistry::new(vec![write_model(dir.path(), "counter")]);
    let variants = VariantRegistry::standard();
    let observation_types = ObservationTypeRegistry::standard();
    let engine = ReferenceEngine;
    let harness = Harness::new(
        &engine,
        &models,
        &variants,
        &observation_types,
        base_config(4, 11),
        dir.path().join("temp"),
        dir.path().join("logs"),
    );

    let written = validation::run(&harness).unwrap();
    assert_eq!(written.len(), 1);
    assert!(written[0]
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("exp1_01_counter"));

    let all: indexmap::IndexMap<String, ValidationLog> =
        RunLogStore::load_all(&harness.store.subdir(validation::SUBDIR)).unwrap();
    let log = &all["counter"];
    assert_eq!(log.positives.len(), 4);
    assert_eq!(log.negatives.len(), 4);
    for record in log.positives.values() {
        assert!(record.is_matching);
        assert_eq!(record.is_simulated, Some(true));
        assert_eq!(record.is_included, Some(true));
        assert!(record.phase_duration("matching").is_some());
        assert!(record.obs_data.is_some());
    }
    for record in log.negatives.values() {
        assert!(!record.is_matching);
        assert!(!record.is_timeout);
        assert!(record.obs_data.is_some());
    }
}

#[test]
fn completed_models_are_skipped_on_restart() {
    let dir = tempfile::tempdir().unwrap();
    let models = ModelRegistry::new(vec![write_model(dir.path(), "counter")]);
    let variants = VariantRegistry::standard();
    let observation_types = ObservationTypeRegistry::standard();
    let engine = ReferenceEngine;
    let harness = Harness::new(
        &engine,
        &models,
        &variants,
        &observation_types,
        base_config(2, 3),
        dir.path().join("temp"),
        dir.path().join("logs"),
    );

    let first = validation::run(&harness).unwrap();
    assert_eq!(first.len(), 1);
    let second = validation::run(&harness).unwrap();
    assert!(second.is_empty());
}

/// Engine whose matcher claims every observation matches.
struct LyingEngine(ReferenceEngine);

struct LyingMatcher;

impl ObservationMatcher for LyingMatcher {
    fn prepare(&mut self) -> Result<(), OmxError> {
        Ok(())
    }

    fn match_observation(
        &mut self,
        _observation: &ObservationData,
        _return_trace: bool,
    ) -> Result<MatchOutcome, OmxError> {
        Ok(MatchOutcome {
            is_matching: true,
            is_timeout: false,
            matching_trace: Some(Trace::default()),
        })
    }
}

impl Engine for LyingEngine {
    type Model = ReferenceModel;

    fn load_model(&self, path: &Path) -> Result<Self::Model, OmxError> {
        self.0.load_model(path)
    }

    fn instance_data(
        &self,
        model: &Self::Model,
        config: &ExperimentConfig,
    ) -> Result<InstanceData, OmxError> {
        self.0.instance_data(model, config)
    }

    fn preprocess(
        &self,
        model: &Self::Model,
        instance: &InstanceData,
        config: &ExperimentConfig,
    ) -> Result<Self::Model, OmxError> {
        self.0.preprocess(model, instance, config)
    }

    fn observation_generator(
        &self,
        config: &ExperimentConfig,
        model: &Self::Model,
        seed: u64,
    ) -> Result<Box<dyn ObservationSource>, OmxError> {
        self.0.observation_generator(config, model, seed)
    }

    fn matcher(
        &self,
        _config: &ExperimentConfig,
        _model: &Self::Model,
        _instance: &InstanceData,
        _variant: &str,
        _timeout: Duration,
    ) -> Result<Box<dyn ObservationMatcher>, OmxError> {
        Ok(Box::new(LyingMatcher))
    }

    fn simulator(
        &self,
        config: &ExperimentConfig,
        model: &Self::Model,
        instance: &InstanceData,
    ) -> Result<Box<dyn TraceSimulator>, OmxError> {
        self.0.simulator(config, model, instance)
    }
}

#[test]
fn unsound_matcher_raises_invariant_violation_with_context() {
    let dir = tempfile::tempdir().unwrap();
    let models = ModelRegistry::new(vec![write_model(dir.path(), "counter")]);
    let variants = VariantRegistry::standard();
    let observation_types = ObservationTypeRegistry::standard();
    let engine = LyingEngine(ReferenceEngine);
    let harness = Harness::new(
        &engine,
        &models,
        &variants,
        &observation_types,
        base_config(2, 5),
        dir.path().join("temp"),
        dir.path().join("logs"),
    );

    let err = validation::run(&harness).unwrap_err();
    match &err {
        OmxError::Invariant(info) => {
            assert_eq!(info.code, "negative-run-matched");
            assert_eq!(info.context.get("model").map(String::as_str), Some("counter"));
            assert!(info.context.contains_key("observation"));
        }
        other => panic!("expected invariant violation, got {other}"),
    }

    // A failed model never persists a partial log.
    assert!(!harness.store.contains(validation::SUBDIR, validation::TAG, 1, "counter"));
}

/// Engine whose matcher always times out.
struct StallingEngine(ReferenceEngine);

struct StallingMatcher;

impl ObservationMatcher for StallingMatcher {
    fn prepare(&mut self) -> Result<(), OmxError> {
        Ok(())
    }

    fn match_observation(
        &mut self,
        _observation: &ObservationData,
        _return_trace: bool,
    ) -> Result<MatchOutcome, OmxError> {
        Ok(MatchOutcome {
            is_matching: false,
            is_timeout: true,
            matching_trace: None,
        })
    }
}

impl Engine for StallingEngine {
    type Model = ReferenceModel;

    fn load_model(&self, path: &Path) -> Result<Self::Model, OmxError> {
        self.0.load_model(path)
    }

    fn instance_data(
        &self,
        model: &Self::Model,
        config: &ExperimentConfig,
    ) -> Result<InstanceData, OmxError> {
        self.0.instance_data(model, config)
    }

    fn preprocess(
        &self,
        model: &Self::Model,
        instance: &InstanceData,
        config: &ExperimentConfig,
    ) -> Result<Self::Model, OmxError> {
        self.0.preprocess(model, instance, config)
    }

    fn observation_generator(
        &self,
        config: &ExperimentConfig,
        model: &Self::Model,
        seed: u64,
    ) -> Result<Box<dyn ObservationSource>, OmxError> {
        self.0.observation_generator(config, model, seed)
    }

    fn matcher(
        &self,
        _config: &ExperimentConfig,
        _model: &Self::Model,
        _instance: &InstanceData,
        _variant: &str,
        _timeout: Duration,
    ) -> Result<Box<dyn ObservationMatcher>, OmxError> {
        Ok(Box::new(StallingMatcher))
    }

    fn simulator(
        &self,
        config: &ExperimentConfig,
        model: &Self::Model,
        instance: &InstanceData,
    ) -> Result<Box<dyn TraceSimulator>, OmxError> {
        self.0.simulator(config, model, instance)
    }
}

#[test]
fn timeout_is_classified_as_inconclusive_not_as_non_match() {
    let dir = tempfile::tempdir().unwrap();
    let models = ModelRegistry::new(vec![write_model(dir.path(), "counter")]);
    let variants = VariantRegistry::standard();
    let observation_types = ObservationTypeRegistry::standard();
    let engine = StallingEngine(ReferenceEngine);
    let harness = Harness::new(
        &engine,
        &models,
        &variants,
        &observation_types,
        base_config(1, 5),
        dir.path().join("temp"),
        dir.path().join("logs"),
    );

    let err = validation::run(&harness).unwrap_err();
    match &err {
        OmxError::Invariant(info) => assert_eq!(info.code, "positive-run-timeout"),
        other => panic!("expected invariant violation, got {other}"),
    }
}
