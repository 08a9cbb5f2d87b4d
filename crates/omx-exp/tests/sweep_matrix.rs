use std::fs;
use std::path::Path;

use indexmap::IndexMap;

use omx_core::{
    ExperimentConfig, ModelDescriptor, ModelRegistry, ObservationTypeRegistry, VariantRegistry,
};
use omx_exp::aggregate::ScenarioTable;
use omx_exp::reference::{demo_model, ReferenceEngine};
use omx_exp::runner::Harness;
use omx_exp::store::RunLogStore;
use omx_exp::sweeps;

fn write_model(dir: &Path, name: &str) -> ModelDescriptor {
    let model = demo_model(name);
    let path = dir.join(format!("{name}.json"));
    fs::write(&path, serde_json::to_string(&model).unwrap()).unwrap();
    ModelDescriptor {
        path,
        variables: vec!["t".to_string(), "count".to_string()],
    }
}

fn harness_fixture(dir: &Path) -> (ModelRegistry, VariantRegistry, ObservationTypeRegistry) {
    let models = ModelRegistry::new(vec![
        write_model(dir, "counter"),
        write_model(dir, "counter-b"),
    ]);
    (
        models,
        VariantRegistry::standard(),
        ObservationTypeRegistry::standard(),
    )
}

#[test]
fn size_sweep_covers_the_declared_counts_and_skips_the_first_model() {
    let dir = tempfile::tempdir().unwrap();
    let (models, variants, observation_types) = harness_fixture(dir.path());
    let engine = ReferenceEngine;
    let mut config = ExperimentConfig::default();
    config.run.master_seed = 42;
    let harness = Harness::new(
        &engine,
        &models,
        &variants,
        &observation_types,
        config,
        dir.path().join("temp"),
        dir.path().join("logs"),
    );

    let written = sweeps::observation_sizes(&harness).unwrap();
    assert_eq!(written.len(), 1);
    assert!(written[0]
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("exp4_02_counter-b"));

    let all: IndexMap<String, ScenarioTable> =
        RunLogStore::load_all(&harness.store.subdir(sweeps::SIZES_SUBDIR)).unwrap();
    assert!(!all.contains_key("counter"));
    let table = &all["counter-b"];
    let expected: Vec<String> = (1..=201).step_by(10).map(|v| v.to_string()).collect();
    let keys: Vec<String> = table.keys().cloned().collect();
    assert_eq!(keys, expected);
    for log in table.values() {
        let runs = log.runs.as_ref().unwrap();
        assert_eq!(runs.len(), 5);
        assert!(log.summary.has_data());
    }
}

#[test]
fn extent_sweep_covers_every_model_and_step_count() {
    let dir = tempfile::tempdir().unwrap();
    let (models, variants, observation_types) = harness_fixture(dir.path());
    let engine = ReferenceEngine;
    let mut config = ExperimentConfig::default();
    config.run.master_seed = 42;
    let harness = Harness::new(
        &engine,
        &models,
        &variants,
        &observation_types,
        config,
        dir.path().join("temp"),
        dir.path().join("logs"),
    );

    let written = sweeps::observation_extents(&harness).unwrap();
    assert_eq!(written.len(), 2);

    let all: IndexMap<String, ScenarioTable> =
        RunLogStore::load_all(&harness.store.subdir(sweeps::EXTENTS_SUBDIR)).unwrap();
    assert_eq!(all.len(), 2);
    let expected: Vec<String> = (10..=200).step_by(10).map(|v| v.to_string()).collect();
    for table in all.values() {
        let keys: Vec<String> = table.keys().cloned().collect();
        assert_eq!(keys, expected);
        for log in table.values() {
            for record in log.runs.as_ref().unwrap().values() {
                assert!(record.is_matching || record.is_timeout);
                // The swept observations keep exactly the configured count.
                assert!(record.obs_data.as_ref().unwrap().len() <= 10);
            }
        }
    }
}
