use std::fs;
use std::path::Path;

use indexmap::IndexMap;

use omx_core::{
    ExperimentConfig, ModelDescriptor, ModelRegistry, ObservationTypeRegistry, VariantRegistry,
};
use omx_exp::aggregate::GroupedScenarioTable;
use omx_exp::reference::{demo_model, ReferenceEngine};
use omx_exp::runner::Harness;
use omx_exp::store::RunLogStore;
use omx_exp::{fixtures, variants};

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
fn variant_matrix_measures_every_variant_against_fixed_datasets() {
    let dir = tempfile::tempdir().unwrap();
    let models = ModelRegistry::new(vec![
        write_model(dir.path(), "counter"),
        write_model(dir.path(), "counter-b"),
    ]);
    let variants_registry = VariantRegistry::standard();
    let observation_types = ObservationTypeRegistry::standard();
    let engine = ReferenceEngine;
    let harness = Harness::new(
        &engine,
        &models,
        &variants_registry,
        &observation_types,
        base_config(2, 99),
        dir.path().join("temp"),
        dir.path().join("logs"),
    );

    let written = variants::run(&harness).unwrap();
    assert_eq!(written.len(), 2);
    assert!(fixtures::fixture_file(&harness).is_file());

    let all: IndexMap<String, GroupedScenarioTable> =
        RunLogStore::load_all(&harness.store.subdir(variants::SUBDIR)).unwrap();
    assert_eq!(all.len(), 2);

    let grouped = &all["counter"];
    let obs_order: Vec<&str> = grouped.keys().map(String::as_str).collect();
    assert_eq!(
        obs_order,
        vec!["few-short", "many-short", "few-long", "many-long"]
    );
    for table in grouped.values() {
        let variant_order: Vec<&str> = table.keys().map(String::as_str).collect();
        assert_eq!(
            variant_order,
            vec!["R", "B", "B+P", "B+D", "B+L", "B+S", "B+C", "B+S+C", "All"]
        );
        for log in table.values() {
            let runs = log.runs.as_ref().expect("dataset was available");
            assert_eq!(runs.len(), 2);
            for record in runs.values() {
                assert!(record.is_matching || record.is_timeout);
            }
            assert!(log.summary.has_data());
        }
    }
}

#[test]
fn scenarios_without_observation_data_are_recorded_as_inapplicable() {
    let dir = tempfile::tempdir().unwrap();
    let models = ModelRegistry::new(vec![write_model(dir.path(), "counter")]);
    let variants_registry = VariantRegistry::standard();
    let observation_types = ObservationTypeRegistry::standard();
    let engine = ReferenceEngine;
    let harness = Harness::new(
        &engine,
        &models,
        &variants_registry,
        &observation_types,
        base_config(2, 7),
        dir.path().join("temp"),
        dir.path().join("logs"),
    );

    let mut fixture_set = fixtures::generate(&harness).unwrap();
    fixture_set
        .get_mut("counter")
        .unwrap()
        .insert("few-long".to_string(), None);
    fixtures::save(&harness, &fixture_set).unwrap();

    variants::run(&harness).unwrap();
    let all: IndexMap<String, GroupedScenarioTable> =
        RunLogStore::load_all(&harness.store.subdir(variants::SUBDIR)).unwrap();
    let few_long = &all["counter"]["few-long"];
    for log in few_long.values() {
        assert!(log.runs.is_none());
        assert!(!log.summary.has_data());
    }
    // The JSON shape keeps the empty summary explicit.
    let raw = fs::read_to_string(
        harness
            .store
            .log_file(variants::SUBDIR, variants::TAG, 1, "counter"),
    )
    .unwrap();
    assert!(raw.contains(r#""runs":null,"summary":{}"#));
}

#[test]
fn fixture_generation_is_deterministic_in_the_master_seed() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();

    let mut sets = Vec::new();
    for dir in [&dir_a, &dir_b] {
        let models = ModelRegistry::new(vec![write_model(dir.path(), "counter")]);
        let variants_registry = VariantRegistry::standard();
        let observation_types = ObservationTypeRegistry::standard();
        let engine = ReferenceEngine;
        let harness = Harness::new(
            &engine,
            &models,
            &variants_registry,
            &observation_types,
            base_config(1, 1234),
            dir.path().join("temp"),
            dir.path().join("logs"),
        );
        sets.push(fixtures::generate(&harness).unwrap());
    }
    assert_eq!(sets[0], sets[1]);
}
