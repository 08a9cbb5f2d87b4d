//! Fixed observation datasets for the matcher-variant comparison.
//!
//! Four datasets per model, spanning few/many observation points over
//! short/long runs. Generated once with the base observation shape and
//! persisted, so every matcher variant is measured against identical
//! inputs.

use std::fs;
use std::path::PathBuf;

use indexmap::IndexMap;
use tracing::info;

use omx_core::{
    base_observation_layer, ConfigLayer, Engine, ErrorInfo, ObservationData, OmxError,
    PathOptions, TransitionTimes,
};

use crate::runner::{prepare_model, substream, Harness};

/// Log subdirectory holding the fixture file.
pub const SUBDIR: &str = "helper";
/// Fixture file name.
pub const FILE: &str = "exp2_observation_data.json";

/// Fixed datasets per model per observation shape; `None` marks a shape
/// without data (the matcher-variant matrix records it as inapplicable).
pub type FixtureSet = IndexMap<String, IndexMap<String, Option<ObservationData>>>;

/// The four dataset shapes: name, step count, observation count.
pub fn fixture_shapes() -> [(&'static str, usize, usize); 4] {
    [
        ("few-short", 10, 4),
        ("many-short", 10, 10),
        ("few-long", 40, 4),
        ("many-long", 40, 10),
    ]
}

/// The fixture file path under the harness log root.
pub fn fixture_file<E: Engine>(harness: &Harness<'_, E>) -> PathBuf {
    harness.store.subdir(SUBDIR).join(FILE)
}

/// Generates the fixture set for every registry model.
pub fn generate<E: Engine>(harness: &Harness<'_, E>) -> Result<FixtureSet, OmxError> {
    let mut fixtures = FixtureSet::new();
    for (ordinal, descriptor) in harness.models.iter_indexed() {
        let model_name = descriptor.name();
        let mut base = harness.base_config.clone();
        base.paths = PathOptions::derive(&descriptor.path, &harness.output_root);
        let model_layer = ConfigLayer {
            observed_variables: Some(descriptor.variables.clone()),
            concrete_transition_times: Some(TransitionTimes::Min),
            force_keep_last_observation: Some(true),
            ..ConfigLayer::default()
        };
        let model_base = base.layered(&[&base_observation_layer(), &model_layer]);
        let prepared = prepare_model(harness.engine, &model_base)?;

        let mut shapes = IndexMap::new();
        for (shape_idx, (shape_name, step_count, observation_count)) in
            fixture_shapes().into_iter().enumerate()
        {
            info!(model = %model_name, shape = shape_name, "generating fixture observation");
            let shape_layer = ConfigLayer {
                step_count: Some(step_count),
                observation_count_bounds: Some((observation_count, observation_count)),
                ..ConfigLayer::default()
            };
            let config = model_base.layered(&[&shape_layer]);
            let mut generator = harness.engine.observation_generator(
                &config,
                &prepared.model,
                substream(config.run.master_seed, ordinal as u64, shape_idx as u64),
            )?;
            shapes.insert(shape_name.to_string(), Some(generator.generate()?));
        }
        fixtures.insert(model_name, shapes);
    }
    Ok(fixtures)
}

/// Persists a fixture set to the harness log root.
pub fn save<E: Engine>(harness: &Harness<'_, E>, fixtures: &FixtureSet) -> Result<PathBuf, OmxError> {
    let path = fixture_file(harness);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| {
            OmxError::Serde(
                ErrorInfo::new("fixtures-mkdir", err.to_string())
                    .with_context("path", parent.display().to_string()),
            )
        })?;
    }
    let json = serde_json::to_string(fixtures)
        .map_err(|err| OmxError::Serde(ErrorInfo::new("fixtures-serialize", err.to_string())))?;
    fs::write(&path, json).map_err(|err| {
        OmxError::Serde(
            ErrorInfo::new("fixtures-write", err.to_string())
                .with_context("path", path.display().to_string()),
        )
    })?;
    info!(path = %path.display(), "fixture observations saved");
    Ok(path)
}

/// Loads the persisted fixture set, or generates and persists it when the
/// file is absent (the result is deterministic in the master seed either
/// way).
pub fn load_or_generate<E: Engine>(harness: &Harness<'_, E>) -> Result<FixtureSet, OmxError> {
    let path = fixture_file(harness);
    if path.is_file() {
        let contents = fs::read_to_string(&path).map_err(|err| {
            OmxError::Serde(
                ErrorInfo::new("fixtures-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        return serde_json::from_str(&contents).map_err(|err| {
            OmxError::Serde(
                ErrorInfo::new("fixtures-parse", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        });
    }
    let fixtures = generate(harness)?;
    save(harness, &fixtures)?;
    Ok(fixtures)
}
