//! Observation-type performance comparison.
//!
//! Each registered observation type is regenerated fresh per run and
//! matched against the full-feature matcher, measuring how the observation
//! traits affect matching time.

use std::path::PathBuf;
use std::time::Duration;

use indexmap::IndexMap;
use tracing::info;

use omx_core::{
    base_matcher_layer, base_observation_layer, full_matcher_layer, ConfigLayer, Engine, OmxError,
    PathOptions, RunRecord,
};

use crate::aggregate::{ScenarioLog, ScenarioTable};
use crate::manifest::ExperimentManifest;
use crate::runner::{invariant, prepare_model, substream, timed_match, Harness};

/// Persisted log file tag.
pub const TAG: &str = "exp3";
/// Log subdirectory of this experiment.
pub const SUBDIR: &str = "exp3_obs_types";

const STEP_COUNT: usize = 20;
const OBSERVATION_COUNT: usize = 10;
const MAX_DEVIATION: i64 = 5;
const MAX_INITIAL_DELAY: i64 = 10;

/// Executes the observation-type matrix over all models.
pub fn run<E: Engine>(harness: &Harness<'_, E>) -> Result<Vec<PathBuf>, OmxError> {
    let mut written = Vec::new();
    for (ordinal, descriptor) in harness.models.iter_indexed() {
        let model_name = descriptor.name();
        if harness.store.contains(SUBDIR, TAG, ordinal, &model_name) {
            info!(model = %model_name, "observation-type log present, skipping");
            continue;
        }

        let mut base = harness.base_config.clone();
        base.paths = PathOptions::derive(&descriptor.path, &harness.output_root);
        let model_layer = ConfigLayer {
            matcher_model_file: Some(
                base.paths
                    .model_output_dir
                    .join(format!("{model_name}_exp3_matcher.json")),
            ),
            allowed_deviations: Some(
                descriptor
                    .variables
                    .iter()
                    .map(|v| (v.clone(), MAX_DEVIATION))
                    .collect(),
            ),
            maximum_initial_delay: Some(MAX_INITIAL_DELAY),
            observed_variables: Some(descriptor.variables.clone()),
            step_count: Some(STEP_COUNT),
            observation_count_bounds: Some((OBSERVATION_COUNT, OBSERVATION_COUNT)),
            force_keep_first_observation: Some(true),
            force_keep_last_observation: Some(true),
            ..ConfigLayer::default()
        };
        let model_base = base.layered(&[
            &base_matcher_layer(),
            &full_matcher_layer(),
            &base_observation_layer(),
            &model_layer,
        ]);
        let prepared = prepare_model(harness.engine, &model_base)?;

        let mut model_log = ScenarioTable::new();
        for (type_idx, (obs_type, obs_layer)) in harness.observation_types.iter().enumerate() {
            let config = model_base.layered(&[obs_layer]);
            let mut generator = harness.engine.observation_generator(
                &config,
                &prepared.model,
                substream(config.run.master_seed, ordinal as u64, type_idx as u64),
            )?;
            let mut matcher = harness.engine.matcher(
                &config,
                &prepared.model,
                &prepared.instance,
                "All",
                Duration::from_secs(config.run.timeout_secs),
            )?;
            matcher.prepare()?;

            let mut runs = IndexMap::new();
            for run_idx in 0..config.run.runs_per_scenario {
                info!(
                    model = %model_name,
                    obs_type,
                    run = run_idx + 1,
                    total = config.run.runs_per_scenario,
                    "observation-type run"
                );
                let mut record = RunRecord::empty();
                let observation = generator.generate()?;
                record.obs_data = Some(observation.clone());

                let outcome = timed_match(matcher.as_mut(), &observation, false, &mut record)?;
                if !(outcome.is_matching || outcome.is_timeout) {
                    return Err(OmxError::Invariant(invariant(
                        "obs-type-run-unclassified",
                        "no matching trace found even though one or more should match",
                        &model_name,
                        obs_type,
                        run_idx,
                    )));
                }
                runs.insert(run_idx, record);
            }

            let scenario = ScenarioLog::from_records(runs);
            info!(
                model = %model_name,
                obs_type,
                summary = ?scenario.summary.min_max_avg,
                "observation-type scenario finished"
            );
            model_log.insert(obs_type.to_string(), scenario);
        }

        written.push(
            harness
                .store
                .append(SUBDIR, TAG, ordinal, &model_name, &model_log)?,
        );
    }

    ExperimentManifest::new(TAG, &harness.base_config, written.clone())?
        .write(&harness.store.subdir(SUBDIR).join("manifest.json"))?;
    Ok(written)
}
