//! Observation-size and observation-extent sweeps.
//!
//! Identical matrices except for the swept generation parameter: exp4
//! varies the number of observation points over a fixed run length, exp5
//! varies the run length under a fixed number of points.

use std::path::PathBuf;
use std::time::Duration;

use indexmap::IndexMap;
use tracing::info;

use omx_core::{
    base_observation_layer, full_matcher_layer, ConfigLayer, Engine, OmxError, PathOptions,
    RunRecord,
};

use crate::aggregate::{ScenarioLog, ScenarioTable};
use crate::manifest::ExperimentManifest;
use crate::runner::{invariant, prepare_model, substream, timed_match, Harness};

/// Persisted log file tag of the observation-size sweep.
pub const SIZES_TAG: &str = "exp4";
/// Log subdirectory of the observation-size sweep.
pub const SIZES_SUBDIR: &str = "exp4_obs_size";
/// Persisted log file tag of the observation-extent sweep.
pub const EXTENTS_TAG: &str = "exp5";
/// Log subdirectory of the observation-extent sweep.
pub const EXTENTS_SUBDIR: &str = "exp5_obs_extents";

const SIZES_STEP_COUNT: usize = 200;
const SIZES_COUNT_STRIDE: usize = 10;
const EXTENTS_MAX_STEP_COUNT: usize = 200;
const EXTENTS_STEP_STRIDE: usize = 10;
const EXTENTS_OBSERVATION_COUNT: usize = 10;
const SWEEP_RUNS_PER_SCENARIO: usize = 5;

enum SweepKind {
    Sizes,
    Extents,
}

impl SweepKind {
    fn tag(&self) -> &'static str {
        match self {
            SweepKind::Sizes => SIZES_TAG,
            SweepKind::Extents => EXTENTS_TAG,
        }
    }

    fn subdir(&self) -> &'static str {
        match self {
            SweepKind::Sizes => SIZES_SUBDIR,
            SweepKind::Extents => EXTENTS_SUBDIR,
        }
    }

    fn values(&self) -> Vec<usize> {
        match self {
            SweepKind::Sizes => (1..=SIZES_STEP_COUNT + 1)
                .step_by(SIZES_COUNT_STRIDE)
                .collect(),
            SweepKind::Extents => (EXTENTS_OBSERVATION_COUNT..=EXTENTS_MAX_STEP_COUNT)
                .step_by(EXTENTS_STEP_STRIDE)
                .collect(),
        }
    }

    fn model_layer(&self) -> ConfigLayer {
        match self {
            SweepKind::Sizes => ConfigLayer {
                step_count: Some(SIZES_STEP_COUNT),
                force_keep_first_observation: Some(false),
                force_keep_last_observation: Some(true),
                ..ConfigLayer::default()
            },
            SweepKind::Extents => ConfigLayer {
                observation_count_bounds: Some((
                    EXTENTS_OBSERVATION_COUNT,
                    EXTENTS_OBSERVATION_COUNT,
                )),
                force_keep_first_observation: Some(true),
                force_keep_last_observation: Some(true),
                ..ConfigLayer::default()
            },
        }
    }

    fn value_layer(&self, value: usize) -> ConfigLayer {
        match self {
            SweepKind::Sizes => ConfigLayer {
                observation_count_bounds: Some((value, value)),
                ..ConfigLayer::default()
            },
            SweepKind::Extents => ConfigLayer {
                step_count: Some(value),
                ..ConfigLayer::default()
            },
        }
    }

    /// The size sweep skips the first registry model, whose long runs
    /// dominate the sweep's wall-clock budget.
    fn skips_first_model(&self) -> bool {
        matches!(self, SweepKind::Sizes)
    }
}

/// Executes the observation-size sweep.
pub fn observation_sizes<E: Engine>(harness: &Harness<'_, E>) -> Result<Vec<PathBuf>, OmxError> {
    sweep(harness, SweepKind::Sizes)
}

/// Executes the observation-extent sweep.
pub fn observation_extents<E: Engine>(harness: &Harness<'_, E>) -> Result<Vec<PathBuf>, OmxError> {
    sweep(harness, SweepKind::Extents)
}

fn sweep<E: Engine>(harness: &Harness<'_, E>, kind: SweepKind) -> Result<Vec<PathBuf>, OmxError> {
    let tag = kind.tag();
    let subdir = kind.subdir();
    let mut written = Vec::new();

    for (ordinal, descriptor) in harness.models.iter_indexed() {
        if kind.skips_first_model() && ordinal == 1 {
            continue;
        }
        let model_name = descriptor.name();
        if harness.store.contains(subdir, tag, ordinal, &model_name) {
            info!(model = %model_name, tag, "sweep log present, skipping");
            continue;
        }

        let mut base = harness.base_config.clone();
        base.paths = PathOptions::derive(&descriptor.path, &harness.output_root);
        let model_layer = ConfigLayer {
            matcher_model_file: Some(
                base.paths
                    .model_output_dir
                    .join(format!("{model_name}_{tag}_matcher.json")),
            ),
            allowed_deviations: Some(IndexMap::new()),
            maximum_initial_delay: Some(0),
            observed_variables: Some(descriptor.variables.clone()),
            runs_per_scenario: Some(SWEEP_RUNS_PER_SCENARIO),
            ..ConfigLayer::default()
        };
        let model_base = base.layered(&[
            &full_matcher_layer(),
            &base_observation_layer(),
            &model_layer,
            &kind.model_layer(),
        ]);
        let prepared = prepare_model(harness.engine, &model_base)?;

        let mut model_log = ScenarioTable::new();
        for value in kind.values() {
            let config = model_base.layered(&[&kind.value_layer(value)]);
            let mut generator = harness.engine.observation_generator(
                &config,
                &prepared.model,
                substream(config.run.master_seed, ordinal as u64, value as u64),
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
                    tag,
                    value,
                    run = run_idx + 1,
                    total = config.run.runs_per_scenario,
                    "sweep run"
                );
                let mut record = RunRecord::empty();
                let observation = generator.generate()?;
                record.obs_data = Some(observation.clone());

                let outcome = timed_match(matcher.as_mut(), &observation, false, &mut record)?;
                if !(outcome.is_matching || outcome.is_timeout) {
                    return Err(OmxError::Invariant(invariant(
                        "sweep-run-unclassified",
                        "no matching trace found even though one or more should match",
                        &model_name,
                        &value.to_string(),
                        run_idx,
                    )));
                }
                runs.insert(run_idx, record);
            }

            let scenario = ScenarioLog::from_records(runs);
            info!(
                model = %model_name,
                tag,
                value,
                summary = ?scenario.summary.min_max_avg,
                "sweep scenario finished"
            );
            model_log.insert(value.to_string(), scenario);
        }

        written.push(
            harness
                .store
                .append(subdir, tag, ordinal, &model_name, &model_log)?,
        );
    }

    ExperimentManifest::new(tag, &harness.base_config, written.clone())?
        .write(&harness.store.subdir(subdir).join("manifest.json"))?;
    Ok(written)
}
