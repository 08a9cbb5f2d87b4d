//! Full-workflow validation with positive and negative observations.
//!
//! For each model, known-positive observations must match, and the matched
//! trace must replay on the original model and be included in the replayed
//! trace; known-negative observations must not match. Any other outcome is
//! a soundness or completeness bug in the matcher under test and aborts
//! the sweep with full diagnostic context.

use std::path::PathBuf;
use std::time::Duration;

use indexmap::IndexMap;
use tracing::info;

use omx_core::{
    base_matcher_layer, base_observation_layer, full_matcher_layer, full_observation_layer,
    ConfigLayer, Engine, OmxError, PathOptions, RunRecord,
};

use crate::aggregate::ValidationLog;
use crate::manifest::ExperimentManifest;
use crate::runner::{invariant, json_context, prepare_model, substream, timed_match, Harness};

/// Persisted log file tag.
pub const TAG: &str = "exp1";
/// Log subdirectory of this experiment.
pub const SUBDIR: &str = "exp1_pos_neg_runs";

const STEP_COUNT: usize = 20;
const OBSERVATION_COUNT: usize = 10;
const MAX_DEVIATION: i64 = 5;
const MAX_INITIAL_DELAY: i64 = 10;

/// Executes the positive/negative validation matrix over all models.
pub fn run<E: Engine>(harness: &Harness<'_, E>) -> Result<Vec<PathBuf>, OmxError> {
    let mut written = Vec::new();
    for (ordinal, descriptor) in harness.models.iter_indexed() {
        let model_name = descriptor.name();
        if harness.store.contains(SUBDIR, TAG, ordinal, &model_name) {
            info!(model = %model_name, "validation log present, skipping");
            continue;
        }

        let mut base = harness.base_config.clone();
        base.paths = PathOptions::derive(&descriptor.path, &harness.output_root);
        let model_layer = ConfigLayer {
            matcher_model_file: Some(
                base.paths
                    .model_output_dir
                    .join(format!("{model_name}_exp1_matcher.json")),
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
        let config = base.layered(&[
            &base_matcher_layer(),
            &full_matcher_layer(),
            &base_observation_layer(),
            &full_observation_layer(),
            &model_layer,
        ]);

        let prepared = prepare_model(harness.engine, &config)?;
        let timeout = Duration::from_secs(config.run.timeout_secs);
        let mut matcher = harness.engine.matcher(
            &config,
            &prepared.model,
            &prepared.instance,
            "All",
            timeout,
        )?;
        matcher.prepare()?;
        let mut simulator =
            harness
                .engine
                .simulator(&config, &prepared.model, &prepared.instance)?;

        let run_count = config.run.runs_per_scenario;
        let master_seed = config.run.master_seed;

        let mut positives = IndexMap::new();
        let mut generator = harness.engine.observation_generator(
            &config,
            &prepared.model,
            substream(master_seed, ordinal as u64, 0),
        )?;
        for run_idx in 0..run_count {
            info!(
                model = %model_name,
                run = run_idx + 1,
                total = run_count,
                "positive validation run"
            );
            let mut record = RunRecord::empty();
            let observation = generator.generate()?;
            record.obs_data = Some(observation.clone());

            let outcome = timed_match(matcher.as_mut(), &observation, true, &mut record)?;
            if outcome.is_timeout {
                return Err(OmxError::Invariant(
                    invariant(
                        "positive-run-timeout",
                        "matching inconclusive: timed out on a known-positive observation",
                        &model_name,
                        "positives",
                        run_idx,
                    )
                    .with_context("observation", json_context(&observation)),
                ));
            }
            if !outcome.is_matching {
                return Err(OmxError::Invariant(
                    invariant(
                        "positive-run-unmatched",
                        "no matching trace found even though one or more should match",
                        &model_name,
                        "positives",
                        run_idx,
                    )
                    .with_context("observation", json_context(&observation)),
                ));
            }
            let matched = outcome.matching_trace.ok_or_else(|| {
                OmxError::Matcher(
                    invariant(
                        "matcher-missing-trace",
                        "matcher reported a match but returned no trace",
                        &model_name,
                        "positives",
                        run_idx,
                    ),
                )
            })?;

            let edge_trace: Vec<Vec<String>> = matched
                .transitions
                .iter()
                .map(|t| t.triggered_edges.clone())
                .collect();
            let replay = simulator.replay(&edge_trace, &matched)?;
            record.is_simulated = Some(replay.is_simulated);
            if !replay.is_simulated {
                return Err(OmxError::Invariant(
                    invariant(
                        "positive-run-unsimulated",
                        "matching edge trace could not be simulated on the original model",
                        &model_name,
                        "positives",
                        run_idx,
                    )
                    .with_context("matched_trace", json_context(&matched))
                    .with_context("observation", json_context(&observation)),
                ));
            }
            record.is_included = Some(replay.is_included);
            if !replay.is_included {
                return Err(OmxError::Invariant(
                    invariant(
                        "positive-run-not-included",
                        "the simulated trace does not include the matched trace",
                        &model_name,
                        "positives",
                        run_idx,
                    )
                    .with_context("simulated_trace", json_context(&replay.simulated_trace))
                    .with_context("matched_trace", json_context(&matched))
                    .with_context("observation", json_context(&observation)),
                ));
            }
            positives.insert(run_idx, record);
        }

        // Negative datasets are generated full and exact; the corruption
        // itself must be what prevents the match.
        let negative_layer = ConfigLayer {
            allow_partial_observations: Some(false),
            ..ConfigLayer::default()
        };
        let negative_config = config.layered(&[&negative_layer]);
        let mut generator = harness.engine.observation_generator(
            &negative_config,
            &prepared.model,
            substream(master_seed, ordinal as u64, 1),
        )?;

        let mut negatives = IndexMap::new();
        for run_idx in 0..run_count {
            info!(
                model = %model_name,
                run = run_idx + 1,
                total = run_count,
                "negative validation run"
            );
            let mut record = RunRecord::empty();
            let observation = generator.generate_negative()?;
            record.obs_data = Some(observation.clone());

            let outcome = timed_match(matcher.as_mut(), &observation, true, &mut record)?;
            if outcome.is_timeout {
                return Err(OmxError::Invariant(
                    invariant(
                        "negative-run-timeout",
                        "matching inconclusive: timed out on a known-negative observation",
                        &model_name,
                        "negatives",
                        run_idx,
                    )
                    .with_context("observation", json_context(&observation)),
                ));
            }
            if outcome.is_matching {
                return Err(OmxError::Invariant(
                    invariant(
                        "negative-run-matched",
                        "matching trace found even though none should match",
                        &model_name,
                        "negatives",
                        run_idx,
                    )
                    .with_context("matched_trace", json_context(&outcome.matching_trace))
                    .with_context("observation", json_context(&observation)),
                ));
            }
            negatives.insert(run_idx, record);
        }

        let log = ValidationLog {
            positives,
            negatives,
        };
        written.push(
            harness
                .store
                .append(SUBDIR, TAG, ordinal, &model_name, &log)?,
        );
    }

    ExperimentManifest::new(TAG, &harness.base_config, written.clone())?
        .write(&harness.store.subdir(SUBDIR).join("manifest.json"))?;
    Ok(written)
}
