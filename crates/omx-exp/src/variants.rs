//! Matcher-variant performance comparison.
//!
//! Fixed observation datasets are matched against every registered matcher
//! variant, from the raw model to the full feature set. A variant may
//! legitimately time out under load, but must never fail to classify a
//! run.

use std::path::PathBuf;
use std::time::Duration;

use indexmap::IndexMap;
use tracing::{debug, info};

use omx_core::{
    base_matcher_layer, ConfigLayer, Engine, ErrorInfo, OmxError, PathOptions, RunRecord,
};

use crate::aggregate::{GroupedScenarioTable, ScenarioLog, ScenarioTable};
use crate::fixtures;
use crate::manifest::ExperimentManifest;
use crate::runner::{invariant, prepare_model, timed_match, Harness};

/// Persisted log file tag.
pub const TAG: &str = "exp2";
/// Log subdirectory of this experiment.
pub const SUBDIR: &str = "exp2_matcher_models";

/// Executes the matcher-variant matrix over all models.
pub fn run<E: Engine>(harness: &Harness<'_, E>) -> Result<Vec<PathBuf>, OmxError> {
    let fixture_set = fixtures::load_or_generate(harness)?;

    let mut written = Vec::new();
    for (ordinal, descriptor) in harness.models.iter_indexed() {
        let model_name = descriptor.name();
        if harness.store.contains(SUBDIR, TAG, ordinal, &model_name) {
            info!(model = %model_name, "variant log present, skipping");
            continue;
        }

        let mut base = harness.base_config.clone();
        base.paths = PathOptions::derive(&descriptor.path, &harness.output_root);
        let model_base = base.layered(&[&base_matcher_layer()]);
        let prepared = prepare_model(harness.engine, &model_base)?;

        let model_fixtures = fixture_set.get(&model_name).ok_or_else(|| {
            OmxError::Config(
                ErrorInfo::new(
                    "fixtures-missing-model",
                    "no fixture observations exist for the model",
                )
                .with_context("model", model_name.clone())
                .with_hint("rerun the fixture generation task"),
            )
        })?;

        let mut model_log = GroupedScenarioTable::new();
        for (obs_type, dataset) in model_fixtures {
            let mut obs_log = ScenarioTable::new();
            for (variant_name, variant_layer) in harness.variants.iter() {
                let Some(observation) = dataset else {
                    obs_log.insert(variant_name.to_string(), ScenarioLog::absent());
                    continue;
                };

                let matcher_layer = ConfigLayer {
                    matcher_model_file: Some(model_base.paths.model_output_dir.join(format!(
                        "{model_name}_{}.json",
                        variant_name.replace('+', "_")
                    ))),
                    ..ConfigLayer::default()
                };
                let config = model_base.layered(&[variant_layer, &matcher_layer]);
                let mut matcher = harness.engine.matcher(
                    &config,
                    &prepared.model,
                    &prepared.instance,
                    variant_name,
                    Duration::from_secs(config.run.timeout_secs),
                )?;
                matcher.prepare()?;

                let mut runs = IndexMap::new();
                for run_idx in 0..config.run.runs_per_scenario {
                    debug!(
                        model = %model_name,
                        obs_type,
                        variant = variant_name,
                        run = run_idx + 1,
                        "variant run"
                    );
                    let mut record = RunRecord::empty();
                    let outcome = timed_match(matcher.as_mut(), observation, false, &mut record)?;
                    if !(outcome.is_matching || outcome.is_timeout) {
                        return Err(OmxError::Invariant(invariant(
                            "variant-run-unclassified",
                            "no matching trace found even though one or more should match",
                            &model_name,
                            &format!("{obs_type}/{variant_name}"),
                            run_idx,
                        )));
                    }
                    runs.insert(run_idx, record);
                }

                let scenario = ScenarioLog::from_records(runs);
                info!(
                    model = %model_name,
                    obs_type,
                    variant = variant_name,
                    summary = ?scenario.summary.min_max_avg,
                    "variant scenario finished"
                );
                obs_log.insert(variant_name.to_string(), scenario);
            }
            model_log.insert(obs_type.clone(), obs_log);
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
