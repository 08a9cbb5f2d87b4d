//! Per-experiment run manifests.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use omx_core::{stable_hash_string, ErrorInfo, ExperimentConfig, OmxError};

/// Structured manifest describing one completed experiment sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentManifest {
    /// Experiment tag, e.g. `exp3`.
    pub experiment: String,
    /// RFC 3339 creation time.
    pub created_at: String,
    /// Master seed the substreams were derived from.
    pub master_seed: u64,
    /// Stable hash of the base configuration used for the sweep.
    pub config_hash: String,
    /// Log files written by the sweep, in execution order.
    pub log_files: Vec<PathBuf>,
}

impl ExperimentManifest {
    /// Builds a manifest for a completed sweep.
    pub fn new(
        experiment: impl Into<String>,
        config: &ExperimentConfig,
        log_files: Vec<PathBuf>,
    ) -> Result<Self, OmxError> {
        Ok(Self {
            experiment: experiment.into(),
            created_at: Utc::now().to_rfc3339(),
            master_seed: config.run.master_seed,
            config_hash: stable_hash_string(config)?,
            log_files,
        })
    }

    /// Writes the manifest to a JSON file.
    pub fn write(&self, path: &Path) -> Result<(), OmxError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                OmxError::Serde(
                    ErrorInfo::new("manifest-mkdir", err.to_string())
                        .with_context("path", parent.display().to_string()),
                )
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|err| {
            OmxError::Serde(
                ErrorInfo::new("manifest-serialize", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        fs::write(path, json).map_err(|err| {
            OmxError::Serde(
                ErrorInfo::new("manifest-write", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }

    /// Loads a manifest from disk.
    pub fn load(path: &Path) -> Result<Self, OmxError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            OmxError::Serde(
                ErrorInfo::new("manifest-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        serde_json::from_str(&contents).map_err(|err| {
            OmxError::Serde(
                ErrorInfo::new("manifest-parse", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }
}
