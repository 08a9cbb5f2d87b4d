//! Persistence of per-model run logs.
//!
//! One structured JSON document per model per experiment, named so files
//! sort lexicographically in execution order. A model's file is written
//! only after all of its cells completed, which makes an interrupted sweep
//! resumable: files for finished models are complete and valid, and a
//! restarted run skips them.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;
use walkdir::WalkDir;

use omx_core::{ErrorInfo, OmxError};

/// File-backed store of run logs, rooted at the experiment log directory.
#[derive(Debug, Clone)]
pub struct RunLogStore {
    root: PathBuf,
}

impl RunLogStore {
    /// Creates a store rooted at `root`. Nothing is touched on disk until
    /// the first append.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The store's root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The directory holding one experiment's log files.
    pub fn subdir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// The log file path for one model of one experiment. The two-digit
    /// ordinal keeps filename order equal to execution order, and the cell
    /// identity stays reconstructable from the name alone.
    pub fn log_file(&self, subdir: &str, tag: &str, ordinal: usize, model: &str) -> PathBuf {
        self.subdir(subdir)
            .join(format!("{tag}_{ordinal:02}_{model}_log.json"))
    }

    /// Whether a complete log for the given model already exists.
    pub fn contains(&self, subdir: &str, tag: &str, ordinal: usize, model: &str) -> bool {
        self.log_file(subdir, tag, ordinal, model).is_file()
    }

    /// Writes the completed log of one model, keyed by the model name.
    pub fn append<T: Serialize>(
        &self,
        subdir: &str,
        tag: &str,
        ordinal: usize,
        model: &str,
        payload: &T,
    ) -> Result<PathBuf, OmxError> {
        let path = self.log_file(subdir, tag, ordinal, model);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                OmxError::Serde(
                    ErrorInfo::new("store-mkdir", err.to_string())
                        .with_context("path", parent.display().to_string()),
                )
            })?;
        }
        let mut document = IndexMap::with_capacity(1);
        document.insert(model.to_string(), payload);
        let json = serde_json::to_string(&document).map_err(|err| {
            OmxError::Serde(
                ErrorInfo::new("store-serialize", err.to_string())
                    .with_context("model", model.to_string()),
            )
        })?;
        fs::write(&path, json).map_err(|err| {
            OmxError::Serde(
                ErrorInfo::new("store-write", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        info!(path = %path.display(), "run log saved");
        Ok(path)
    }

    /// Reloads and merges every log file in `dir`, in filename-sorted
    /// order. Later files overwrite earlier ones on key collision;
    /// collisions are unexpected but must not fail the load.
    pub fn load_all<T: DeserializeOwned>(dir: &Path) -> Result<IndexMap<String, T>, OmxError> {
        let mut files: Vec<PathBuf> = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.ends_with("_log.json"))
            })
            .collect();
        files.sort();

        let mut merged = IndexMap::new();
        for path in files {
            let contents = fs::read_to_string(&path).map_err(|err| {
                OmxError::Serde(
                    ErrorInfo::new("store-read", err.to_string())
                        .with_context("path", path.display().to_string()),
                )
            })?;
            let document: IndexMap<String, T> =
                serde_json::from_str(&contents).map_err(|err| {
                    OmxError::Serde(
                        ErrorInfo::new("store-parse", err.to_string())
                            .with_context("path", path.display().to_string()),
                    )
                })?;
            merged.extend(document);
        }
        Ok(merged)
    }
}
