//! Model identities and the process-wide model registry.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, OmxError};

/// Identity of a model under test: its source file plus the variables
/// considered observable for it. Registry entries are never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Model source file.
    pub path: PathBuf,
    /// Variable names visible to the observer.
    pub variables: Vec<String>,
}

impl ModelDescriptor {
    /// The model name, taken from the file stem.
    pub fn name(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "model".to_string())
    }
}

/// Structural data extracted from a loaded model.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InstanceData {
    /// Declared variable names.
    pub variables: Vec<String>,
    /// Instantiated process names.
    pub processes: Vec<String>,
}

/// Ordered set of models a sweep iterates over, constructed once at process
/// start and passed by reference into the runner.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: Vec<ModelDescriptor>,
}

impl ModelRegistry {
    /// Builds a registry from an explicit descriptor list.
    pub fn new(models: Vec<ModelDescriptor>) -> Self {
        Self { models }
    }

    /// The bundled demo models shipped under `res/models`.
    pub fn bundled(res_dir: &Path) -> Self {
        let models_dir = res_dir.join("models");
        Self::new(vec![
            ModelDescriptor {
                path: models_dir.join("two-doors.json"),
                variables: vec![
                    "t".to_string(),
                    "activated1".to_string(),
                    "activated2".to_string(),
                ],
            },
            ModelDescriptor {
                path: models_dir.join("bridge.json"),
                variables: vec!["t".to_string(), "crossings".to_string()],
            },
            ModelDescriptor {
                path: models_dir.join("train-gate.json"),
                variables: vec![
                    "t".to_string(),
                    "queue_len".to_string(),
                    "gate_open".to_string(),
                ],
            },
        ])
    }

    /// Loads a registry from a YAML descriptor list.
    pub fn from_file(path: &Path) -> Result<Self, OmxError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            OmxError::Config(
                ErrorInfo::new("registry-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        let models: Vec<ModelDescriptor> = serde_yaml::from_str(&contents).map_err(|err| {
            OmxError::Config(
                ErrorInfo::new("registry-parse", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        Ok(Self::new(models))
    }

    /// Iterates descriptors with their 1-based ordinals, which also key the
    /// persisted log file names.
    pub fn iter_indexed(&self) -> impl Iterator<Item = (usize, &ModelDescriptor)> {
        self.models.iter().enumerate().map(|(idx, m)| (idx + 1, m))
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
