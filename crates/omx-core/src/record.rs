//! Per-cell run records.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::observation::ObservationData;

/// Phase name under which matching durations are recorded.
pub const PHASE_MATCHING: &str = "matching";

/// One matrix cell's result: elapsed durations keyed by phase name, the
/// matching outcome flags, and optional payloads for later review.
///
/// Records are authoritative; summaries are recomputed views over them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Elapsed wall-clock seconds per phase.
    pub durations: IndexMap<String, f64>,
    /// The observation dataset used, kept for reproducibility.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obs_data: Option<ObservationData>,
    /// Whether the matcher found a consistent trace.
    pub is_matching: bool,
    /// Whether the matcher hit its wall-clock budget.
    pub is_timeout: bool,
    /// Whether the matched trace replayed on the original model
    /// (positive validation runs only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_simulated: Option<bool>,
    /// Whether the matched trace was included in the replayed trace
    /// (positive validation runs only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_included: Option<bool>,
}

impl RunRecord {
    /// An empty record awaiting outcome data.
    pub fn empty() -> Self {
        Self {
            durations: IndexMap::new(),
            obs_data: None,
            is_matching: false,
            is_timeout: false,
            is_simulated: None,
            is_included: None,
        }
    }

    /// The recorded duration of the named phase, if present.
    pub fn phase_duration(&self, phase: &str) -> Option<f64> {
        self.durations.get(phase).copied()
    }
}

impl Default for RunRecord {
    fn default() -> Self {
        Self::empty()
    }
}
