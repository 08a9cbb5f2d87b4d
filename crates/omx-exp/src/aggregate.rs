//! Aggregation of run records into nested per-scenario structures.

use indexmap::IndexMap;
use omx_core::{summarize_records, RunRecord, Summary, PHASE_MATCHING};
use serde::{Deserialize, Serialize};

/// Runs and derived summary for one scenario of a matrix.
///
/// `runs` is `None` when the scenario was inapplicable (no observation data
/// available); the summary is then the explicit no-data value. Summaries
/// are recomputed from the records and never hand-edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioLog {
    /// Run records keyed by run index.
    pub runs: Option<IndexMap<usize, RunRecord>>,
    /// Min/max/average of the matching phase durations.
    pub summary: Summary,
}

impl ScenarioLog {
    /// Builds the log for an executed scenario, deriving the summary from
    /// the records' matching durations.
    pub fn from_records(runs: IndexMap<usize, RunRecord>) -> Self {
        let summary = summarize_records(runs.values(), PHASE_MATCHING);
        Self {
            runs: Some(runs),
            summary,
        }
    }

    /// The placeholder log for a scenario without observation data.
    pub fn absent() -> Self {
        Self {
            runs: None,
            summary: Summary::no_data(),
        }
    }

    /// Recomputes the summary from the stored records, e.g. after reload.
    pub fn rederive_summary(&self) -> Summary {
        match &self.runs {
            Some(runs) => summarize_records(runs.values(), PHASE_MATCHING),
            None => Summary::no_data(),
        }
    }
}

/// Scenario logs of one model, keyed by scenario name in declaration order.
pub type ScenarioTable = IndexMap<String, ScenarioLog>;

/// Two-level scenario logs of one model: observation type, then variant.
pub type GroupedScenarioTable = IndexMap<String, ScenarioTable>;

/// Positive and negative run records of one model's validation sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationLog {
    /// Positive runs keyed by run index.
    pub positives: IndexMap<usize, RunRecord>,
    /// Negative runs keyed by run index.
    pub negatives: IndexMap<usize, RunRecord>,
}
