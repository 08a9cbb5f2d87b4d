//! Min/max/average reduction over run durations.

use serde::{Deserialize, Serialize};

use crate::record::RunRecord;

/// Exact extrema plus arithmetic mean of a non-empty sample, serialized as
/// a `[min, max, avg]` triple.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinMaxAvg(pub f64, pub f64, pub f64);

impl MinMaxAvg {
    pub fn min(&self) -> f64 {
        self.0
    }

    pub fn max(&self) -> f64 {
        self.1
    }

    pub fn avg(&self) -> f64 {
        self.2
    }
}

/// Derived summary of a numeric sample. An absent or empty sample yields
/// the explicit no-data value; callers must branch on it rather than assume
/// the numeric fields exist.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Summary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_max_avg: Option<MinMaxAvg>,
}

impl Summary {
    /// The explicit no-data summary.
    pub fn no_data() -> Self {
        Self { min_max_avg: None }
    }

    pub fn has_data(&self) -> bool {
        self.min_max_avg.is_some()
    }
}

/// Reduces a sample to its summary. Empty samples never panic and never
/// produce zeros; they yield the no-data value.
pub fn summarize(samples: &[f64]) -> Summary {
    if samples.is_empty() {
        return Summary::no_data();
    }
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut total = 0.0;
    for &sample in samples {
        min = min.min(sample);
        max = max.max(sample);
        total += sample;
    }
    Summary {
        min_max_avg: Some(MinMaxAvg(min, max, total / samples.len() as f64)),
    }
}

/// Extracts the named phase's duration from every record and summarizes
/// the resulting sample. Records without the phase contribute nothing.
pub fn summarize_records<'a, I>(records: I, phase: &str) -> Summary
where
    I: IntoIterator<Item = &'a RunRecord>,
{
    let samples: Vec<f64> = records
        .into_iter()
        .filter_map(|record| record.phase_duration(phase))
        .collect();
    summarize(&samples)
}
