//! Observation datasets exchanged with the generator and matcher.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One time-stamped partial snapshot of variables and process locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationPoint {
    /// Observation time stamp.
    pub time: i64,
    /// Observed variable values (possibly a subset of the observables).
    #[serde(default)]
    pub values: IndexMap<String, i64>,
    /// Observed process locations; empty unless location observation is on.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub locations: IndexMap<String, String>,
}

/// An ordered sequence of observation points. Consumed read-only by the
/// matcher; carried in run records for later review.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObservationData {
    pub points: Vec<ObservationPoint>,
}

impl ObservationData {
    pub fn new(points: Vec<ObservationPoint>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
