//! Discrete transition traces and the inclusion check.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One executed transition together with the state it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    /// Time at which the transition fired.
    pub time: i64,
    /// Edge identifiers triggered by the transition.
    pub triggered_edges: Vec<String>,
    /// Variable values after the transition.
    #[serde(default)]
    pub values: IndexMap<String, i64>,
}

/// A sequence of transitions, either matched by the matcher or produced by
/// replaying a run on the original model.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Trace {
    pub transitions: Vec<Transition>,
}

impl Trace {
    pub fn new(transitions: Vec<Transition>) -> Self {
        Self { transitions }
    }

    /// Checks whether `other`'s transitions appear in order within this
    /// trace, compared by their triggered edge sets.
    pub fn includes(&self, other: &Trace) -> bool {
        let mut own = self.transitions.iter();
        other.transitions.iter().all(|needle| {
            own.by_ref()
                .any(|candidate| candidate.triggered_edges == needle.triggered_edges)
        })
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transition(edge: &str) -> Transition {
        Transition {
            time: 0,
            triggered_edges: vec![edge.to_string()],
            values: IndexMap::new(),
        }
    }

    #[test]
    fn includes_subsequences_only() {
        let full = Trace::new(vec![transition("a"), transition("b"), transition("c")]);
        let sub = Trace::new(vec![transition("a"), transition("c")]);
        let reordered = Trace::new(vec![transition("c"), transition("a")]);
        assert!(full.includes(&sub));
        assert!(full.includes(&full.clone()));
        assert!(!full.includes(&reordered));
        assert!(!sub.includes(&full));
    }

    #[test]
    fn empty_trace_is_included_everywhere() {
        let full = Trace::new(vec![transition("a")]);
        assert!(full.includes(&Trace::default()));
        assert!(Trace::default().includes(&Trace::default()));
    }
}
