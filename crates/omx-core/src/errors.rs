//! Structured error types shared across OMX crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`OmxError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (model names, scenario keys, paths, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the OMX harness.
///
/// Timeouts are deliberately absent: a timed-out matching attempt is a
/// regular [`crate::engine::MatchOutcome`] with `is_timeout` set, not an
/// error. Likewise an empty aggregation sample yields the explicit no-data
/// [`crate::summary::Summary`] instead of a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum OmxError {
    /// Configuration loading or layering errors. Fatal before any cell runs.
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// Model loading, instance extraction, or preprocessing errors.
    #[error("model error: {0}")]
    Model(ErrorInfo),
    /// Unexpected matcher collaborator failures (distinct from timeout).
    #[error("matcher error: {0}")]
    Matcher(ErrorInfo),
    /// Trace replay errors raised by the simulator collaborator.
    #[error("simulation error: {0}")]
    Simulation(ErrorInfo),
    /// A correctness assertion of an experiment failed. Always fatal; the
    /// payload carries the full diagnostic context.
    #[error("experiment invariant violation: {0}")]
    Invariant(ErrorInfo),
    /// Serialization, persistence, and report encoding errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl OmxError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            OmxError::Config(info)
            | OmxError::Model(info)
            | OmxError::Matcher(info)
            | OmxError::Simulation(info)
            | OmxError::Invariant(info)
            | OmxError::Serde(info) => info,
        }
    }
}
