//! Named-task capability interface.
//!
//! Every experiment and every report task is exposed as a named, described,
//! runnable unit; consumers (the CLI, scripts) dispatch through the
//! registry without knowing the concrete task types.

use indexmap::IndexMap;
use tracing::info;

use omx_core::{ErrorInfo, OmxError};

/// A runnable named task.
pub trait Task {
    /// Stable task name, e.g. `exp.systematic.obs_types`.
    fn name(&self) -> &str;
    /// One-line human readable description.
    fn description(&self) -> &str;
    /// Executes the task.
    fn run(&self) -> Result<(), OmxError>;
}

/// A task backed by a closure. The lifetime ties the closure to the
/// harness state it borrows.
pub struct FnTask<'a> {
    name: String,
    description: String,
    action: Box<dyn Fn() -> Result<(), OmxError> + 'a>,
}

impl<'a> FnTask<'a> {
    /// Wraps a closure as a named task.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        action: impl Fn() -> Result<(), OmxError> + 'a,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            action: Box::new(action),
        }
    }
}

impl Task for FnTask<'_> {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn run(&self) -> Result<(), OmxError> {
        (self.action)()
    }
}

/// Ordered registry of named tasks, constructed once at process start.
#[derive(Default)]
pub struct TaskRegistry<'a> {
    tasks: IndexMap<String, Box<dyn Task + 'a>>,
}

impl<'a> TaskRegistry<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a task under its own name. Declaration order is
    /// execution and listing order.
    pub fn register(&mut self, task: Box<dyn Task + 'a>) {
        self.tasks.insert(task.name().to_string(), task);
    }

    /// Name/description pairs in declaration order.
    pub fn descriptions(&self) -> Vec<(String, String)> {
        self.tasks
            .values()
            .map(|task| (task.name().to_string(), task.description().to_string()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Runs the named tasks in declaration order; an empty selection runs
    /// every registered task. Unknown names fail before anything runs.
    pub fn run_named(&self, names: &[String]) -> Result<(), OmxError> {
        for name in names {
            if !self.tasks.contains_key(name) {
                return Err(OmxError::Config(
                    ErrorInfo::new("task-unknown", "no task registered under the name")
                        .with_context("name", name.clone())
                        .with_hint(format!(
                            "available: {}",
                            self.tasks.keys().cloned().collect::<Vec<_>>().join(", ")
                        )),
                ));
            }
        }
        for task in self.tasks.values() {
            if !names.is_empty() && !names.iter().any(|name| name == task.name()) {
                continue;
            }
            info!(task = task.name(), "running task");
            task.run()?;
        }
        Ok(())
    }
}
