//! Task domain model

use crate::core::{
    config::{EntryConfig, TaskConfig},
    error::{NameScope, RegistryError},
    step::{Step, StepDefaults},
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// What to do with the remaining steps after one fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop at the first failing step
    #[default]
    Abort,
    /// Run every step, then report the aggregate failure
    Continue,
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailurePolicy::Abort => write!(f, "abort"),
            FailurePolicy::Continue => write!(f, "continue"),
        }
    }
}

/// An entry in a task's step list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskEntry {
    /// A process to run
    Step(Step),
    /// Another task, expanded in place
    Task(String),
}

/// A named, ordered composition of steps and other tasks
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    pub name: String,

    pub description: Option<String>,

    pub entries: Vec<TaskEntry>,

    pub on_failure: FailurePolicy,
}

impl Task {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            entries: Vec::new(),
            on_failure: FailurePolicy::Abort,
        }
    }

    /// Create a task from a task config
    pub fn from_config(
        config: &TaskConfig,
        defaults: &StepDefaults,
    ) -> Result<Self, RegistryError> {
        let entries = config
            .steps
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                Ok(match entry.resolve(&config.name, index + 1)? {
                    EntryConfig::Reference(name) => TaskEntry::Task(name),
                    EntryConfig::Step(step) => TaskEntry::Step(Step::from_config(&step, defaults)),
                })
            })
            .collect::<Result<Vec<_>, RegistryError>>()?;

        Ok(Task {
            name: config.name.clone(),
            description: config.description.clone(),
            entries,
            on_failure: config.on_failure,
        })
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.on_failure = policy;
        self
    }

    pub fn with_step(mut self, step: Step) -> Self {
        self.entries.push(TaskEntry::Step(step));
        self
    }

    pub fn with_reference(mut self, task: impl Into<String>) -> Self {
        self.entries.push(TaskEntry::Task(task.into()));
        self
    }

    /// Steps declared directly in this task
    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.entries.iter().filter_map(|entry| match entry {
            TaskEntry::Step(step) => Some(step),
            TaskEntry::Task(_) => None,
        })
    }

    /// Names of tasks this task references directly
    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter_map(|entry| match entry {
            TaskEntry::Task(name) => Some(name.as_str()),
            TaskEntry::Step(_) => None,
        })
    }

    /// Check the task's own steps: unique names, non-empty commands, non-zero timeouts
    pub fn validate_steps(&self) -> Result<(), RegistryError> {
        let mut seen = HashSet::new();
        for step in self.steps() {
            if !seen.insert(step.name.as_str()) {
                return Err(RegistryError::DuplicateName {
                    scope: NameScope::Step {
                        task: self.name.clone(),
                    },
                    name: step.name.clone(),
                });
            }
            if step.program().is_empty() {
                return Err(RegistryError::EmptyCommand {
                    task: self.name.clone(),
                    step: step.name.clone(),
                });
            }
            if step.timeout_secs == Some(0) {
                return Err(RegistryError::ZeroTimeout {
                    task: self.name.clone(),
                    step: step.name.clone(),
                });
            }
        }
        Ok(())
    }
}
