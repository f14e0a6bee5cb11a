//! Load-time errors
//!
//! Everything here is fatal: a task file that produces one of these never
//! becomes a [`Registry`](crate::core::Registry), and no step runs.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading task definitions or building the registry
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown task '{name}'{}", referenced_by_suffix(.referenced_by))]
    UnknownTask {
        name: String,
        referenced_by: Option<String>,
    },

    #[error("cyclic task reference: {}", .path.join(" -> "))]
    CyclicReference { path: Vec<String> },

    #[error("duplicate {scope} name '{name}'")]
    DuplicateName { scope: NameScope, name: String },

    #[error("step '{step}' in task '{task}' has an empty command")]
    EmptyCommand { task: String, step: String },

    #[error("step '{step}' in task '{task}' has a zero timeout")]
    ZeroTimeout { task: String, step: String },

    #[error("step #{position} in task '{task}' is invalid: {reason}")]
    InvalidStep {
        task: String,
        position: usize,
        reason: String,
    },

    #[error("failed to read task file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid task file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Where a duplicated name was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameScope {
    /// Two tasks in the registry
    Task,
    /// Two steps inside the named task
    Step { task: String },
}

impl std::fmt::Display for NameScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NameScope::Task => write!(f, "task"),
            NameScope::Step { task } => write!(f, "step (in task '{}')", task),
        }
    }
}

fn referenced_by_suffix(referenced_by: &Option<String>) -> String {
    match referenced_by {
        Some(task) => format!(" (referenced by '{}')", task),
        None => String::new(),
    }
}
