//! Task file configuration from YAML

use crate::core::{
    error::RegistryError,
    registry::Registry,
    step::StepDefaults,
    task::{FailurePolicy, Task},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Task file looked up in the current directory when `--file` is not given
pub const DEFAULT_TASK_FILE: &str = "taskgate.yaml";

/// Template task definitions shipped with the binary
pub const BUILTIN_TASKS: &str = include_str!("../../defaults/tasks.yaml");

/// Top-level task file loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskFileConfig {
    /// Default timeout for steps (in seconds)
    #[serde(default)]
    pub default_timeout_secs: Option<u64>,

    /// Environment variables applied to every step
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Task definitions, in the order they are listed
    pub tasks: Vec<TaskConfig>,
}

/// Task configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Unique task name
    pub name: String,

    /// Optional task description
    #[serde(default)]
    pub description: Option<String>,

    /// What to do after a failing step
    #[serde(default)]
    pub on_failure: FailurePolicy,

    /// Steps and task references, in execution order
    #[serde(default)]
    pub steps: Vec<StepEntryConfig>,
}

/// One entry of a task's `steps` list, before its shape is checked
///
/// An entry is either a task reference (`task: <name>` and nothing else) or
/// a step (`name` and `command`, plus optional settings). Both shapes share
/// one struct so a malformed entry can be reported by field name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepEntryConfig {
    /// Name of a task to expand in place
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,

    /// Step name, unique within the task
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Executable followed by its arguments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,

    /// Directory to run in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,

    /// Timeout for this step (overrides global)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Environment for this step (overrides global)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
}

/// A step entry whose shape has been checked
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryConfig {
    Reference(String),
    Step(StepConfig),
}

/// Step settings from a well-formed step entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepConfig {
    pub name: String,
    pub command: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
    pub env: HashMap<String, String>,
}

impl StepEntryConfig {
    /// Decide whether this entry is a step or a task reference
    ///
    /// `position` is the 1-based index of the entry in its task, used in errors.
    pub fn resolve(&self, task: &str, position: usize) -> Result<EntryConfig, RegistryError> {
        let invalid = |reason: String| RegistryError::InvalidStep {
            task: task.to_string(),
            position,
            reason,
        };

        if let Some(reference) = &self.task {
            if let Some(field) = self.step_fields().first() {
                return Err(invalid(format!(
                    "a reference to task '{}' cannot also set '{}'",
                    reference, field
                )));
            }
            return Ok(EntryConfig::Reference(reference.clone()));
        }

        let name = self
            .name
            .clone()
            .ok_or_else(|| invalid("missing 'name' (or 'task' to reference a task)".to_string()))?;
        let command = self
            .command
            .clone()
            .ok_or_else(|| invalid(format!("step '{}' is missing 'command'", name)))?;

        Ok(EntryConfig::Step(StepConfig {
            name,
            command,
            working_dir: self.working_dir.clone(),
            timeout_secs: self.timeout_secs,
            env: self.env.clone(),
        }))
    }

    fn step_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.name.is_some() {
            fields.push("name");
        }
        if self.command.is_some() {
            fields.push("command");
        }
        if self.working_dir.is_some() {
            fields.push("working_dir");
        }
        if self.timeout_secs.is_some() {
            fields.push("timeout_secs");
        }
        if !self.env.is_empty() {
            fields.push("env");
        }
        fields
    }
}

/// Where the task definitions came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Builtin,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "{}", path.display()),
            ConfigSource::Builtin => write!(f, "built-in template"),
        }
    }
}

impl TaskFileConfig {
    /// Load task definitions from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Parse task definitions from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, RegistryError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// The template definitions embedded in the binary
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::from_yaml(BUILTIN_TASKS)
    }

    /// Pick the task file to use
    ///
    /// An explicit path wins; otherwise `taskgate.yaml` in `dir` is used if
    /// present, falling back to the built-in template.
    pub fn discover(
        explicit: Option<&Path>,
        dir: &Path,
    ) -> Result<(Self, ConfigSource), RegistryError> {
        if let Some(path) = explicit {
            debug!("Using task file from command line: {}", path.display());
            return Ok((Self::from_file(path)?, ConfigSource::File(path.to_path_buf())));
        }

        let local = dir.join(DEFAULT_TASK_FILE);
        if local.is_file() {
            debug!("Using task file {}", local.display());
            return Ok((Self::from_file(&local)?, ConfigSource::File(local)));
        }

        debug!("No {} found, using built-in template", DEFAULT_TASK_FILE);
        Ok((Self::builtin()?, ConfigSource::Builtin))
    }

    fn step_defaults(&self) -> StepDefaults {
        StepDefaults {
            timeout_secs: self.default_timeout_secs,
            env: self.env.clone(),
        }
    }

    /// Convert the configured tasks into domain tasks
    pub fn to_tasks(&self) -> Result<Vec<Task>, RegistryError> {
        let defaults = self.step_defaults();
        self.tasks
            .iter()
            .map(|task| Task::from_config(task, &defaults))
            .collect()
    }

    /// Build a validated registry from this configuration
    pub fn to_registry(&self) -> Result<Registry, RegistryError> {
        Registry::load(self.to_tasks()?)
    }
}
