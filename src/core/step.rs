//! Step domain model

use crate::core::config::StepConfig;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Exit code recorded for a step whose process could not be started
pub const LAUNCH_FAILURE_EXIT_CODE: i32 = 127;

/// Exit code recorded for a step killed after exceeding its timeout
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Exit code recorded for a process that terminated without one (e.g. killed by a signal)
pub const SIGNAL_EXIT_CODE: i32 = -1;

/// A single external-process invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    /// Step name, unique within its task
    pub name: String,

    /// Executable followed by its arguments
    pub command: Vec<String>,

    /// Directory to run in (defaults to the current directory)
    pub working_dir: Option<PathBuf>,

    /// Kill the process after this many seconds
    pub timeout_secs: Option<u64>,

    /// Extra environment variables for the process
    pub env: HashMap<String, String>,
}

/// Values inherited by every step unless the step overrides them
#[derive(Debug, Clone, Default)]
pub struct StepDefaults {
    pub timeout_secs: Option<u64>,
    pub env: HashMap<String, String>,
}

impl Step {
    /// Create a step with just a name and a command line
    pub fn new<N, I, S>(name: N, command: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            command: command.into_iter().map(Into::into).collect(),
            working_dir: None,
            timeout_secs: None,
            env: HashMap::new(),
        }
    }

    /// Create a step from a step config
    pub fn from_config(config: &StepConfig, defaults: &StepDefaults) -> Self {
        let mut env = defaults.env.clone();
        env.extend(config.env.clone());

        Step {
            name: config.name.clone(),
            command: config.command.clone(),
            working_dir: config.working_dir.clone(),
            timeout_secs: config.timeout_secs.or(defaults.timeout_secs),
            env,
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// The executable to launch
    pub fn program(&self) -> &str {
        self.command.first().map(String::as_str).unwrap_or_default()
    }

    /// Arguments passed to the executable
    pub fn args(&self) -> &[String] {
        self.command.get(1..).unwrap_or_default()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Command line as a single display string
    pub fn display_command(&self) -> String {
        self.command
            .iter()
            .map(|part| {
                if part.is_empty() || part.contains(char::is_whitespace) {
                    format!("'{}'", part)
                } else {
                    part.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// One element of a flattened task: the step plus the task that declared it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedStep {
    pub task: String,
    pub step: Step,
}

/// How a finished step ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepOutcome {
    /// Exit code 0
    Passed,
    /// Ran and exited nonzero (or was killed by a signal)
    Failed,
    /// The process never started
    LaunchFailed { reason: String },
    /// Killed after exceeding its timeout
    TimedOut { after_secs: u64 },
}

/// Record of one executed step
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    /// Task that declared the step
    pub task: String,

    pub step: Step,

    pub exit_code: i32,

    #[serde(skip)]
    pub stdout: Vec<u8>,

    #[serde(skip)]
    pub stderr: Vec<u8>,

    pub duration: Duration,

    pub started_at: DateTime<Utc>,

    pub outcome: StepOutcome,
}

impl StepResult {
    /// Check if the step passed
    pub fn passed(&self) -> bool {
        self.exit_code == 0
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Human-readable reason for a failure, `None` when the step passed
    pub fn failure_reason(&self) -> Option<String> {
        match &self.outcome {
            StepOutcome::Passed => None,
            StepOutcome::Failed => Some(format!("exited with code {}", self.exit_code)),
            StepOutcome::LaunchFailed { reason } => Some(reason.clone()),
            StepOutcome::TimedOut { after_secs } => {
                Some(format!("timed out after {}s", after_secs))
            }
        }
    }

    pub fn duration_ms(&self) -> u128 {
        self.duration.as_millis()
    }
}
