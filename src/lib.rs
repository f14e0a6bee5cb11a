//! taskgate - a quality-gate task runner

pub mod cli;
pub mod core;
pub mod execution;
pub mod report;

// Re-export commonly used types
pub use crate::core::{FailurePolicy, Registry, RegistryError, RunState, Step, StepResult, Task, TaskResult};
pub use execution::{ExecutionEvent, ProcessRunner, RunOptions, SubprocessRunner, TaskExecutor};
pub use report::{summarize, Summary};
