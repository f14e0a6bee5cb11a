//! Task execution

pub mod executor;
pub mod process;

pub use executor::{EventHandler, ExecutionEvent, RunOptions, TaskExecutor};
pub use process::{ProcessOutcome, ProcessRunner, SubprocessRunner};
