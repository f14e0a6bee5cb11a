//! Run summaries and the process exit code

use crate::core::{RunState, TaskResult};
use serde::{Deserialize, Serialize};

/// Exit code for a run that was interrupted before any step failed
pub const CANCELLED_EXIT_CODE: i32 = 130;

/// Exit code for task-file and registry errors
pub const CONFIG_ERROR_EXIT_CODE: i32 = 2;

/// Summary of a task run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub task_name: String,

    /// Steps that actually ran
    pub total_steps: usize,

    pub failed_steps: usize,

    pub aborted: bool,

    pub cancelled: bool,

    pub overall_success: bool,

    /// Process exit code for the whole run
    pub exit_code: i32,

    pub state: RunState,
}

/// Project a task result into its summary
pub fn summarize(result: &TaskResult) -> Summary {
    let overall_success = result.success();
    let exit_code = if overall_success {
        0
    } else if let Some(failure) = result.first_failure() {
        failure.exit_code
    } else {
        CANCELLED_EXIT_CODE
    };

    Summary {
        task_name: result.task.name.clone(),
        total_steps: result.step_results.len(),
        failed_steps: result.failed_steps().count(),
        aborted: result.aborted(),
        cancelled: result.cancelled(),
        overall_success,
        exit_code,
        state: result.state,
    }
}
