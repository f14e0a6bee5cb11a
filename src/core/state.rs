//! Execution state models

use crate::core::{
    step::StepResult,
    task::{FailurePolicy, Task},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

/// Lifecycle of a single task run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    /// No step has started yet
    Pending,
    /// Steps are being executed
    Running,
    /// Every planned step ran (possibly with failures under `continue`)
    Completed,
    /// A step failed under the `abort` policy
    Aborted,
    /// Interrupted from outside
    Cancelled,
}

impl RunState {
    /// Check if the run is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::Aborted | RunState::Cancelled
        )
    }

    fn can_transition_to(&self, next: RunState) -> bool {
        match (self, next) {
            (RunState::Pending, RunState::Running) => true,
            // A run can be interrupted before its first step starts
            (RunState::Pending, RunState::Cancelled) => true,
            (RunState::Running, next) => next.is_terminal(),
            _ => false,
        }
    }
}

/// An in-flight task run
///
/// Created by the executor when a run begins and consumed by
/// [`TaskRun::finish`] once it reaches a terminal state.
#[derive(Debug)]
pub struct TaskRun {
    run_id: Uuid,
    task: Task,
    policy: FailurePolicy,
    state: RunState,
    step_results: Vec<StepResult>,
    started_at: Option<DateTime<Utc>>,
}

impl TaskRun {
    pub fn new(task: Task, policy: FailurePolicy) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            task,
            policy,
            state: RunState::Pending,
            step_results: Vec::new(),
            started_at: None,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Mark the run as started
    pub fn start(&mut self) {
        self.transition(RunState::Running);
        self.started_at = Some(Utc::now());
    }

    pub fn record(&mut self, result: StepResult) {
        self.step_results.push(result);
    }

    pub fn complete(&mut self) {
        self.transition(RunState::Completed);
    }

    pub fn abort(&mut self) {
        self.transition(RunState::Aborted);
    }

    pub fn cancel(&mut self) {
        self.transition(RunState::Cancelled);
    }

    fn transition(&mut self, next: RunState) {
        if !self.state.can_transition_to(next) {
            error!(
                "Invalid run state transition for '{}': {:?} -> {:?}",
                self.task.name, self.state, next
            );
            debug_assert!(false, "invalid transition {:?} -> {:?}", self.state, next);
            return;
        }
        self.state = next;
    }

    /// Freeze the run into its result
    pub fn finish(self) -> TaskResult {
        debug_assert!(self.state.is_terminal(), "finishing a {:?} run", self.state);
        let finished_at = Utc::now();
        TaskResult {
            run_id: self.run_id,
            task: self.task,
            policy: self.policy,
            step_results: self.step_results,
            state: self.state,
            started_at: self.started_at.unwrap_or(finished_at),
            finished_at,
        }
    }
}

/// Outcome of a finished task run
#[derive(Debug, Clone, Serialize)]
pub struct TaskResult {
    pub run_id: Uuid,

    pub task: Task,

    /// Policy in effect for this run (task policy unless overridden)
    pub policy: FailurePolicy,

    /// Results of the steps that ran, in execution order
    pub step_results: Vec<StepResult>,

    pub state: RunState,

    pub started_at: DateTime<Utc>,

    pub finished_at: DateTime<Utc>,
}

impl TaskResult {
    pub fn aborted(&self) -> bool {
        self.state == RunState::Aborted
    }

    pub fn cancelled(&self) -> bool {
        self.state == RunState::Cancelled
    }

    /// Every recorded step passed and the run was not interrupted
    pub fn success(&self) -> bool {
        !self.cancelled() && self.step_results.iter().all(StepResult::passed)
    }

    pub fn failed_steps(&self) -> impl Iterator<Item = &StepResult> {
        self.step_results.iter().filter(|r| !r.passed())
    }

    pub fn first_failure(&self) -> Option<&StepResult> {
        self.failed_steps().next()
    }
}
