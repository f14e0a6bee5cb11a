//! Task executor - runs a task's flattened steps in order

use crate::{
    core::{
        FailurePolicy, PlannedStep, Registry, RunState, Step, StepOutcome, StepResult, Task,
        TaskResult, TaskRun, LAUNCH_FAILURE_EXIT_CODE, SIGNAL_EXIT_CODE, TIMEOUT_EXIT_CODE,
    },
    execution::process::{ProcessOutcome, ProcessRunner},
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

/// Events that can occur during a task run
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    TaskStarted {
        run_id: Uuid,
        task_name: String,
        policy: FailurePolicy,
        total_steps: usize,
    },
    StepStarted {
        index: usize,
        total_steps: usize,
        task_name: String,
        step: Step,
    },
    StepFinished {
        index: usize,
        total_steps: usize,
        result: StepResult,
    },
    TaskFinished {
        run_id: Uuid,
        task_name: String,
        state: RunState,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(&ExecutionEvent) + Send + Sync>;

/// Per-run overrides
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Replace the task's own failure policy
    pub on_failure: Option<FailurePolicy>,

    /// Environment layered over every step's configured environment
    pub env: HashMap<String, String>,
}

/// Runs tasks step by step through a [`ProcessRunner`]
pub struct TaskExecutor<R> {
    runner: R,
    options: RunOptions,
    event_handlers: Vec<EventHandler>,
}

impl<R: ProcessRunner> TaskExecutor<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            options: RunOptions::default(),
            event_handlers: Vec::new(),
        }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(&ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
    }

    fn emit_event(&self, event: ExecutionEvent) {
        for handler in &self.event_handlers {
            handler(&event);
        }
    }

    /// The failure policy a run of `task` would use
    pub fn effective_policy(&self, task: &Task) -> FailurePolicy {
        self.options.on_failure.unwrap_or(task.on_failure)
    }

    /// Run a task to a terminal state
    ///
    /// The top-level task's policy (or the override) is applied to every
    /// step of the flattened plan. Step failures are recorded in the result,
    /// never returned as errors.
    pub async fn run(
        &self,
        registry: &Registry,
        task: &Task,
        cancel: &CancellationToken,
    ) -> TaskResult {
        let plan = registry.flatten(task);
        let total_steps = plan.len();
        let policy = self.effective_policy(task);

        let mut run = TaskRun::new(task.clone(), policy);

        if cancel.is_cancelled() {
            info!("Task {} cancelled before start", task.name);
            run.cancel();
            return self.finish(run, &task.name);
        }

        run.start();
        info!(
            "Starting task {} ({} steps, on failure: {})",
            task.name, total_steps, policy
        );
        self.emit_event(ExecutionEvent::TaskStarted {
            run_id: run.run_id(),
            task_name: task.name.clone(),
            policy,
            total_steps,
        });

        for (index, planned) in plan.into_iter().enumerate() {
            if cancel.is_cancelled() {
                info!("Task {} cancelled before step {}", task.name, planned.step.name);
                run.cancel();
                break;
            }

            let PlannedStep { task: owner, step } = planned;
            let step = self.prepare_step(step);

            self.emit_event(ExecutionEvent::StepStarted {
                index,
                total_steps,
                task_name: owner.clone(),
                step: step.clone(),
            });

            let started_at = Utc::now();
            let clock = Instant::now();
            let outcome = self.runner.run(&step, cancel).await;
            let duration = clock.elapsed();

            // The child may exit from the same interrupt before the token is seen.
            if cancel.is_cancelled() {
                info!("Task {} cancelled during step {}", task.name, step.name);
                run.cancel();
                break;
            }

            let step_name = step.name.clone();
            let Some(result) = build_step_result(owner, step, outcome, started_at, duration)
            else {
                info!("Task {} cancelled during step {}", task.name, step_name);
                run.cancel();
                break;
            };

            let failed = !result.passed();
            if failed {
                warn!(
                    "Step {} failed: {}",
                    result.step.name,
                    result.failure_reason().unwrap_or_default()
                );
            } else {
                info!("Step {} passed in {:?}", result.step.name, result.duration);
            }

            self.emit_event(ExecutionEvent::StepFinished {
                index,
                total_steps,
                result: result.clone(),
            });
            run.record(result);

            if failed && policy == FailurePolicy::Abort {
                warn!("Aborting task {} after failed step", task.name);
                run.abort();
                break;
            }
        }

        if run.state() == RunState::Running {
            run.complete();
        }

        self.finish(run, &task.name)
    }

    fn finish(&self, run: TaskRun, task_name: &str) -> TaskResult {
        let result = run.finish();
        info!("Task {} finished: {:?}", task_name, result.state);
        self.emit_event(ExecutionEvent::TaskFinished {
            run_id: result.run_id,
            task_name: task_name.to_string(),
            state: result.state,
        });
        result
    }

    fn prepare_step(&self, mut step: Step) -> Step {
        step.env.extend(self.options.env.clone());
        step
    }
}

/// Turn a process outcome into a step result
///
/// Returns `None` for a cancelled process: interrupted steps are not recorded.
fn build_step_result(
    task: String,
    step: Step,
    outcome: ProcessOutcome,
    started_at: chrono::DateTime<Utc>,
    duration: std::time::Duration,
) -> Option<StepResult> {
    let (exit_code, stdout, stderr, outcome) = match outcome {
        ProcessOutcome::Exited {
            code,
            stdout,
            stderr,
        } => {
            let exit_code = code.unwrap_or(SIGNAL_EXIT_CODE);
            let outcome = if exit_code == 0 {
                StepOutcome::Passed
            } else {
                StepOutcome::Failed
            };
            (exit_code, stdout, stderr, outcome)
        }
        ProcessOutcome::LaunchFailed(reason) => (
            LAUNCH_FAILURE_EXIT_CODE,
            Vec::new(),
            reason.clone().into_bytes(),
            StepOutcome::LaunchFailed { reason },
        ),
        ProcessOutcome::TimedOut {
            after,
            stdout,
            stderr,
        } => (
            TIMEOUT_EXIT_CODE,
            stdout,
            stderr,
            StepOutcome::TimedOut {
                after_secs: after.as_secs(),
            },
        ),
        ProcessOutcome::Cancelled => return None,
    };

    Some(StepResult {
        task,
        step,
        exit_code,
        stdout,
        stderr,
        duration,
        started_at,
        outcome,
    })
}
