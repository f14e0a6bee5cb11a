//! Test utility functions for taskgate

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use taskgate::core::config::TaskFileConfig;
use taskgate::core::{Registry, RunState, Step, TaskResult};
use taskgate::execution::{ProcessOutcome, ProcessRunner, RunOptions, TaskExecutor};
use tokio_util::sync::CancellationToken;

/// Mock runner that returns scripted exit codes per step name
///
/// Steps without a scripted code exit 0. Every invocation is recorded so
/// tests can check exactly which steps ran and how often.
#[derive(Clone, Default)]
pub struct MockRunner {
    exit_codes: Arc<HashMap<String, i32>>,
    launch_failures: Arc<Vec<String>>,
    invocations: Arc<Mutex<Vec<String>>>,
    interrupt: Option<(String, ProcessOutcome)>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script exit codes for the named steps
    pub fn with_exit_codes(mut self, codes: &[(&str, i32)]) -> Self {
        self.exit_codes = Arc::new(
            codes
                .iter()
                .map(|(name, code)| (name.to_string(), *code))
                .collect(),
        );
        self
    }

    /// Make the named steps fail to launch
    pub fn with_launch_failures(mut self, names: &[&str]) -> Self {
        self.launch_failures = Arc::new(names.iter().map(|n| n.to_string()).collect());
        self
    }

    /// Simulate an operator interrupt while the named step runs
    ///
    /// The runner notices the token and reports the step as cancelled.
    pub fn interrupt_at(mut self, name: &str) -> Self {
        self.interrupt = Some((name.to_string(), ProcessOutcome::Cancelled));
        self
    }

    /// Simulate an interrupt that also reaches the child process
    ///
    /// The child exits with `code` (`None` for killed by the signal) before
    /// the runner sees the token, so the runner reports an ordinary exit.
    pub fn interrupt_with_exit(mut self, name: &str, code: Option<i32>) -> Self {
        self.interrupt = Some((
            name.to_string(),
            ProcessOutcome::Exited {
                code,
                stdout: Vec::new(),
                stderr: b"KeyboardInterrupt\n".to_vec(),
            },
        ));
        self
    }

    /// Step names in the order they were invoked
    pub fn invocations(&self) -> Vec<String> {
        self.invocations.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessRunner for MockRunner {
    async fn run(&self, step: &Step, cancel: &CancellationToken) -> ProcessOutcome {
        self.invocations.lock().unwrap().push(step.name.clone());

        if let Some((name, outcome)) = &self.interrupt {
            if *name == step.name {
                cancel.cancel();
                return outcome.clone();
            }
        }

        if self.launch_failures.contains(&step.name) {
            ProcessOutcome::LaunchFailed(format!("failed to launch '{}'", step.program()))
        } else {
            let code = self.exit_codes.get(&step.name).copied().unwrap_or(0);
            ProcessOutcome::Exited {
                code: Some(code),
                stdout: format!("ran {}\n", step.name).into_bytes(),
                stderr: Vec::new(),
            }
        }
    }
}

/// Parse a registry from a YAML task file
pub fn registry_from_yaml(yaml: &str) -> Registry {
    TaskFileConfig::from_yaml(yaml)
        .and_then(|config| config.to_registry())
        .unwrap_or_else(|e| panic!("Failed to load task YAML: {}", e))
}

/// Run a task with a mock runner
pub async fn run_task_with_mock(
    registry: &Registry,
    task_name: &str,
    runner: MockRunner,
) -> TaskResult {
    run_task_with_options(registry, task_name, runner, RunOptions::default()).await
}

/// Run a task with a mock runner and per-run overrides
pub async fn run_task_with_options<R: ProcessRunner>(
    registry: &Registry,
    task_name: &str,
    runner: R,
    options: RunOptions,
) -> TaskResult {
    let task = registry
        .resolve(task_name)
        .unwrap_or_else(|e| panic!("Task lookup failed: {}", e));
    let executor = TaskExecutor::new(runner).with_options(options);
    executor.run(registry, task, &CancellationToken::new()).await
}

/// Names of the steps that produced results, in order
pub fn step_names(result: &TaskResult) -> Vec<String> {
    result
        .step_results
        .iter()
        .map(|r| r.step.name.clone())
        .collect()
}

/// Assert the recorded steps, in order
pub fn assert_steps_ran(result: &TaskResult, expected: &[&str]) {
    let actual = step_names(result);
    assert_eq!(
        actual, expected,
        "Expected steps: {:?}\nActual: {:?}",
        expected, actual
    );
}

/// Assert the run completed and every step passed
pub fn assert_task_succeeded(result: &TaskResult) {
    assert!(
        result.success() && result.state == RunState::Completed,
        "Task should have succeeded, but was {:?} with failures {:?}",
        result.state,
        result
            .failed_steps()
            .map(|r| (r.step.name.clone(), r.exit_code))
            .collect::<Vec<_>>()
    );
}

/// Assert the run failed and ended in the given state
pub fn assert_task_failed(result: &TaskResult, state: RunState) {
    assert!(!result.success(), "Task should have failed");
    assert_eq!(result.state, state, "Unexpected terminal state");
}

/// Task file with three independent steps `a`, `b`, `c`
pub fn three_step_yaml(policy: &str) -> String {
    format!(
        r#"
tasks:
  - name: gate
    on_failure: {}
    steps:
      - name: a
        command: ["tool-a"]
      - name: b
        command: ["tool-b"]
      - name: c
        command: ["tool-c"]
"#,
        policy
    )
}
