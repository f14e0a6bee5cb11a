//! Test: Failure Policy - abort vs continue after a failing step

use crate::helpers::*;
use taskgate::core::{FailurePolicy, RunState, StepOutcome, LAUNCH_FAILURE_EXIT_CODE};
use taskgate::execution::RunOptions;
use taskgate::report::summarize;

/// Abort stops at the first failure; later steps never run
#[tokio::test]
async fn test_abort_stops_after_first_failure() {
    let registry = registry_from_yaml(&three_step_yaml("abort"));
    let runner = MockRunner::new().with_exit_codes(&[("a", 1)]);

    let result = run_task_with_mock(&registry, "gate", runner.clone()).await;

    assert_task_failed(&result, RunState::Aborted);
    assert!(result.aborted());
    assert_steps_ran(&result, &["a"]);
    assert_eq!(runner.invocations(), vec!["a"]);

    let summary = summarize(&result);
    assert!(summary.aborted);
    assert_eq!(summary.exit_code, 1);
}

/// Continue runs every step exactly once and still reports failure
#[tokio::test]
async fn test_continue_runs_all_steps() {
    let registry = registry_from_yaml(&three_step_yaml("continue"));
    let runner = MockRunner::new().with_exit_codes(&[("a", 1)]);

    let result = run_task_with_mock(&registry, "gate", runner.clone()).await;

    assert_task_failed(&result, RunState::Completed);
    assert!(!result.aborted());
    assert_steps_ran(&result, &["a", "b", "c"]);
    assert_eq!(runner.invocations(), vec!["a", "b", "c"]);
}

/// The exit code is the first failing step's, not the last
#[tokio::test]
async fn test_exit_code_from_first_failure() {
    let registry = registry_from_yaml(&three_step_yaml("continue"));
    let runner = MockRunner::new().with_exit_codes(&[("b", 3), ("c", 9)]);

    let result = run_task_with_mock(&registry, "gate", runner).await;

    let summary = summarize(&result);
    assert_eq!(summary.failed_steps, 2);
    assert_eq!(summary.exit_code, 3);
}

/// A step that cannot start is a failure subject to the same policy
#[tokio::test]
async fn test_launch_failure_follows_policy() {
    let registry = registry_from_yaml(&three_step_yaml("abort"));
    let runner = MockRunner::new().with_launch_failures(&["b"]);

    let result = run_task_with_mock(&registry, "gate", runner).await;

    assert_task_failed(&result, RunState::Aborted);
    assert_steps_ran(&result, &["a", "b"]);
    assert_eq!(result.step_results[1].exit_code, LAUNCH_FAILURE_EXIT_CODE);
    assert!(matches!(
        result.step_results[1].outcome,
        StepOutcome::LaunchFailed { .. }
    ));
    assert_eq!(summarize(&result).exit_code, LAUNCH_FAILURE_EXIT_CODE);
}

/// The top-level task's policy governs steps pulled in from referenced tasks
#[tokio::test]
async fn test_top_level_policy_governs_nested_steps() {
    let yaml = r#"
tasks:
  - name: metrics
    on_failure: continue
    steps:
      - name: vulture
        command: ["vulture", "."]
      - name: radon
        command: ["radon", "cc", "."]
  - name: strict
    on_failure: abort
    steps:
      - task: metrics
      - name: pytest
        command: ["pytest"]
  - name: lenient
    on_failure: continue
    steps:
      - name: mypy
        command: ["mypy", "."]
      - task: strict
"#;
    let registry = registry_from_yaml(yaml);

    // metrics says continue, but strict (the task being run) says abort
    let strict = run_task_with_mock(
        &registry,
        "strict",
        MockRunner::new().with_exit_codes(&[("vulture", 1)]),
    )
    .await;
    assert_task_failed(&strict, RunState::Aborted);
    assert_steps_ran(&strict, &["vulture"]);

    // strict says abort, but lenient (the task being run) says continue
    let lenient = run_task_with_mock(
        &registry,
        "lenient",
        MockRunner::new().with_exit_codes(&[("vulture", 1)]),
    )
    .await;
    assert_task_failed(&lenient, RunState::Completed);
    assert_steps_ran(&lenient, &["mypy", "vulture", "radon", "pytest"]);
}

/// A per-run override replaces the task's policy
#[tokio::test]
async fn test_run_override_to_abort() {
    let registry = registry_from_yaml(&three_step_yaml("continue"));
    let runner = MockRunner::new().with_exit_codes(&[("b", 2)]);

    let result = run_task_with_options(
        &registry,
        "gate",
        runner,
        RunOptions {
            on_failure: Some(FailurePolicy::Abort),
            ..Default::default()
        },
    )
    .await;

    assert_task_failed(&result, RunState::Aborted);
    assert_steps_ran(&result, &["a", "b"]);
    assert_eq!(result.policy, FailurePolicy::Abort);
}
