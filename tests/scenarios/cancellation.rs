//! Test: Cancellation - interrupted runs end in their own terminal state

use crate::helpers::*;
use taskgate::core::RunState;
use taskgate::report::{summarize, CANCELLED_EXIT_CODE};

/// Interrupt during step 2 of 3: one result, nothing after starts
#[tokio::test]
async fn test_cancel_during_second_step() {
    let registry = registry_from_yaml(&three_step_yaml("continue"));
    let runner = MockRunner::new().interrupt_at("b");

    let result = run_task_with_mock(&registry, "gate", runner.clone()).await;

    assert_task_failed(&result, RunState::Cancelled);
    assert!(result.cancelled());
    assert!(!result.aborted());
    assert_steps_ran(&result, &["a"]);
    assert_eq!(runner.invocations(), vec!["a", "b"]);

    let summary = summarize(&result);
    assert!(summary.cancelled);
    assert_eq!(summary.exit_code, CANCELLED_EXIT_CODE);
}

/// A failure recorded before the interrupt still decides the exit code
#[tokio::test]
async fn test_cancel_after_failure_keeps_failure_code() {
    let registry = registry_from_yaml(&three_step_yaml("continue"));
    let runner = MockRunner::new()
        .with_exit_codes(&[("a", 5)])
        .interrupt_at("c");

    let result = run_task_with_mock(&registry, "gate", runner).await;

    assert_task_failed(&result, RunState::Cancelled);
    assert_steps_ran(&result, &["a", "b"]);
    assert_eq!(summarize(&result).exit_code, 5);
}

/// Cancellation is distinct from an aborting failure
#[tokio::test]
async fn test_cancel_is_not_abort() {
    let registry = registry_from_yaml(&three_step_yaml("abort"));
    let runner = MockRunner::new().interrupt_at("c");

    let result = run_task_with_mock(&registry, "gate", runner).await;

    assert_eq!(result.state, RunState::Cancelled);
    assert!(!result.aborted());
    assert_eq!(result.failed_steps().count(), 0);
}

/// The child dies from the interrupt before the run sees it: still a cancel
#[tokio::test]
async fn test_child_killed_by_interrupt_is_cancel_not_abort() {
    for policy in ["abort", "continue"] {
        let registry = registry_from_yaml(&three_step_yaml(policy));
        let runner = MockRunner::new().interrupt_with_exit("a", None);

        let result = run_task_with_mock(&registry, "gate", runner.clone()).await;

        assert_eq!(result.state, RunState::Cancelled, "policy {}", policy);
        assert!(!result.aborted(), "policy {}", policy);
        assert!(result.step_results.is_empty(), "policy {}", policy);
        assert_eq!(runner.invocations(), vec!["a"]);
        assert_eq!(summarize(&result).exit_code, CANCELLED_EXIT_CODE);
    }
}

/// A tool that exits 130 on SIGINT is not recorded as a failing gate
#[tokio::test]
async fn test_child_exit_on_interrupt_is_not_recorded() {
    let registry = registry_from_yaml(&three_step_yaml("abort"));
    let runner = MockRunner::new().interrupt_with_exit("b", Some(130));

    let result = run_task_with_mock(&registry, "gate", runner).await;

    assert_task_failed(&result, RunState::Cancelled);
    assert_steps_ran(&result, &["a"]);
    assert_eq!(result.failed_steps().count(), 0);
    assert_eq!(summarize(&result).exit_code, CANCELLED_EXIT_CODE);
}
