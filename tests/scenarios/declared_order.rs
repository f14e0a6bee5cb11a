//! Test: Declared Order - steps run exactly in flattened declaration order

use crate::helpers::*;
use taskgate::report::summarize;

const TEMPLATE: &str = r#"
tasks:
  - name: format
    steps:
      - name: ruff-format
        command: ["ruff", "format", "."]
  - name: lint
    steps:
      - task: format
      - name: ruff-check
        command: ["ruff", "check", "--fix", "."]
  - name: lint-unsafe
    steps:
      - task: format
      - name: ruff-check-unsafe
        command: ["ruff", "check", "--fix", "--unsafe-fixes", "."]
  - name: check
    steps:
      - name: mypy
        command: ["mypy", "."]
  - name: metrics
    on_failure: continue
    steps:
      - name: vulture
        command: ["vulture", "."]
      - name: radon
        command: ["radon", "cc", ".", "-a"]
  - name: quality
    on_failure: continue
    steps:
      - task: lint
      - task: check
      - task: metrics
"#;

/// Nested references expand depth-first, left-to-right
#[tokio::test]
async fn test_quality_runs_flattened_order() {
    let registry = registry_from_yaml(TEMPLATE);
    let runner = MockRunner::new();

    let result = run_task_with_mock(&registry, "quality", runner.clone()).await;

    assert_task_succeeded(&result);
    let expected = ["ruff-format", "ruff-check", "mypy", "vulture", "radon"];
    assert_steps_ran(&result, &expected);
    assert_eq!(runner.invocations(), expected);

    let summary = summarize(&result);
    assert!(summary.overall_success);
    assert_eq!(summary.exit_code, 0);
    assert_eq!(summary.total_steps, 5);
}

/// The two lint variants share the format prefix and differ afterwards
#[tokio::test]
async fn test_lint_variants_share_prefix() {
    let registry = registry_from_yaml(TEMPLATE);

    let lint = run_task_with_mock(&registry, "lint", MockRunner::new()).await;
    let unsafe_lint = run_task_with_mock(&registry, "lint-unsafe", MockRunner::new()).await;

    assert_steps_ran(&lint, &["ruff-format", "ruff-check"]);
    assert_steps_ran(&unsafe_lint, &["ruff-format", "ruff-check-unsafe"]);
    assert_eq!(
        unsafe_lint.step_results[1].step.command,
        vec!["ruff", "check", "--fix", "--unsafe-fixes", "."]
    );
}

/// Each result remembers which task declared its step
#[tokio::test]
async fn test_results_record_owning_task() {
    let registry = registry_from_yaml(TEMPLATE);

    let result = run_task_with_mock(&registry, "quality", MockRunner::new()).await;

    let owners: Vec<&str> = result.step_results.iter().map(|r| r.task.as_str()).collect();
    assert_eq!(owners, vec!["format", "lint", "check", "metrics", "metrics"]);
}

/// All-passing tasks succeed under either policy
#[tokio::test]
async fn test_all_pass_succeeds_regardless_of_policy() {
    for policy in ["abort", "continue"] {
        let registry = registry_from_yaml(&three_step_yaml(policy));

        let result = run_task_with_mock(&registry, "gate", MockRunner::new()).await;

        assert_task_succeeded(&result);
        assert_steps_ran(&result, &["a", "b", "c"]);
        assert_eq!(summarize(&result).exit_code, 0, "policy {}", policy);
    }
}

/// Running the same task twice yields the same exit codes
#[tokio::test]
async fn test_repeated_runs_are_idempotent() {
    let registry = registry_from_yaml(&three_step_yaml("continue"));
    let codes = [("b", 4)];

    let first = run_task_with_mock(&registry, "gate", MockRunner::new().with_exit_codes(&codes)).await;
    let second = run_task_with_mock(&registry, "gate", MockRunner::new().with_exit_codes(&codes)).await;

    let exit_codes = |r: &taskgate::TaskResult| -> Vec<i32> {
        r.step_results.iter().map(|s| s.exit_code).collect()
    };
    assert_eq!(exit_codes(&first), vec![0, 4, 0]);
    assert_eq!(exit_codes(&first), exit_codes(&second));
    assert_ne!(first.run_id, second.run_id);
}
