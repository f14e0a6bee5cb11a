//! CLI output formatting

use crate::{
    core::{FailurePolicy, PlannedStep, RunState, StepResult, Task, TaskEntry, TaskResult},
    execution::ExecutionEvent,
    report::Summary,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static STOP: Emoji<'_, '_> = Emoji("🛑 ", "# ");

/// Lines of captured output shown per stream before truncating
pub const OUTPUT_PREVIEW_LINES: usize = 40;

/// Create a spinner for a running step
pub fn create_spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Format a failure policy for display
pub fn format_policy(policy: FailurePolicy) -> String {
    match policy {
        FailurePolicy::Abort => style("abort").red().to_string(),
        FailurePolicy::Continue => style("continue").yellow().to_string(),
    }
}

/// Format a run state for display
pub fn format_run_state(state: RunState) -> String {
    match state {
        RunState::Pending => style("PENDING").dim().to_string(),
        RunState::Running => style("RUNNING").yellow().to_string(),
        RunState::Completed => style("COMPLETED").green().to_string(),
        RunState::Aborted => style("ABORTED").red().to_string(),
        RunState::Cancelled => style("CANCELLED").yellow().to_string(),
    }
}

/// Format a duration as `1.2s` / `3m 4s`
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{:.1}s", duration.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

fn progress_label(index: usize, total: usize) -> String {
    format!("[{}/{}]", index + 1, total)
}

/// Message shown next to the spinner while a step runs
pub fn format_step_running(index: usize, total: usize, task_name: &str, step_name: &str) -> String {
    format!(
        "{} {} {}",
        style(progress_label(index, total)).dim(),
        style(format!("{}:", task_name)).dim(),
        style(step_name).cyan()
    )
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::TaskStarted {
            run_id,
            task_name,
            policy,
            total_steps,
        } => format!(
            "{} Running {} ({} steps, on failure: {}) {}",
            ROCKET,
            style(task_name).bold(),
            total_steps,
            format_policy(*policy),
            style(&run_id.to_string()[..8]).dim()
        ),
        ExecutionEvent::StepStarted {
            index,
            total_steps,
            task_name,
            step,
        } => format!(
            "{} {} {}",
            SPINNER,
            format_step_running(*index, *total_steps, task_name, &step.name),
            style(step.display_command()).dim()
        ),
        ExecutionEvent::StepFinished {
            index,
            total_steps,
            result,
        } => format_step_finished(*index, *total_steps, result),
        ExecutionEvent::TaskFinished {
            task_name, state, ..
        } => format!(
            "{} {} {}",
            INFO,
            style(task_name).bold(),
            format_run_state(*state)
        ),
    }
}

/// One line for a finished step
pub fn format_step_finished(index: usize, total: usize, result: &StepResult) -> String {
    let label = style(progress_label(index, total)).dim();
    let duration = style(format_duration(result.duration)).dim();
    match result.failure_reason() {
        None => format!(
            "{} {} {} {}",
            CHECK,
            label,
            style(&result.step.name).green(),
            duration
        ),
        Some(reason) => format!(
            "{} {} {} {} {}",
            CROSS,
            label,
            style(&result.step.name).red(),
            style(reason).red(),
            duration
        ),
    }
}

/// Format step output with truncation
pub fn format_output(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();

    if lines.len() <= max_lines {
        output.trim_end().to_string()
    } else {
        let truncated = lines[..max_lines].join("\n");
        format!(
            "{}\n{}... ({} more lines)",
            truncated,
            style("[truncated]").dim(),
            lines.len() - max_lines
        )
    }
}

/// A horizontal rule spanning the terminal width
pub fn separator() -> String {
    let width = term_size::dimensions_stdout()
        .map(|(w, _)| w)
        .unwrap_or(80);
    style("─".repeat(width)).dim().to_string()
}

/// Captured stdout/stderr of a step, framed by separators
pub fn format_step_output(result: &StepResult, max_lines: usize) -> Option<String> {
    let stdout = result.stdout_lossy();
    let stderr = result.stderr_lossy();
    if stdout.trim().is_empty() && stderr.trim().is_empty() {
        return None;
    }

    let mut block = format!(
        "{}\n{} {}\n",
        separator(),
        style(&result.step.name).bold(),
        style(result.step.display_command()).dim()
    );
    if !stdout.trim().is_empty() {
        block.push_str(&format_output(&stdout, max_lines));
        block.push('\n');
    }
    if !stderr.trim().is_empty() {
        block.push_str(&style(format_output(&stderr, max_lines)).red().to_string());
        block.push('\n');
    }
    block.push_str(&separator());
    Some(block)
}

/// The flattened step sequence, for `--dry-run`
pub fn format_plan(task: &Task, policy: FailurePolicy, plan: &[PlannedStep]) -> String {
    let mut out = format!(
        "{} Plan for {} ({} steps, on failure: {})\n",
        INFO,
        style(&task.name).bold(),
        plan.len(),
        format_policy(policy)
    );
    for (index, planned) in plan.iter().enumerate() {
        out.push_str(&format!(
            "  {} {} {}",
            style(progress_label(index, plan.len())).dim(),
            style(format!("{}:{}", planned.task, planned.step.name)).cyan(),
            planned.step.display_command()
        ));
        if let Some(dir) = &planned.step.working_dir {
            out.push_str(&format!(" {}", style(format!("(in {})", dir.display())).dim()));
        }
        if let Some(secs) = planned.step.timeout_secs {
            out.push_str(&format!(" {}", style(format!("(timeout {}s)", secs)).dim()));
        }
        out.push('\n');
    }
    out
}

/// One line per task for `list`
pub fn format_task_line(task: &Task) -> String {
    let composition = task
        .entries
        .iter()
        .map(|entry| match entry {
            TaskEntry::Step(step) => step.name.clone(),
            TaskEntry::Task(name) => format!("@{}", name),
        })
        .collect::<Vec<_>>()
        .join(", ");

    let mut line = format!(
        "  {} [{}] {}",
        style(&task.name).bold(),
        format_policy(task.on_failure),
        style(composition).dim()
    );
    if let Some(description) = &task.description {
        line.push_str(&format!("\n      {}", description));
    }
    line
}

/// Final report: what ran, what failed, and why the run stopped
pub fn format_summary(summary: &Summary, result: &TaskResult) -> String {
    let mut out = String::new();

    let failed: Vec<&str> = result
        .failed_steps()
        .map(|r| r.step.name.as_str())
        .collect();

    out.push_str(&format!(
        "{} {} step(s) ran, {} failed",
        INFO,
        style(summary.total_steps).cyan(),
        style(summary.failed_steps).red()
    ));
    if !failed.is_empty() {
        out.push_str(&format!(": {}", style(failed.join(", ")).red()));
    }
    out.push('\n');

    if summary.cancelled {
        out.push_str(&format!(
            "{} {} was {}; remaining steps were not run\n",
            STOP,
            style(&summary.task_name).bold(),
            style("cancelled").yellow()
        ));
    } else if summary.aborted {
        let culprit = result
            .first_failure()
            .map(|r| r.step.name.as_str())
            .unwrap_or_default();
        out.push_str(&format!(
            "{} {} {} after {} failed (policy: abort)\n",
            STOP,
            style(&summary.task_name).bold(),
            style("aborted").red(),
            style(culprit).red()
        ));
    } else if !summary.overall_success {
        out.push_str(&format!(
            "{} {} continued past failures (policy: continue)\n",
            WARN,
            style(&summary.task_name).bold()
        ));
    }

    if summary.overall_success {
        out.push_str(&format!(
            "{} {} {}",
            CHECK,
            style(&summary.task_name).bold(),
            style("passed").green()
        ));
    } else {
        out.push_str(&format!(
            "{} {} {} (exit code {})",
            CROSS,
            style(&summary.task_name).bold(),
            style("failed").red(),
            summary.exit_code
        ));
    }

    out
}
