//! CLI command definitions

use crate::core::FailurePolicy;
use clap::Args;

/// Run a task
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Name of the task to run
    pub task: String,

    /// Keep going after a failing step, whatever the task says
    #[arg(long, conflicts_with = "abort_on_failure")]
    pub continue_on_failure: bool,

    /// Stop at the first failing step, whatever the task says
    #[arg(long)]
    pub abort_on_failure: bool,

    /// Print the flattened step sequence without executing it
    #[arg(long)]
    pub dry_run: bool,

    /// Show captured output of every step, not only failing ones
    #[arg(long)]
    pub show_output: bool,

    /// Environment overrides for every step (KEY=VALUE)
    #[arg(long, value_parser = parse_key_value)]
    pub env: Vec<(String, String)>,
}

impl RunCommand {
    /// Failure policy requested on the command line, if any
    pub fn policy_override(&self) -> Option<FailurePolicy> {
        if self.continue_on_failure {
            Some(FailurePolicy::Continue)
        } else if self.abort_on_failure {
            Some(FailurePolicy::Abort)
        } else {
            None
        }
    }
}

/// List available tasks
#[derive(Debug, Args, Clone)]
pub struct ListCommand {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Validate the task file
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let parts: Vec<&str> = s.splitn(2, '=').collect();
    if parts.len() != 2 || parts[0].is_empty() {
        return Err(format!("Invalid key=value pair: {}", s));
    }
    Ok((parts[0].to_string(), parts[1].to_string()))
}
