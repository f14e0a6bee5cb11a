use anyhow::{anyhow, Context, Result};
use indicatif::ProgressBar;
use std::sync::{Arc, Mutex};
use taskgate::cli::commands::{ListCommand, RunCommand, ValidateCommand};
use taskgate::cli::output::*;
use taskgate::cli::{Cli, Command};
use taskgate::core::config::{ConfigSource, TaskFileConfig};
use taskgate::core::Registry;
use taskgate::execution::{ExecutionEvent, RunOptions, SubprocessRunner, TaskExecutor};
use taskgate::report::{summarize, CONFIG_ERROR_EXIT_CODE};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level().to_string()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    // Execute command
    let outcome = match &cli.command {
        Command::Run(cmd) => run_task(&cli, cmd).await,
        Command::List(cmd) => list_tasks(&cli, cmd),
        Command::Validate(cmd) => validate_tasks(&cli, cmd),
    };

    match outcome {
        Ok(0) => Ok(()),
        Ok(code) => std::process::exit(code),
        Err(e) => {
            println!("{} {}", CROSS, style(format!("{:#}", e)).red());
            std::process::exit(CONFIG_ERROR_EXIT_CODE);
        }
    }
}

/// Load the task file and build the registry
fn load_registry(cli: &Cli) -> Result<(Registry, ConfigSource)> {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let (config, source) = TaskFileConfig::discover(cli.file.as_deref(), &cwd)
        .context("Failed to load task file")?;
    let registry = config
        .to_registry()
        .with_context(|| format!("Invalid task definitions in {}", source))?;
    debug!("Loaded {} tasks from {}", registry.len(), source);
    Ok((registry, source))
}

async fn run_task(cli: &Cli, cmd: &RunCommand) -> Result<i32> {
    let (registry, source) = load_registry(cli)?;

    let task = registry.resolve(&cmd.task).map_err(|e| {
        let available: Vec<&str> = registry.tasks().map(|t| t.name.as_str()).collect();
        anyhow!("{} (available: {})", e, available.join(", "))
    })?;

    let options = RunOptions {
        on_failure: cmd.policy_override(),
        env: cmd.env.iter().cloned().collect(),
    };

    if cmd.dry_run {
        let policy = options.on_failure.unwrap_or(task.on_failure);
        print!("{}", format_plan(task, policy, &registry.flatten(task)));
        return Ok(0);
    }

    println!("{} Loaded tasks from {}", INFO, style(&source).dim());

    // Ctrl-C kills the running step and stops the run
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            interrupt.cancel();
        }
    });

    let mut executor = TaskExecutor::new(SubprocessRunner::new()).with_options(options);

    let show_output = cmd.show_output;
    let active: Arc<Mutex<Option<ProgressBar>>> = Arc::new(Mutex::new(None));
    executor.add_event_handler(move |event| {
        let mut active = active.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match event {
            ExecutionEvent::StepStarted {
                index,
                total_steps,
                task_name,
                step,
            } => {
                *active = Some(create_spinner(format_step_running(
                    *index,
                    *total_steps,
                    task_name,
                    &step.name,
                )));
            }
            ExecutionEvent::StepFinished {
                index,
                total_steps,
                result,
            } => {
                if let Some(spinner) = active.take() {
                    spinner.finish_and_clear();
                }
                println!("{}", format_step_finished(*index, *total_steps, result));
                if show_output || !result.passed() {
                    if let Some(block) = format_step_output(result, OUTPUT_PREVIEW_LINES) {
                        println!("{}", block);
                    }
                }
            }
            ExecutionEvent::TaskFinished { .. } => {
                if let Some(spinner) = active.take() {
                    spinner.finish_and_clear();
                }
            }
            other => println!("{}", format_execution_event(other)),
        }
    });

    let result = executor.run(&registry, task, &cancel).await;
    let summary = summarize(&result);

    println!();
    println!("{}", format_summary(&summary, &result));

    Ok(summary.exit_code)
}

fn list_tasks(cli: &Cli, cmd: &ListCommand) -> Result<i32> {
    let (registry, source) = load_registry(cli)?;

    if cmd.json {
        let tasks: Vec<_> = registry.tasks().collect();
        let data = serde_json::json!({
            "source": source.to_string(),
            "tasks": tasks,
        });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(0);
    }

    if registry.is_empty() {
        println!("{} No tasks defined in {}", INFO, source);
        return Ok(0);
    }

    println!("{} Tasks from {}:", INFO, style(&source).dim());
    for task in registry.tasks() {
        println!("{}", format_task_line(task));
    }

    Ok(0)
}

fn validate_tasks(cli: &Cli, cmd: &ValidateCommand) -> Result<i32> {
    if cmd.json {
        return validate_tasks_json(cli);
    }

    println!("{} Validating tasks...", INFO);

    let (registry, source) = match load_registry(cli) {
        Ok(loaded) => loaded,
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            return Ok(CONFIG_ERROR_EXIT_CODE);
        }
    };

    println!("{} Task definitions are valid!", CHECK);
    println!("  Source: {}", style(&source).bold());
    println!("  Tasks: {}", style(registry.len()).cyan());

    Ok(0)
}

fn validate_tasks_json(cli: &Cli) -> Result<i32> {
    let (registry, source) = match load_registry(cli) {
        Ok(loaded) => loaded,
        Err(e) => {
            let data = serde_json::json!({
                "valid": false,
                "error": format!("{:#}", e),
            });
            println!("{}", serde_json::to_string_pretty(&data)?);
            return Ok(CONFIG_ERROR_EXIT_CODE);
        }
    };

    let plans: Vec<_> = registry
        .tasks()
        .map(|task| {
            serde_json::json!({
                "name": task.name,
                "on_failure": task.on_failure,
                "steps": registry.flatten(task),
            })
        })
        .collect();
    let data = serde_json::json!({
        "valid": true,
        "source": source.to_string(),
        "tasks": plans,
    });
    println!("{}", serde_json::to_string_pretty(&data)?);

    Ok(0)
}
