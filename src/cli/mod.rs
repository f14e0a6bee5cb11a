//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{ListCommand, RunCommand, ValidateCommand};
use std::ffi::OsString;
use std::path::PathBuf;
use tracing::Level;

/// Quality-gate task runner
#[derive(Debug, Parser, Clone)]
#[command(name = "taskgate")]
#[command(author = "taskgate Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Run format, lint, type-check, metrics and test gates as one task", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to task file (defaults to ./taskgate.yaml, then the built-in template)
    #[arg(short, long, global = true)]
    pub file: Option<PathBuf>,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run a task
    Run(RunCommand),

    /// List available tasks
    List(ListCommand),

    /// Validate the task file
    Validate(ValidateCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }

    /// Log level used when `RUST_LOG` is not set
    pub fn log_level(&self) -> Level {
        if self.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        }
    }
}
