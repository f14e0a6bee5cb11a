//! Subprocess runner - launches a step's command and waits for it

use crate::core::Step;
use async_trait::async_trait;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How long to keep draining pipes after killing a process
const DRAIN_GRACE: Duration = Duration::from_millis(200);

/// How a launched (or not launched) process ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The process exited on its own; `code` is `None` when killed by a signal
    Exited {
        code: Option<i32>,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
    },
    /// The process could not be started
    LaunchFailed(String),
    /// The process was killed after running longer than allowed
    ///
    /// Carries whatever the process wrote before it was killed.
    TimedOut {
        after: Duration,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
    },
    /// The process was killed because the run was cancelled
    Cancelled,
}

/// Trait for running a step's process - allows for different implementations
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run the step to completion, its timeout, or cancellation
    async fn run(&self, step: &Step, cancel: &CancellationToken) -> ProcessOutcome;
}

/// Runs steps as real child processes
#[derive(Debug, Clone, Default)]
pub struct SubprocessRunner;

/// Which side of the race ended the wait
enum Wait {
    Exited(std::io::Result<ExitStatus>),
    Cancelled,
    Expired,
}

impl SubprocessRunner {
    pub fn new() -> Self {
        Self
    }

    fn command_for(step: &Step) -> Command {
        let mut command = Command::new(step.program());
        command
            .args(step.args())
            .envs(&step.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &step.working_dir {
            command.current_dir(dir);
        }

        command
    }

    async fn kill(step: &Step, child: &mut Child) {
        if let Err(e) = child.kill().await {
            warn!("Failed to kill process for step {}: {}", step.name, e);
        }
    }
}

#[async_trait]
impl ProcessRunner for SubprocessRunner {
    async fn run(&self, step: &Step, cancel: &CancellationToken) -> ProcessOutcome {
        debug!("Spawning `{}` for step {}", step.display_command(), step.name);

        let mut child = match Self::command_for(step).spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to launch step {}: {}", step.name, e);
                return ProcessOutcome::LaunchFailed(format!(
                    "failed to launch '{}': {}",
                    step.program(),
                    e
                ));
            }
        };

        let stdout = Capture::spawn(child.stdout.take());
        let stderr = Capture::spawn(child.stderr.take());

        let limit = step.timeout();
        let expiry = async move {
            match limit {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };

        let wait = tokio::select! {
            status = child.wait() => Wait::Exited(status),
            _ = cancel.cancelled() => Wait::Cancelled,
            _ = expiry => Wait::Expired,
        };

        match wait {
            Wait::Exited(Ok(status)) => {
                let stdout = stdout.finish().await;
                let stderr = stderr.finish().await;
                debug!(
                    "Step {} exited with {:?} ({} bytes stdout, {} bytes stderr)",
                    step.name,
                    status.code(),
                    stdout.len(),
                    stderr.len()
                );
                ProcessOutcome::Exited {
                    code: status.code(),
                    stdout,
                    stderr,
                }
            }
            Wait::Exited(Err(e)) => {
                warn!("Failed waiting for step {}: {}", step.name, e);
                stdout.discard();
                stderr.discard();
                ProcessOutcome::LaunchFailed(format!(
                    "failed waiting for '{}': {}",
                    step.program(),
                    e
                ))
            }
            Wait::Cancelled => {
                warn!("Step {} cancelled, killing process", step.name);
                Self::kill(step, &mut child).await;
                stdout.discard();
                stderr.discard();
                ProcessOutcome::Cancelled
            }
            Wait::Expired => {
                let after = limit.unwrap_or_default();
                warn!("Step {} timed out after {}s", step.name, after.as_secs());
                Self::kill(step, &mut child).await;
                ProcessOutcome::TimedOut {
                    after,
                    stdout: stdout.interrupt(DRAIN_GRACE).await,
                    stderr: stderr.interrupt(DRAIN_GRACE).await,
                }
            }
        }
    }
}

/// Drains one child pipe into a shared buffer
///
/// Reading happens on a separate task so the bytes already received are
/// still available when the process is killed before closing the pipe.
struct Capture {
    buffer: Arc<Mutex<Vec<u8>>>,
    reader: Option<JoinHandle<()>>,
}

impl Capture {
    fn spawn<P>(pipe: Option<P>) -> Self
    where
        P: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let reader = pipe.map(|mut pipe| {
            let sink = buffer.clone();
            tokio::spawn(async move {
                let mut chunk = [0u8; 8192];
                loop {
                    match pipe.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => sink
                            .lock()
                            .unwrap_or_else(|poisoned| poisoned.into_inner())
                            .extend_from_slice(&chunk[..n]),
                    }
                }
            })
        });
        Self { buffer, reader }
    }

    /// Wait for the pipe to close and return everything read
    async fn finish(self) -> Vec<u8> {
        if let Some(reader) = self.reader {
            if let Err(e) = reader.await {
                warn!("Output reader stopped unexpectedly: {}", e);
            }
        }
        Self::take(&self.buffer)
    }

    /// Keep reading for at most `grace`, then return what has arrived
    ///
    /// A killed process can leave descendants holding the pipe open, so
    /// the reader is abandoned rather than awaited to EOF.
    async fn interrupt(self, grace: Duration) -> Vec<u8> {
        if let Some(reader) = self.reader {
            let abort = reader.abort_handle();
            if tokio::time::timeout(grace, reader).await.is_err() {
                abort.abort();
            }
        }
        Self::take(&self.buffer)
    }

    fn discard(self) {
        if let Some(reader) = self.reader {
            reader.abort();
        }
    }

    fn take(buffer: &Mutex<Vec<u8>>) -> Vec<u8> {
        std::mem::take(&mut *buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }
}
