//! Subprocess invocation with an optional deadline

use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::experiment::RunStatus;
use crate::{Error, Result};

/// How often a child is polled while a deadline is armed.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A fully resolved external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl Invocation {
    /// Command with arguments, run in the current directory.
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            working_dir: None,
        }
    }

    /// Run in `dir` instead of the current directory.
    #[must_use]
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Program name or path
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments after the program
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Working directory, if not inherited
    #[must_use]
    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        command
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.chars().any(char::is_whitespace) {
                write!(f, " '{arg}'")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Final state of a finished (or killed) child
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Success, Failed or Cancelled
    pub status: RunStatus,
    /// Exit code, when the process exited on its own
    pub exit_code: Option<i32>,
}

impl From<ExitStatus> for ProcessOutcome {
    fn from(status: ExitStatus) -> Self {
        Self {
            status: if status.success() {
                RunStatus::Success
            } else {
                RunStatus::Failed
            },
            exit_code: status.code(),
        }
    }
}

/// Run `invocation` to completion.
///
/// With `transcript`, stdout and stderr both go to that file (truncated
/// first). With `timeout`, the child is polled every [`POLL_INTERVAL`] and
/// killed at the deadline, yielding `Cancelled`.
///
/// # Errors
///
/// `ProcessError` if the program cannot be spawned; I/O errors for the
/// transcript file or while waiting.
pub fn execute(
    invocation: &Invocation,
    transcript: Option<&Path>,
    timeout: Option<Duration>,
) -> Result<ProcessOutcome> {
    let mut command = invocation.command();
    if let Some(path) = transcript {
        let file = File::create(path)?;
        command.stderr(file.try_clone()?);
        command.stdout(file);
    }

    debug!(command = %invocation, "spawning");
    let mut child = command
        .spawn()
        .map_err(|e| Error::ProcessError(format!("failed to spawn {}: {e}", invocation.program)))?;

    match timeout {
        None => Ok(child.wait()?.into()),
        Some(limit) => wait_with_deadline(&mut child, limit),
    }
}

fn wait_with_deadline(child: &mut Child, limit: Duration) -> Result<ProcessOutcome> {
    let deadline = Instant::now() + limit;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status.into());
        }
        let now = Instant::now();
        if now >= deadline {
            warn!(pid = child.id(), timeout_secs = limit.as_secs_f64(), "deadline reached; killing child");
            // The child may exit between try_wait and kill.
            if let Err(e) = child.kill() {
                debug!(error = %e, "kill failed");
            }
            child.wait()?;
            return Ok(ProcessOutcome {
                status: RunStatus::Cancelled,
                exit_code: None,
            });
        }
        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}
