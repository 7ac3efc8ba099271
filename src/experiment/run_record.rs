//! Run Record - one invocation of the external trainer or sampler

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a driver invocation, as written to the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Planned but not yet started.
    Pending,
    /// Process is executing.
    Running,
    /// Process exited with status 0.
    Success,
    /// Process exited non-zero or could not be spawned.
    Failed,
    /// Process was killed at the wait deadline.
    Cancelled,
}

/// Run Record tracks one subprocess invocation of a sweep.
///
/// The driver never acts on the outcome beyond logging it; missing or empty
/// training logs are what the extractor reports later.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunRecord {
    run_id: String,
    status: RunStatus,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    exit_code: Option<i32>,
}

impl RunRecord {
    /// Create a new run record in Pending status.
    ///
    /// # Arguments
    ///
    /// * `run_id` - Encoded experiment directory name
    #[must_use]
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            status: RunStatus::Pending,
            started_at: None,
            ended_at: None,
            exit_code: None,
        }
    }

    /// Get the run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the current run status.
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        self.status
    }

    /// Get the start timestamp, if the run has started.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Get the end timestamp, if the run has completed.
    #[must_use]
    pub const fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Process exit code, when the process exited normally.
    #[must_use]
    pub const fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// Wall-clock time between start and completion.
    #[must_use]
    pub fn elapsed(&self) -> Option<chrono::Duration> {
        Some(self.ended_at? - self.started_at?)
    }

    /// Start the run, transitioning from Pending to Running.
    pub fn start(&mut self) {
        self.status = RunStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Complete the run with the given final status and exit code.
    pub fn complete(&mut self, status: RunStatus, exit_code: Option<i32>) {
        self.status = status;
        self.exit_code = exit_code;
        self.ended_at = Some(Utc::now());
    }
}
