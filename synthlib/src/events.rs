use crate::error::JobError;
use crate::types::{Artifact, OutputBlob};
use std::fmt;

/// Process-level status of a build child.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Exited { code: i32 },
    Killed { signal: i32 },
    /// Waiting on the child failed; its fate is unknown.
    Lost,
}

#[derive(Clone, Debug)]
pub enum Output {
    Stdout(OutputBlob),
    Stderr(OutputBlob),
}

/// Result of one toolchain invocation, consumed exactly once by the job that asked for it.
#[derive(Debug)]
pub enum BuildOutcome {
    Artifact(Artifact),
    Failure(JobError),
}

impl From<BuildOutcome> for Result<Artifact, JobError> {
    fn from(outcome: BuildOutcome) -> Self {
        match outcome {
            BuildOutcome::Artifact(bytes) => Ok(bytes),
            BuildOutcome::Failure(err) => Err(err),
        }
    }
}

/// Where a job is in its lifecycle. Steps are strictly sequential.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobState {
    Created,
    WorkspaceReady,
    FilesWritten,
    Building,
    Completed,
    Failed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Created => "created",
            JobState::WorkspaceReady => "workspace_ready",
            JobState::FilesWritten => "files_written",
            JobState::Building => "building",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        };
        f.write_str(s)
    }
}
