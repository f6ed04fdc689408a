use std::{io, path::PathBuf, result, time::Duration};
use thiserror;

/// Everything that can end a synthesis job without a bitstream.
///
/// Every variant has a stable [`kind`](JobError::kind) so clients can branch on it
/// without parsing the human readable message.
#[derive(thiserror::Error, Debug)]
pub enum JobError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("invalid file name {name:?}")]
    InvalidFileName { name: String },
    #[error("failed to create workspace: {0}")]
    WorkspaceCreation(#[source] io::Error),
    #[error("failed to write {name:?}: {source}")]
    FileWrite { name: String, source: io::Error },
    #[error("failed to spawn {program:?}: {source}")]
    Spawn { program: String, source: io::Error },
    #[error("build exited with code {code}")]
    BuildFailure { code: i32, log: String },
    #[error("build killed by signal {signal}")]
    BuildKilled { signal: i32, log: String },
    #[error("lost track of the build process")]
    BuildLost,
    #[error("build produced no artifact at {}: {source}", path.display())]
    MissingArtifact { path: PathBuf, source: io::Error },
    #[error("build exceeded the {0:?} time limit")]
    Timeout(Duration),
    #[error("job cancelled")]
    Cancelled,
    #[error("job coordinator is not accepting jobs")]
    Unavailable,
    #[error("job aborted unexpectedly")]
    Aborted,
    #[error("no such job exists")]
    NotFound,
    #[error("build already stopped")]
    AlreadyStopped,
}

impl JobError {
    /// Stable, machine readable name of the failure.
    pub fn kind(&self) -> &'static str {
        use JobError::*;
        match self {
            InvalidRequest(_) => "invalid_request",
            InvalidFileName { .. } => "invalid_file_name",
            WorkspaceCreation(_) => "workspace_creation",
            FileWrite { .. } => "file_write",
            Spawn { .. } => "spawn",
            BuildFailure { .. } => "build_failure",
            BuildKilled { .. } => "build_killed",
            BuildLost => "build_lost",
            MissingArtifact { .. } => "missing_artifact",
            Timeout(_) => "timeout",
            Cancelled => "cancelled",
            Unavailable => "unavailable",
            Aborted => "aborted",
            NotFound => "not_found",
            AlreadyStopped => "already_stopped",
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            JobError::BuildFailure { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Toolchain output captured before the build failed, if any.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            JobError::BuildFailure { log, .. } | JobError::BuildKilled { log, .. } => {
                Some(log.as_str())
            }
            _ => None,
        }
    }
}

pub type Result<T> = result::Result<T, JobError>;
