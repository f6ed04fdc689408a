mod actor;
mod messages;

use self::{
    actor::JobCoordinator,
    messages::CoordinatorMessage::{self, ActiveJobs, CancelJob, Shutdown, Synthesize},
};
use crate::config::CoordinatorConfig;
use crate::error::{JobError, Result};
use crate::types::{Artifact, JobId, JobRequest};
use tokio::sync::{mpsc, oneshot};

/// A `JobCoordinator` which runs synthesis jobs and keeps track of the ones in flight.
///
/// This struct is actually an actor handle, the real work is done in the actor spawned by `JobCoordinator::spawn`,
/// but from the user perspective all that matters is that this struct provides methods for running jobs.
/// The actor-handle abstraction allows this struct to be cloned freely in a multi-thread async context,
/// without requiring an `Arc<Mutex>` or any other means of synchronization.
///
/// Every job runs in its own task with its own workspace and toolchain process, so jobs never wait on
/// each other.
#[derive(Clone)]
pub struct JobCoordinatorHandle {
    sender: mpsc::Sender<CoordinatorMessage>,
}

impl JobCoordinatorHandle {
    /// Spawn a new coordinator. Must be called from within a tokio runtime.
    pub fn spawn(config: CoordinatorConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.message_capacity.max(1));
        JobCoordinator::spawn(receiver, config);
        Self { sender }
    }

    /// Run one synthesis job and return the toolchain's artifact.
    ///
    /// The job's workspace no longer exists when this returns, whatever the outcome.
    pub async fn synthesize(&self, request: JobRequest) -> Result<Artifact> {
        let (tx, rx) = oneshot::channel();
        self.send(Synthesize {
            request,
            response: tx,
        })
        .await?;
        // the job task only drops the sender without replying if it panicked
        rx.await.map_err(|_| JobError::Aborted)?
    }

    /// Kill the build of an in-flight job. The job itself still cleans up and resolves to
    /// [`JobError::Cancelled`].
    pub async fn cancel_job(&self, job_id: JobId) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(CancelJob {
            job_id,
            response: tx,
        })
        .await?;
        rx.await.map_err(|_| JobError::Unavailable)?
    }

    /// Ids of the jobs currently in flight.
    pub async fn active_jobs(&self) -> Result<Vec<JobId>> {
        let (tx, rx) = oneshot::channel();
        self.send(ActiveJobs { response: tx }).await?;
        rx.await.map_err(|_| JobError::Unavailable)
    }

    /// Stop accepting jobs, cancel the ones in flight and wait until they have all cleaned up.
    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        if self.send(Shutdown { response: tx }).await.is_ok() {
            let _ = rx.await;
        }
    }

    async fn send(&self, msg: CoordinatorMessage) -> Result<()> {
        self.sender
            .send(msg)
            .await
            .map_err(|_| JobError::Unavailable)
    }
}
