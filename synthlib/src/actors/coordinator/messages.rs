use crate::error;
use crate::types::{Artifact, JobId, JobRequest};
use tokio::sync::oneshot;

#[derive(Debug)]
pub enum CoordinatorMessage {
    Synthesize {
        request: JobRequest,
        response: oneshot::Sender<error::Result<Artifact>>,
    },
    CancelJob {
        job_id: JobId,
        response: oneshot::Sender<error::Result<()>>,
    },
    ActiveJobs {
        response: oneshot::Sender<Vec<JobId>>,
    },
    Shutdown {
        response: oneshot::Sender<()>,
    },
}
