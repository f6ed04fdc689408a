use crate::error;
use crate::events::JobStatus;
use tokio::sync::oneshot;

pub enum WorkerMessage {
    Stop {
        response: oneshot::Sender<error::Result<()>>,
    },
    Wait {
        response: oneshot::Sender<JobStatus>,
    },
}
