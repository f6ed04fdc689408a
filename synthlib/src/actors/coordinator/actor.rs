use super::messages::CoordinatorMessage;
use crate::config::CoordinatorConfig;
use crate::error::{self, JobError};
use crate::job;
use crate::types::{Artifact, JobId, JobRequest};
use std::{collections::HashMap, sync::Arc};
use tokio::{
    select,
    sync::{mpsc, oneshot},
};
use tracing::{debug, info};

pub struct JobCoordinator {
    inbox: mpsc::Receiver<CoordinatorMessage>,
    config: Arc<CoordinatorConfig>,
    // cancel switch for every job in flight, taken once pulled
    jobs: HashMap<JobId, Option<oneshot::Sender<()>>>,
    finished_tx: mpsc::UnboundedSender<JobId>,
    finished_rx: mpsc::UnboundedReceiver<JobId>,
    shutdown_waiters: Vec<oneshot::Sender<()>>,
    shutting_down: bool,
}

impl JobCoordinator {
    pub fn spawn(inbox: mpsc::Receiver<CoordinatorMessage>, config: CoordinatorConfig) {
        let (finished_tx, finished_rx) = mpsc::unbounded_channel();
        let actor = Self {
            inbox,
            config: Arc::new(config),
            jobs: HashMap::new(),
            finished_tx,
            finished_rx,
            shutdown_waiters: Vec::new(),
            shutting_down: false,
        };
        tokio::spawn(async move { actor.run().await });
    }

    async fn run(mut self) {
        use self::CoordinatorMessage::*;
        loop {
            select! {
                maybe_msg = self.inbox.recv() => {
                    let msg = match maybe_msg {
                        Some(msg) => msg,
                        // every handle is gone; running jobs finish on their own
                        None => break,
                    };
                    match msg {
                        Synthesize { request, response } => self.synthesize(request, response),
                        CancelJob { job_id, response } => self.cancel_job(job_id, response),
                        ActiveJobs { response } => {
                            let _ = response.send(self.jobs.keys().copied().collect());
                        }
                        Shutdown { response } => self.shutdown(response),
                    }
                }
                Some(job_id) = self.finished_rx.recv() => {
                    self.jobs.remove(&job_id);
                    debug!(%job_id, active = self.jobs.len(), "job finished");
                    if self.jobs.is_empty() {
                        for waiter in self.shutdown_waiters.drain(..) {
                            let _ = waiter.send(());
                        }
                    }
                }
            }
        }
    }

    fn synthesize(
        &mut self,
        request: JobRequest,
        response: oneshot::Sender<error::Result<Artifact>>,
    ) {
        if self.shutting_down {
            let _ = response.send(Err(JobError::Unavailable));
            return;
        }
        let job_id = uuid::Uuid::new_v4();
        let (cancel_tx, cancel_rx) = oneshot::channel();
        self.jobs.insert(job_id, Some(cancel_tx));

        let config = Arc::clone(&self.config);
        let finished = FinishedGuard {
            job_id,
            finished_tx: self.finished_tx.clone(),
        };
        tokio::spawn(async move {
            let _finished = finished;
            let result = job::run(job_id, request, &config, cancel_rx).await;
            // the requester may have gone away, the job still ran to completion
            let _ = response.send(result);
        });
    }

    fn cancel_job(&mut self, job_id: JobId, response: oneshot::Sender<error::Result<()>>) {
        // the entry stays until the job reports back, so it is still listed while cleaning up
        match self.jobs.get_mut(&job_id) {
            Some(slot) => {
                if let Some(cancel_tx) = slot.take() {
                    info!(%job_id, "cancelling job");
                    let _ = cancel_tx.send(());
                }
                let _ = response.send(Ok(()));
            }
            None => {
                let _ = response.send(Err(JobError::NotFound));
            }
        }
    }

    fn shutdown(&mut self, response: oneshot::Sender<()>) {
        self.shutting_down = true;
        info!(active = self.jobs.len(), "coordinator shutting down");
        for cancel_tx in self.jobs.values_mut().filter_map(Option::take) {
            let _ = cancel_tx.send(());
        }
        if self.jobs.is_empty() {
            let _ = response.send(());
        } else {
            self.shutdown_waiters.push(response);
        }
    }
}

/// Reports a job as finished when its task ends, including by panic.
struct FinishedGuard {
    job_id: JobId,
    finished_tx: mpsc::UnboundedSender<JobId>,
}

impl Drop for FinishedGuard {
    fn drop(&mut self) {
        let _ = self.finished_tx.send(self.job_id);
    }
}
