use super::messages::WorkerMessage;
use crate::error::JobError;
use crate::events::{JobStatus, Output};

use bytes::BytesMut;
use futures::future::FutureExt;
use std::os::unix::process::ExitStatusExt;
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::Child,
    select,
    sync::{mpsc, oneshot},
};
use tracing::{debug, error, Instrument};

pub struct Actor {
    inbox: mpsc::UnboundedReceiver<WorkerMessage>,
    kill_tx: Option<oneshot::Sender<()>>,
    job_status: JobStatus,
    waiters: Vec<oneshot::Sender<JobStatus>>,
}

impl Actor {
    pub fn spawn(
        inbox: mpsc::UnboundedReceiver<WorkerMessage>,
        output_tx: mpsc::UnboundedSender<Output>,
        child: Child,
    ) {
        let (kill_tx, kill_rx) = oneshot::channel();
        tokio::spawn(async move {
            let actor = Self {
                inbox,
                kill_tx: Some(kill_tx),
                job_status: JobStatus::Running,
                waiters: Vec::new(),
            };
            actor.run(output_tx, kill_rx, child).await;
        }
        .in_current_span());
    }

    async fn run(
        mut self,
        output_tx: mpsc::UnboundedSender<Output>,
        kill_rx: oneshot::Receiver<()>,
        mut child: Child,
    ) {
        let (child_exit_tx, child_exit_rx) = oneshot::channel();
        // grab stdout and stderr, if they've been piped
        let maybe_stdout = child.stdout.take();
        let maybe_stderr = child.stderr.take();
        let mut kill_rx = kill_rx.fuse();
        // tokio forgets the pid once the child is reaped, the group outlives it
        let pgid = child.id();

        tokio::spawn(async move {
            loop {
                select! {
                    // fires on an explicit stop, or when this actor goes away
                    _ = &mut kill_rx => {
                        kill_process_group(pgid);
                        let _ = child.start_kill();
                    }
                    // wait for child pid to finish and cleanup its resources
                    exit_status = child.wait() => {
                        let status = match exit_status {
                            Ok(exit_status) => match (exit_status.code(), exit_status.signal()) {
                                (Some(code), _) => JobStatus::Exited { code },
                                (None, Some(signal)) => JobStatus::Killed { signal },
                                (None, None) => JobStatus::Lost,
                            },
                            Err(err) => {
                                error!(error = %err, "failed to wait on build process");
                                JobStatus::Lost
                            }
                        };
                        // nothing the build left running in the background survives it
                        kill_process_group(pgid);
                        let _ = child_exit_tx.send(status);
                        break;
                    }
                }
            }
        }
        .in_current_span());

        if let Some(stdout) = maybe_stdout {
            tokio::spawn(pipe_output(stdout, output_tx.clone(), Output::Stdout));
        }
        if let Some(stderr) = maybe_stderr {
            tokio::spawn(pipe_output(stderr, output_tx, Output::Stderr));
        }
        self.handle_messages(child_exit_rx).await;
    }

    async fn handle_messages(&mut self, child_exit_rx: oneshot::Receiver<JobStatus>) {
        use WorkerMessage::*;
        let mut child_exit_rx = child_exit_rx.fuse();
        let mut exited = false;
        loop {
            select! {
                maybe_msg = self.inbox.recv() => {
                    if let Some(msg) = maybe_msg {
                        match msg {
                            Stop { response } => {
                                match (self.job_status, self.kill_tx.take()) {
                                    (JobStatus::Running, Some(kill_tx)) => {
                                        let _ = kill_tx.send(());
                                        let _ = response.send(Ok(()));
                                    }
                                    _ => {
                                        let _ = response.send(Err(JobError::AlreadyStopped));
                                    }
                                }
                            }
                            Wait { response } => {
                                if exited {
                                    let _ = response.send(self.job_status);
                                } else {
                                    self.waiters.push(response);
                                }
                            }
                        }
                    } else {
                        // handle dropped, make sure we kill the child process before we exit
                        if let Some(kill_tx) = self.kill_tx.take() {
                            let _ = kill_tx.send(());
                        }
                        return;
                    }
                }
                exit_status = &mut child_exit_rx, if !exited => {
                    exited = true;
                    self.job_status = exit_status.unwrap_or(JobStatus::Lost);
                    debug!(status = ?self.job_status, "build process finished");
                    for waiter in self.waiters.drain(..) {
                        let _ = waiter.send(self.job_status);
                    }
                }
            }
        }
    }
}

/// Forward everything read from `reader` to `output_tx` until EOF.
async fn pipe_output<R>(
    mut reader: R,
    output_tx: mpsc::UnboundedSender<Output>,
    wrap: fn(bytes::Bytes) -> Output,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(4096);
    loop {
        match reader.read_buf(&mut buf).await {
            Ok(n) if n > 0 => {
                // move the bytes out of buf and into a message
                let _ = output_tx.send(wrap(buf.split().freeze()));
                buf.reserve(4096);
            }
            _ => break,
        }
    }
}

fn kill_process_group(pgid: Option<u32>) {
    if let Some(pgid) = pgid {
        // SAFETY: killpg has no memory safety preconditions. The child was spawned as the
        // leader of its own group, so the group id is its pid.
        let rc = unsafe { libc::killpg(pgid as libc::pid_t, libc::SIGKILL) };
        if rc != 0 {
            // ESRCH once the group is empty
            debug!(pgid, error = %std::io::Error::last_os_error(), "killpg failed");
        }
    }
}
