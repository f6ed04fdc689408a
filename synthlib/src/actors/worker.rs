mod actor;
mod messages;

use crate::error::{JobError, Result};
use crate::events::{JobStatus, Output};
use actor::Actor;
use messages::WorkerMessage;
use std::{io, os::unix::process::CommandExt, process::Stdio};
use tokio::{
    process,
    sync::{mpsc, oneshot},
};

/// Handle to a running build child.
///
/// Dropping every clone of the handle kills the child if it is still running.
#[derive(Clone)]
pub struct WorkerHandle {
    sender: mpsc::UnboundedSender<WorkerMessage>,
    pid: Option<u32>,
}

impl WorkerHandle {
    /// Spawn `command` in its own process group with stdout and stderr piped to `output_tx`.
    pub fn spawn(
        output_tx: mpsc::UnboundedSender<Output>,
        mut command: std::process::Command,
    ) -> io::Result<Self> {
        command.process_group(0);
        let child = process::Command::from(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;
        let pid = child.id();
        let (sender, inbox) = mpsc::unbounded_channel();
        Actor::spawn(inbox, output_tx, child);
        Ok(Self { sender, pid })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Kill the child and everything it started. Fails if the child already exited.
    pub async fn stop(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(WorkerMessage::Stop { response: tx })
            .map_err(|_| JobError::BuildLost)?;
        rx.await.map_err(|_| JobError::BuildLost)?
    }

    /// Resolve once the child has exited.
    pub async fn wait(&self) -> JobStatus {
        let (tx, rx) = oneshot::channel();
        if self
            .sender
            .send(WorkerMessage::Wait { response: tx })
            .is_err()
        {
            return JobStatus::Lost;
        }
        rx.await.unwrap_or(JobStatus::Lost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> std::process::Command {
        let mut command = std::process::Command::new("sh");
        command.arg("-c").arg(script);
        command
    }

    #[tokio::test]
    async fn reports_exit_code() {
        let (output_tx, _output_rx) = mpsc::unbounded_channel();
        let worker = WorkerHandle::spawn(output_tx, sh("exit 4")).unwrap();
        assert_eq!(worker.wait().await, JobStatus::Exited { code: 4 });
        // a late waiter gets the recorded status
        assert_eq!(worker.wait().await, JobStatus::Exited { code: 4 });
        assert!(matches!(worker.stop().await, Err(JobError::AlreadyStopped)));
    }

    #[tokio::test]
    async fn stop_kills_the_process_group() {
        let (output_tx, _output_rx) = mpsc::unbounded_channel();
        // the background sleep is a grandchild, only a group kill reaches it
        let worker = WorkerHandle::spawn(output_tx, sh("sleep 30 & exec sleep 30")).unwrap();
        worker.stop().await.unwrap();
        assert_eq!(
            worker.wait().await,
            JobStatus::Killed {
                signal: libc::SIGKILL
            }
        );
    }

    #[tokio::test]
    async fn pipes_output() {
        let (output_tx, mut output_rx) = mpsc::unbounded_channel();
        let worker = WorkerHandle::spawn(output_tx, sh("printf out; printf err >&2")).unwrap();
        worker.wait().await;
        let (mut stdout, mut stderr) = (Vec::new(), Vec::new());
        while let Some(output) = output_rx.recv().await {
            match output {
                Output::Stdout(blob) => stdout.extend_from_slice(&blob),
                Output::Stderr(blob) => stderr.extend_from_slice(&blob),
            }
        }
        assert_eq!(stdout, b"out");
        assert_eq!(stderr, b"err");
    }

    #[tokio::test]
    async fn background_children_die_with_the_build() {
        let root = tempfile::tempdir().unwrap();
        let marker = root.path().join("alive");
        let script = format!(
            "(sleep 0.5; touch '{}') >/dev/null 2>&1 & exit 0",
            marker.display()
        );
        let (output_tx, _output_rx) = mpsc::unbounded_channel();
        let worker = WorkerHandle::spawn(output_tx, sh(&script)).unwrap();
        assert_eq!(worker.wait().await, JobStatus::Exited { code: 0 });
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        assert!(!marker.exists());
    }
}
