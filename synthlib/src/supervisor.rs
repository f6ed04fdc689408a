//! Runs the external toolchain against a workspace.

use crate::actors::{broadcaster::BroadcasterHandle, worker::WorkerHandle};
use crate::config::ToolchainConfig;
use crate::error::JobError;
use crate::events::{BuildOutcome, JobStatus};
use crate::workspace::Workspace;
use bytes::Bytes;
use std::process::Command;
use std::time::Duration;
use tokio::{select, sync::mpsc, sync::oneshot};
use tracing::{debug, info, warn, Instrument};

/// How long to keep waiting for the output pipes to close after the toolchain exits.
/// Something the toolchain left behind may still hold them open.
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Invoke the toolchain for `top_module` inside `workspace` and resolve to its artifact.
///
/// Suspends the calling task until the child exits. Output is logged line by line as it
/// arrives. Never returns `Err`: every way the build can go wrong is a
/// [`BuildOutcome::Failure`].
///
/// If `cancel` fires (a sent `()`, not a dropped sender) the build is killed and the outcome is
/// [`JobError::Cancelled`].
pub async fn run_build(
    config: &ToolchainConfig,
    workspace: &Workspace,
    top_module: &str,
    mut cancel: oneshot::Receiver<()>,
) -> BuildOutcome {
    let mut command = Command::new(&config.program);
    command
        .args(&config.args)
        .arg(format!("BUILD_DIR={}", workspace.path().display()))
        .arg(format!("TOP_MODULE={}", top_module))
        .current_dir(&config.project_dir);

    let (output_tx, output_rx) = mpsc::unbounded_channel();
    let worker = match WorkerHandle::spawn(output_tx, command) {
        Ok(worker) => worker,
        Err(source) => {
            return BuildOutcome::Failure(JobError::Spawn {
                program: config.program.clone(),
                source,
            })
        }
    };
    info!(program = %config.program, pid = ?worker.pid(), "toolchain started");

    let broadcaster = BroadcasterHandle::spawn(output_rx);
    let (log_tx, mut log_rx) = mpsc::unbounded_channel();
    broadcaster.stream_all(log_tx);
    tokio::spawn(
        async move {
            while let Some(blob) = log_rx.recv().await {
                for line in String::from_utf8_lossy(&blob).lines() {
                    info!(target: "synthlib::toolchain", "{}", line);
                }
            }
        }
        .in_current_span(),
    );

    let deadline = async {
        match config.build_timeout {
            Some(limit) => tokio::time::sleep(limit).await,
            None => futures::future::pending().await,
        }
    };
    let exit = worker.wait();
    tokio::pin!(deadline, exit);

    let interrupted = select! {
        status = &mut exit => Ok(status),
        _ = &mut deadline => {
            let limit = config.build_timeout.unwrap_or_default();
            warn!(?limit, "build timed out, killing toolchain");
            Err(JobError::Timeout(limit))
        }
        Ok(()) = &mut cancel => {
            warn!("build cancelled, killing toolchain");
            Err(JobError::Cancelled)
        }
    };
    let status = match interrupted {
        Ok(status) => status,
        Err(err) => {
            if let Err(stop_err) = worker.stop().await {
                debug!(error = %stop_err, "toolchain exited before it could be stopped");
            }
            let status = exit.await;
            debug!(?status, "toolchain stopped");
            return BuildOutcome::Failure(err);
        }
    };
    info!(?status, "toolchain exited");

    let log = match tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, broadcaster.collect()).await {
        Ok(log) => log,
        Err(_) => {
            warn!("toolchain output still open after exit");
            broadcaster.snapshot().await
        }
    };

    match status {
        JobStatus::Exited { code: 0 } => read_artifact(config, workspace).await,
        JobStatus::Exited { code } => BuildOutcome::Failure(JobError::BuildFailure {
            code,
            log: lossy(&log),
        }),
        JobStatus::Killed { signal } => BuildOutcome::Failure(JobError::BuildKilled {
            signal,
            log: lossy(&log),
        }),
        JobStatus::Running | JobStatus::Lost => BuildOutcome::Failure(JobError::BuildLost),
    }
}

async fn read_artifact(config: &ToolchainConfig, workspace: &Workspace) -> BuildOutcome {
    let path = workspace.path().join(&config.artifact_name);
    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            info!(bytes = bytes.len(), "artifact ready");
            BuildOutcome::Artifact(Bytes::from(bytes))
        }
        Err(source) => BuildOutcome::Failure(JobError::MissingArtifact { path, source }),
    }
}

fn lossy(log: &[u8]) -> String {
    String::from_utf8_lossy(log).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkspaceConfig;
    use crate::test_support::{never, stub_toolchain};
    use std::path::Path;

    async fn workspace(root: &Path) -> Workspace {
        let config = WorkspaceConfig {
            root: root.to_path_buf(),
            ..WorkspaceConfig::default()
        };
        Workspace::create(&config).unwrap()
    }

    #[tokio::test]
    async fn reads_artifact_on_success() {
        let root = tempfile::tempdir().unwrap();
        let ws = workspace(root.path()).await;
        let config = stub_toolchain(
            root.path(),
            r#"echo "building $top"; printf '\001\002' > "$dir/out.bin.cbin""#,
        );
        match run_build(&config, &ws, "top", never()).await {
            BuildOutcome::Artifact(bytes) => assert_eq!(&bytes[..], &[0x01, 0x02]),
            BuildOutcome::Failure(err) => panic!("unexpected failure: {}", err),
        }
    }

    #[tokio::test]
    async fn nonzero_exit_carries_code_and_log() {
        let root = tempfile::tempdir().unwrap();
        let ws = workspace(root.path()).await;
        let config = stub_toolchain(root.path(), "echo 'syntax error' >&2; exit 3");
        match run_build(&config, &ws, "top", never()).await {
            BuildOutcome::Failure(JobError::BuildFailure { code, log }) => {
                assert_eq!(code, 3);
                assert!(log.contains("syntax error"), "log was {:?}", log);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn clean_exit_without_artifact_is_missing_artifact() {
        let root = tempfile::tempdir().unwrap();
        let ws = workspace(root.path()).await;
        let config = stub_toolchain(root.path(), "exit 0");
        let outcome = run_build(&config, &ws, "top", never()).await;
        assert!(matches!(
            outcome,
            BuildOutcome::Failure(JobError::MissingArtifact { .. })
        ));
    }

    #[tokio::test]
    async fn unknown_program_is_spawn_error() {
        let root = tempfile::tempdir().unwrap();
        let ws = workspace(root.path()).await;
        let config = ToolchainConfig {
            program: "definitely-not-a-toolchain".into(),
            project_dir: root.path().to_path_buf(),
            ..ToolchainConfig::default()
        };
        let outcome = run_build(&config, &ws, "top", never()).await;
        assert!(matches!(outcome, BuildOutcome::Failure(JobError::Spawn { .. })));
    }

    #[tokio::test]
    async fn timeout_kills_the_build() {
        let root = tempfile::tempdir().unwrap();
        let ws = workspace(root.path()).await;
        let mut config = stub_toolchain(root.path(), "exec sleep 30");
        config.build_timeout = Some(Duration::from_millis(200));
        let started = std::time::Instant::now();
        let outcome = run_build(&config, &ws, "top", never()).await;
        assert!(matches!(outcome, BuildOutcome::Failure(JobError::Timeout(_))));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn cancel_kills_the_build() {
        let root = tempfile::tempdir().unwrap();
        let ws = workspace(root.path()).await;
        let config = stub_toolchain(root.path(), "exec sleep 30");
        let (cancel_tx, cancel_rx) = oneshot::channel();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            let _ = cancel_tx.send(());
        });
        let outcome = run_build(&config, &ws, "top", cancel_rx).await;
        assert!(matches!(outcome, BuildOutcome::Failure(JobError::Cancelled)));
    }

    #[tokio::test]
    async fn dropped_cancel_sender_does_not_cancel() {
        let root = tempfile::tempdir().unwrap();
        let ws = workspace(root.path()).await;
        let config = stub_toolchain(
            root.path(),
            r#"sleep 0.2; printf 'ok' > "$dir/out.bin.cbin""#,
        );
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        drop(cancel_tx);
        match run_build(&config, &ws, "top", cancel_rx).await {
            BuildOutcome::Artifact(bytes) => assert_eq!(&bytes[..], b"ok"),
            BuildOutcome::Failure(err) => panic!("unexpected failure: {}", err),
        }
    }

    #[tokio::test]
    async fn backgrounded_work_does_not_outlive_the_build() {
        let root = tempfile::tempdir().unwrap();
        let mut ws = workspace(root.path()).await;
        let marker = root.path().join("alive");
        let script = format!(
            r#"(sleep 1; touch '{}') >/dev/null 2>&1 & printf ok > "$dir/out.bin.cbin""#,
            marker.display()
        );
        let config = stub_toolchain(root.path(), &script);
        match run_build(&config, &ws, "top", never()).await {
            BuildOutcome::Artifact(bytes) => assert_eq!(&bytes[..], b"ok"),
            BuildOutcome::Failure(err) => panic!("unexpected failure: {}", err),
        }
        ws.destroy().await.unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn top_module_is_passed_verbatim() {
        let root = tempfile::tempdir().unwrap();
        let ws = workspace(root.path()).await;
        let config = stub_toolchain(root.path(), r#"printf '%s' "$top" > "$dir/out.bin.cbin""#);
        match run_build(&config, &ws, "cpu_top", never()).await {
            BuildOutcome::Artifact(bytes) => assert_eq!(&bytes[..], b"cpu_top"),
            BuildOutcome::Failure(err) => panic!("unexpected failure: {}", err),
        }
    }
}
