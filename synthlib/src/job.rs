use crate::config::CoordinatorConfig;
use crate::error::Result;
use crate::events::JobState;
use crate::supervisor;
use crate::types::{Artifact, JobId, JobRequest};
use crate::workspace::Workspace;
use tokio::sync::oneshot;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Run one job to completion: workspace, sources, build, cleanup.
///
/// The workspace is destroyed on every path out of here. A failure to remove it is logged
/// and never replaces the job's own result.
pub(crate) async fn run(
    job_id: JobId,
    request: JobRequest,
    config: &CoordinatorConfig,
    cancel: oneshot::Receiver<()>,
) -> Result<Artifact> {
    let span = info_span!("job", %job_id, top_module = %request.top_module());
    async move {
        info!(files = request.files().len(), "synthesis requested");
        transition(JobState::Created);

        let mut workspace = match Workspace::create(&config.workspace) {
            Ok(workspace) => workspace,
            Err(err) => {
                error!(error = %err, "could not create workspace");
                transition(JobState::Failed);
                return Err(err);
            }
        };
        transition(JobState::WorkspaceReady);

        let result = build_in(&mut workspace, &request, config, cancel).await;

        if let Err(err) = workspace.destroy().await {
            warn!(path = %workspace.path().display(), error = %err, "failed to remove workspace");
        }

        match &result {
            Ok(artifact) => {
                transition(JobState::Completed);
                info!(bytes = artifact.len(), "synthesis complete");
            }
            Err(err) => {
                transition(JobState::Failed);
                warn!(kind = err.kind(), error = %err, "synthesis failed");
            }
        }
        result
    }
    .instrument(span)
    .await
}

async fn build_in(
    workspace: &mut Workspace,
    request: &JobRequest,
    config: &CoordinatorConfig,
    cancel: oneshot::Receiver<()>,
) -> Result<Artifact> {
    for file in request.files() {
        workspace.write_file(&file.name, &file.body).await?;
    }
    transition(JobState::FilesWritten);

    transition(JobState::Building);
    supervisor::run_build(&config.toolchain, workspace, request.top_module(), cancel)
        .await
        .into()
}

fn transition(state: JobState) {
    debug!(%state, "job state");
}
