use std::{env, path::PathBuf, time::Duration};

pub const DEFAULT_WORKSPACE_PREFIX: &str = "icestorm-server_";
pub const DEFAULT_ARTIFACT_NAME: &str = "out.bin.cbin";
pub const DEFAULT_PROJECT_DIR: &str = "./synthesis";
pub const DEFAULT_PROGRAM: &str = "make";
pub const DEFAULT_MESSAGE_CAPACITY: usize = 64;

/// Where job workspaces are allocated.
#[derive(Clone, Debug)]
pub struct WorkspaceConfig {
    pub root: PathBuf,
    pub prefix: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: env::temp_dir(),
            prefix: DEFAULT_WORKSPACE_PREFIX.into(),
        }
    }
}

/// How the external toolchain is invoked.
///
/// The command line is `program args.. BUILD_DIR=<workspace> TOP_MODULE=<top>`, run from
/// `project_dir`. On success the toolchain leaves `artifact_name` in the workspace.
#[derive(Clone, Debug)]
pub struct ToolchainConfig {
    pub program: String,
    pub args: Vec<String>,
    pub project_dir: PathBuf,
    pub artifact_name: String,
    pub build_timeout: Option<Duration>,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.into(),
            args: Vec::new(),
            project_dir: DEFAULT_PROJECT_DIR.into(),
            artifact_name: DEFAULT_ARTIFACT_NAME.into(),
            build_timeout: None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CoordinatorConfig {
    pub workspace: WorkspaceConfig,
    pub toolchain: ToolchainConfig,
    /// Bound on the coordinator's mailbox. Limits the build-up of inbound messages.
    pub message_capacity: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            workspace: WorkspaceConfig::default(),
            toolchain: ToolchainConfig::default(),
            message_capacity: DEFAULT_MESSAGE_CAPACITY,
        }
    }
}
