use clap::Parser;
use std::{net::IpAddr, net::SocketAddr, path::PathBuf, time::Duration};
use synthlib::{config, CoordinatorConfig, ToolchainConfig, WorkspaceConfig};

/// Accept HDL sources over WebSocket and synthesize them with an external toolchain
#[derive(Debug, Parser)]
pub struct ServerConfig {
    /// Port to listen on
    #[clap(long, env = "PORT", default_value_t = 2019)]
    pub port: u16,

    /// Address to listen on
    #[clap(long, env = "SYNTH_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Directory the toolchain is run from
    #[clap(long, env = "SYNTH_PROJECT_DIR", default_value = config::DEFAULT_PROJECT_DIR)]
    pub project_dir: PathBuf,

    /// Toolchain program
    #[clap(long, env = "SYNTH_MAKE", default_value = config::DEFAULT_PROGRAM)]
    pub make: String,

    /// Artifact the toolchain leaves in the build directory
    #[clap(long, env = "SYNTH_ARTIFACT", default_value = config::DEFAULT_ARTIFACT_NAME)]
    pub artifact: String,

    /// Parent directory for job workspaces [default: system temp dir]
    #[clap(long, env = "SYNTH_WORKSPACE_ROOT")]
    pub workspace_root: Option<PathBuf>,

    /// Kill builds that run longer than this many seconds
    #[clap(long, env = "SYNTH_BUILD_TIMEOUT_SECS")]
    pub build_timeout_secs: Option<u64>,

    /// Capacity of the job coordinator's message queue
    #[clap(long, env = "SYNTH_MESSAGE_CAPACITY", default_value_t = config::DEFAULT_MESSAGE_CAPACITY)]
    pub message_capacity: usize,
}

impl ServerConfig {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        let mut workspace = WorkspaceConfig::default();
        if let Some(root) = &self.workspace_root {
            workspace.root = root.clone();
        }
        CoordinatorConfig {
            workspace,
            toolchain: ToolchainConfig {
                program: self.make.clone(),
                args: Vec::new(),
                project_dir: self.project_dir.clone(),
                artifact_name: self.artifact.clone(),
                build_timeout: self.build_timeout_secs.map(Duration::from_secs),
            },
            message_capacity: self.message_capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // defaults only show through where the environment leaves a setting alone
    fn unset(var: &str) -> bool {
        std::env::var_os(var).is_none()
    }

    #[test]
    fn defaults() {
        let config = ServerConfig::try_parse_from(["synth-server"]).unwrap();
        if unset("PORT") {
            assert_eq!(config.port, 2019);
        }
        if unset("PORT") && unset("SYNTH_HOST") {
            assert_eq!(config.listen_addr().to_string(), "0.0.0.0:2019");
        }
        let coordinator = config.coordinator_config();
        if unset("SYNTH_MAKE") {
            assert_eq!(coordinator.toolchain.program, "make");
        }
        if unset("SYNTH_ARTIFACT") {
            assert_eq!(coordinator.toolchain.artifact_name, "out.bin.cbin");
        }
        if unset("SYNTH_PROJECT_DIR") {
            assert_eq!(coordinator.toolchain.project_dir, PathBuf::from("./synthesis"));
        }
        if unset("SYNTH_BUILD_TIMEOUT_SECS") {
            assert_eq!(coordinator.toolchain.build_timeout, None);
        }
    }

    #[test]
    fn flags_override_defaults() {
        let config = ServerConfig::try_parse_from([
            "synth-server",
            "--port",
            "9000",
            "--host",
            "127.0.0.1",
            "--build-timeout-secs",
            "90",
            "--workspace-root",
            "/var/tmp",
        ])
        .unwrap();
        assert_eq!(config.listen_addr().to_string(), "127.0.0.1:9000");
        let coordinator = config.coordinator_config();
        assert_eq!(coordinator.toolchain.build_timeout, Some(Duration::from_secs(90)));
        assert_eq!(coordinator.workspace.root, PathBuf::from("/var/tmp"));
    }
}
