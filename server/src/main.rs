mod config;
mod connection;
mod dispatcher;

use clap::Parser;
use config::ServerConfig;
use dispatcher::Server;
use synthlib::JobCoordinator;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "synth_server=info,synthlib=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::parse();
    let coordinator_config = config.coordinator_config();
    tracing::info!(
        project_dir = %coordinator_config.toolchain.project_dir.display(),
        program = %coordinator_config.toolchain.program,
        workspace_root = %coordinator_config.workspace.root.display(),
        "starting synthesis server",
    );

    let coordinator = JobCoordinator::spawn(coordinator_config);
    let server = Server::new(config.listen_addr(), coordinator.clone())
        .start()
        .await?;
    tracing::info!(addr = %server.local_addr(), "accepting connections");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    server.stop().await;
    coordinator.shutdown().await;
    Ok(())
}
