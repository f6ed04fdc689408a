use crate::connection;
use std::{io, net::SocketAddr};
use synthlib::JobCoordinator;
use tokio::{
    net::TcpListener,
    select,
    sync::oneshot,
    task::JoinHandle,
};
use tracing::{info, warn};

/// WebSocket front end for a [`JobCoordinator`].
pub struct Server {
    addr: SocketAddr,
    coordinator: JobCoordinator,
}

/// A running [`Server`].
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl Server {
    pub fn new(addr: SocketAddr, coordinator: JobCoordinator) -> Self {
        Self { addr, coordinator }
    }

    /// Bind the listener and start accepting connections in the background.
    pub async fn start(self) -> io::Result<ServerHandle> {
        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;
        info!("listening on ws://{}", local_addr);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(accept_loop(listener, self.coordinator, shutdown_rx));
        Ok(ServerHandle {
            local_addr,
            shutdown_tx,
            task,
        })
    }
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections. Connections already open are served until they close.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.task.await;
        info!("listener stopped");
    }
}

async fn accept_loop(
    listener: TcpListener,
    coordinator: JobCoordinator,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    loop {
        select! {
            _ = &mut shutdown_rx => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tokio::spawn(connection::serve(stream, peer, coordinator.clone()));
                }
                Err(err) => warn!(error = %err, "failed to accept connection"),
            },
        }
    }
}
