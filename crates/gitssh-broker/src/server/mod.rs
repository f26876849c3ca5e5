//! gRPC endpoint the askpass bridge calls back into.
//!
//! The listener is bound before the server task starts, so the port is known
//! as soon as [`start`] returns.

mod config;
mod dispatcher;

pub use config::ServerConfig;
pub use dispatcher::DispatcherService;

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tracing::{info, warn};

use gitssh_proto::git_ssh_handler_server::GitSshHandlerServer;
use gitssh_proto::methods::HANDLER_NAME;

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("Cannot bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A running endpoint. Dropping the handle stops the server.
#[derive(Debug)]
pub struct EndpointHandle {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<Result<(), ServerError>>>,
}

impl EndpointHandle {
    /// Address the endpoint listens on.
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub const fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Stop accepting calls and wait for the server task to finish.
    pub async fn shutdown(mut self) -> Result<(), ServerError> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.task.take() {
            Some(task) => task.await.map_err(|e| ServerError::Io(std::io::Error::other(e)))?,
            None => Ok(()),
        }
    }
}

impl Drop for EndpointHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Bind the endpoint and serve `dispatcher` on it in the background.
pub async fn start(
    config: &ServerConfig,
    dispatcher: DispatcherService,
) -> Result<EndpointHandle, ServerError> {
    let listener = TcpListener::bind(config.addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: config.addr,
            source,
        })?;
    let addr = listener.local_addr()?;
    let incoming = TcpListenerStream::new(listener);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    info!(%addr, service = HANDLER_NAME, "Starting handler endpoint");

    let server = Server::builder()
        .http2_keepalive_interval(Some(config.keepalive_interval))
        .http2_keepalive_timeout(Some(config.keepalive_timeout))
        .add_service(GitSshHandlerServer::new(dispatcher))
        .serve_with_incoming_shutdown(incoming, async move {
            let _ = shutdown_rx.await;
        });

    let task = tokio::spawn(async move {
        let result = server.await.map_err(ServerError::from);
        match &result {
            Ok(()) => info!(%addr, "Handler endpoint stopped"),
            Err(e) => warn!(%addr, error = %e, "Handler endpoint failed"),
        }
        result
    });

    Ok(EndpointHandle {
        addr,
        shutdown: Some(shutdown_tx),
        task: Some(task),
    })
}
