//! Broker composition root.
//!
//! One [`BrokerService`] per host process owns the handler registry, the
//! bridge artifact and the RPC endpoint. Callers register a handler, place
//! the resulting [`EnvContract`] into the environment of the SSH client they
//! spawn, and unregister once that process is gone.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OnceCell;
use tracing::{debug, info};

use gitssh_core::config::BrokerConfig;
use gitssh_core::{EnvContract, Token};

use crate::artifact::{ArtifactBuilder, ArtifactSpec};
use crate::error::BrokerError;
use crate::handler::PromptHandler;
use crate::registry::HandlerRegistry;
use crate::server::{self, DispatcherService, EndpointHandle, ServerConfig};

/// Registry, artifact and endpoint behind one handle.
#[derive(Debug)]
pub struct BrokerService {
    registry: Arc<HandlerRegistry>,
    artifacts: Arc<ArtifactBuilder>,
    server_config: ServerConfig,
    prompt_timeout: Option<Duration>,
    known_hosts_command: bool,
    endpoint: OnceCell<EndpointHandle>,
}

impl BrokerService {
    /// Create a broker from configuration. Nothing is bound or written yet.
    pub fn new(config: &BrokerConfig) -> Result<Self, BrokerError> {
        let spec = ArtifactSpec::from_config(config)?;
        Ok(Self::from_parts(
            ServerConfig::from_broker(config),
            spec,
            config.prompt_timeout(),
            config.known_hosts_command,
        ))
    }

    pub fn from_parts(
        server_config: ServerConfig,
        artifact: ArtifactSpec,
        prompt_timeout: Option<Duration>,
        known_hosts_command: bool,
    ) -> Self {
        Self {
            registry: Arc::new(HandlerRegistry::new()),
            artifacts: Arc::new(ArtifactBuilder::new(artifact)),
            server_config,
            prompt_timeout,
            known_hosts_command,
            endpoint: OnceCell::new(),
        }
    }

    /// Register a handler and return its token.
    pub fn register(&self, handler: Arc<dyn PromptHandler>) -> Token {
        self.registry.register(handler)
    }

    /// Unregister a token, aborting calls still waiting on its handler.
    pub fn unregister(&self, token: Token) -> Result<(), BrokerError> {
        self.registry.unregister(token)
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// Path of the bridge artifact, generating it on first use.
    pub fn artifact_path(&self) -> Result<PathBuf, BrokerError> {
        Ok(self.artifacts.artifact_path()?)
    }

    /// How many times the artifact has been generated.
    pub fn artifact_generation_count(&self) -> usize {
        self.artifacts.generation_count()
    }

    /// Address of the endpoint, starting it on first use.
    ///
    /// The dispatcher is attached to the endpoint exactly once, however many
    /// handlers are registered. A failed start is returned to the caller and
    /// retried by the next one.
    pub async fn endpoint_addr(&self) -> Result<SocketAddr, BrokerError> {
        let endpoint = self
            .endpoint
            .get_or_try_init(|| async {
                let dispatcher =
                    DispatcherService::new(Arc::clone(&self.registry), self.prompt_timeout);
                server::start(&self.server_config, dispatcher).await
            })
            .await?;
        Ok(endpoint.addr())
    }

    pub async fn endpoint_port(&self) -> Result<u16, BrokerError> {
        Ok(self.endpoint_addr().await?.port())
    }

    /// Environment for a process whose questions `token` answers.
    ///
    /// Artifact generation does blocking file I/O, so it runs on the
    /// blocking pool.
    pub async fn environment(&self, token: Token) -> Result<EnvContract, BrokerError> {
        let addr = self.endpoint_addr().await?;
        let artifacts = Arc::clone(&self.artifacts);
        let artifact = tokio::task::spawn_blocking(move || artifacts.artifact_path()).await??;
        let host = match addr.ip() {
            ip if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
            ip => ip,
        };
        Ok(EnvContract {
            host: host.to_string(),
            port: addr.port(),
            token,
            artifact,
            known_hosts_command: self.known_hosts_command,
        })
    }

    /// Register `handler` for the lifetime of the returned session.
    pub fn open_session(self: &Arc<Self>, handler: Arc<dyn PromptHandler>) -> BrokerSession {
        let token = self.register(handler);
        BrokerSession {
            broker: Arc::clone(self),
            token,
            open: true,
        }
    }

    /// Stop the endpoint if it was started.
    pub async fn shutdown(self) -> Result<(), BrokerError> {
        if let Some(endpoint) = self.endpoint.into_inner() {
            endpoint.shutdown().await?;
            info!("Broker stopped");
        }
        Ok(())
    }
}

/// A registered handler that unregisters itself when dropped.
#[derive(Debug)]
pub struct BrokerSession {
    broker: Arc<BrokerService>,
    token: Token,
    open: bool,
}

impl BrokerSession {
    pub const fn token(&self) -> Token {
        self.token
    }

    /// Environment for the process this session serves.
    pub async fn environment(&self) -> Result<EnvContract, BrokerError> {
        self.broker.environment(self.token).await
    }

    /// Unregister now, reporting failure.
    pub fn close(mut self) -> Result<(), BrokerError> {
        self.open = false;
        self.broker.unregister(self.token)
    }
}

impl Drop for BrokerSession {
    fn drop(&mut self) {
        if self.open {
            if let Err(e) = self.broker.unregister(self.token) {
                debug!(token = %self.token, error = %e, "Session already unregistered");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::handler::RejectingHandler;

    fn broker(dir: &tempfile::TempDir) -> Arc<BrokerService> {
        let helper = dir.path().join("gitssh-askpass");
        std::fs::write(&helper, "").unwrap();
        let spec = ArtifactSpec::new(helper, dir.path().join("artifacts"));
        Arc::new(BrokerService::from_parts(
            ServerConfig::default(),
            spec,
            None,
            false,
        ))
    }

    #[tokio::test]
    async fn endpoint_starts_once() {
        let dir = tempfile::tempdir().unwrap();
        let broker = broker(&dir);
        let first = broker.endpoint_port().await.unwrap();
        let second = broker.endpoint_port().await.unwrap();
        assert_ne!(first, 0);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn environment_points_at_endpoint_and_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let broker = broker(&dir);
        let token = broker.register(Arc::new(RejectingHandler::new()));
        let env = broker.environment(token).await.unwrap();

        assert_eq!(env.host, "127.0.0.1");
        assert_eq!(env.port, broker.endpoint_port().await.unwrap());
        assert_eq!(env.token, token);
        assert_eq!(env.artifact, broker.artifact_path().unwrap());
        assert_eq!(broker.artifact_generation_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_environments_share_one_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let broker = broker(&dir);
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let broker = Arc::clone(&broker);
                tokio::spawn(async move {
                    let token = broker.register(Arc::new(RejectingHandler::new()));
                    broker.environment(token).await.unwrap().artifact
                })
            })
            .collect();

        let mut paths = Vec::new();
        for task in tasks {
            paths.push(task.await.unwrap());
        }
        assert!(paths.windows(2).all(|w| w[0] == w[1]));
        assert!(paths[0].is_file());
        assert_eq!(broker.artifact_generation_count(), 1);
    }

    #[tokio::test]
    async fn dropped_session_unregisters() {
        let dir = tempfile::tempdir().unwrap();
        let broker = broker(&dir);
        let session = broker.open_session(Arc::new(RejectingHandler::new()));
        let token = session.token();
        assert!(broker.registry().contains(token));
        drop(session);
        assert!(!broker.registry().contains(token));
    }

    #[tokio::test]
    async fn closing_an_unregistered_session_reports_it() {
        let dir = tempfile::tempdir().unwrap();
        let broker = broker(&dir);
        let session = broker.open_session(Arc::new(RejectingHandler::new()));
        broker.unregister(session.token()).unwrap();
        assert!(matches!(
            session.close(),
            Err(BrokerError::UnknownHandler { .. })
        ));
    }

    #[tokio::test]
    async fn occupied_port_fails_start() {
        let dir = tempfile::tempdir().unwrap();
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let helper = dir.path().join("gitssh-askpass");
        std::fs::write(&helper, "").unwrap();
        let broker = BrokerService::from_parts(
            ServerConfig::tcp(taken.local_addr().unwrap()),
            ArtifactSpec::new(helper, dir.path().to_path_buf()),
            None,
            false,
        );
        assert!(matches!(
            broker.endpoint_port().await,
            Err(BrokerError::Endpoint(_))
        ));
    }
}
