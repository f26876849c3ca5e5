//! Endpoint configuration.

use std::net::SocketAddr;
use std::time::Duration;

use gitssh_core::config::BrokerConfig;

/// Endpoint configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address. Port `0` picks an ephemeral port.
    pub addr: SocketAddr,

    /// HTTP/2 keepalive ping interval.
    pub keepalive_interval: Duration,

    /// How long to wait for a keepalive ack.
    pub keepalive_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            keepalive_interval: Duration::from_secs(30),
            keepalive_timeout: Duration::from_secs(10),
        }
    }
}

impl ServerConfig {
    /// Create a config bound to `addr`.
    pub fn tcp(addr: SocketAddr) -> Self {
        Self {
            addr,
            ..Default::default()
        }
    }

    pub fn from_broker(config: &BrokerConfig) -> Self {
        Self::tcp(SocketAddr::new(config.bind_addr, config.port))
    }
}
