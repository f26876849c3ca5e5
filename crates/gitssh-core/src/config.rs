//! Configuration resolution for gitssh.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/gitssh/settings.json)
//! 3. Environment variables
//! 4. CLI arguments (highest priority, applied by the binaries)

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Complete gitssh configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub broker: BrokerConfig,
}

/// Broker-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BrokerConfig {
    /// Address the handler endpoint binds to. Loopback only by default.
    pub bind_addr: IpAddr,
    /// Endpoint port; `0` picks an ephemeral port.
    pub port: u16,
    /// Upper bound on a single handler call; `0` waits forever.
    pub prompt_timeout_secs: u64,
    /// Base directory for generated artifacts (system temp dir when unset).
    pub artifact_dir: Option<PathBuf>,
    /// The askpass helper binary (sibling of the current executable when unset).
    pub askpass_binary: Option<PathBuf>,
    /// Also route host key checks through `KnownHostsCommand`.
    pub known_hosts_command: bool,
    pub log_level: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            prompt_timeout_secs: 600, // 10 minutes for a human to answer
            artifact_dir: None,
            askpass_binary: None,
            known_hosts_command: false,
            log_level: "info".to_string(),
        }
    }
}

impl BrokerConfig {
    /// Handler call timeout, `None` when disabled.
    pub const fn prompt_timeout(&self) -> Option<Duration> {
        if self.prompt_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.prompt_timeout_secs))
        }
    }
}

/// Load configuration with hierarchical resolution.
pub fn load_config() -> Result<Config> {
    let mut config = Config::default();

    // Load global config
    if let Some(global_path) = global_config_path() {
        if global_path.exists() {
            config = load_config_file(&global_path)?;
        }
    }

    // Apply environment overrides
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());

    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .ok()
            .map(|h| PathBuf::from(h).join(".gitssh").join("settings.json"))
    }
    #[cfg(target_os = "macos")]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join("Library/Application Support/gitssh/settings.json"))
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".config")))
            .map(|p| p.join("gitssh").join("settings.json"))
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        None
    }
}

fn load_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(addr) = lookup("GITSSH_BIND_ADDR").and_then(|v| v.parse().ok()) {
        config.broker.bind_addr = addr;
    }
    if let Some(port) = lookup("GITSSH_LISTEN_PORT").and_then(|v| v.parse().ok()) {
        config.broker.port = port;
    }
    if let Some(secs) = lookup("GITSSH_PROMPT_TIMEOUT").and_then(|v| v.parse().ok()) {
        config.broker.prompt_timeout_secs = secs;
    }
    if let Some(dir) = lookup("GITSSH_ARTIFACT_DIR") {
        config.broker.artifact_dir = Some(PathBuf::from(dir));
    }
    if let Some(bin) = lookup("GITSSH_ASKPASS_BIN") {
        config.broker.askpass_binary = Some(PathBuf::from(bin));
    }
    if let Some(level) = lookup("GITSSH_LOG_LEVEL") {
        config.broker.log_level = level;
    }
}
