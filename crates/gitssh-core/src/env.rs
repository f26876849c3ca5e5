//! Environment contract between the host process and the external SSH client.
//!
//! The host places the endpoint port, the handler token and the artifact path
//! into the environment of the process it spawns; the askpass bridge reads
//! them back when the SSH client invokes it.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::token::Token;

/// Port of the handler RPC endpoint.
pub const VAR_PORT: &str = "GITSSH_PORT";
/// Token of the handler answering this process's questions.
pub const VAR_HANDLER: &str = "GITSSH_HANDLER";
/// Loopback address of the handler RPC endpoint.
pub const VAR_HOST: &str = "GITSSH_HOST";
/// Path of the generated bridge artifact.
pub const VAR_ARTIFACT: &str = "GITSSH_ARTIFACT";
/// Directory holding the artifact's message resources (set by the artifact).
pub const VAR_RESOURCES: &str = "GITSSH_RESOURCES";
/// Enables askpass logging to stderr when set to a filter (e.g. `debug`).
pub const VAR_LOG: &str = "GITSSH_LOG";

/// OpenSSH askpass program.
pub const VAR_SSH_ASKPASS: &str = "SSH_ASKPASS";
/// Forces OpenSSH to use the askpass program even with a terminal.
pub const VAR_SSH_ASKPASS_REQUIRE: &str = "SSH_ASKPASS_REQUIRE";
/// Command git uses in place of `ssh`.
pub const VAR_GIT_SSH_COMMAND: &str = "GIT_SSH_COMMAND";

const DEFAULT_HOST: &str = "127.0.0.1";

/// Everything the spawned process needs to reach back into the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvContract {
    pub host: String,
    pub port: u16,
    pub token: Token,
    pub artifact: PathBuf,
    /// Route OpenSSH host key checks through the artifact via
    /// `KnownHostsCommand` (requires OpenSSH 8.5+).
    pub known_hosts_command: bool,
}

impl EnvContract {
    /// Environment variables to set on the spawned process.
    pub fn vars(&self) -> Vec<(&'static str, String)> {
        let artifact = self.artifact.display().to_string();
        let mut vars = vec![
            (VAR_HOST, self.host.clone()),
            (VAR_PORT, self.port.to_string()),
            (VAR_HANDLER, self.token.to_string()),
            (VAR_ARTIFACT, artifact.clone()),
            (VAR_SSH_ASKPASS, artifact),
            (VAR_SSH_ASKPASS_REQUIRE, "force".to_string()),
        ];
        if self.known_hosts_command {
            vars.push((VAR_GIT_SSH_COMMAND, ssh_command(&self.artifact)));
        }
        vars
    }
}

/// Where the askpass bridge sends its questions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackTarget {
    pub host: String,
    pub port: u16,
    pub token: Token,
}

impl CallbackTarget {
    /// Read the target from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the target through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port_raw = lookup(VAR_PORT).ok_or(Error::MissingEnv(VAR_PORT))?;
        let port = port_raw
            .trim()
            .parse::<u16>()
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| Error::InvalidEnv {
                name: VAR_PORT,
                value: port_raw.clone(),
            })?;
        let token = lookup(VAR_HANDLER)
            .ok_or(Error::MissingEnv(VAR_HANDLER))?
            .parse::<Token>()?;
        let host = lookup(VAR_HOST)
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        Ok(Self { host, port, token })
    }

    /// URI for a tonic channel.
    pub fn uri(&self) -> String {
        if self.host.contains(':') {
            format!("http://[{}]:{}", self.host, self.port)
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }
}

/// `GIT_SSH_COMMAND` value that makes OpenSSH consult the artifact for host
/// keys and refuse hosts it does not vouch for.
pub fn ssh_command(artifact: &Path) -> String {
    let known_hosts = format!(
        "KnownHostsCommand=\"{}\" known-hosts %H %p %t %K",
        artifact.display()
    );
    format!(
        "ssh -o {} -o StrictHostKeyChecking=yes",
        shell_quote(&known_hosts)
    )
}

/// Quote a string for a POSIX shell.
pub fn shell_quote(value: &str) -> String {
    if !value.is_empty()
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"/._-+=:,@%".contains(&b))
    {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn contract(known_hosts_command: bool) -> EnvContract {
        EnvContract {
            host: "127.0.0.1".to_string(),
            port: 40123,
            token: Token::new(77).unwrap(),
            artifact: PathBuf::from("/tmp/gitssh-x/gitssh-askpass.sh"),
            known_hosts_command,
        }
    }

    #[test]
    fn vars_cover_port_token_and_artifact() {
        let vars: HashMap<_, _> = contract(false).vars().into_iter().collect();
        assert_eq!(vars[VAR_PORT], "40123");
        assert_eq!(vars[VAR_HANDLER], "77");
        assert_eq!(vars[VAR_ARTIFACT], "/tmp/gitssh-x/gitssh-askpass.sh");
        assert_eq!(vars[VAR_SSH_ASKPASS], vars[VAR_ARTIFACT]);
        assert_eq!(vars[VAR_SSH_ASKPASS_REQUIRE], "force");
        assert!(!vars.contains_key(VAR_GIT_SSH_COMMAND));
    }

    #[test]
    fn known_hosts_command_sets_git_ssh_command() {
        let vars: HashMap<_, _> = contract(true).vars().into_iter().collect();
        let cmd = &vars[VAR_GIT_SSH_COMMAND];
        assert!(cmd.starts_with("ssh -o 'KnownHostsCommand=\"/tmp/gitssh-x/gitssh-askpass.sh\""));
        assert!(cmd.ends_with("-o StrictHostKeyChecking=yes"));
    }

    #[test]
    fn callback_target_round_trips_through_vars() {
        let vars: HashMap<_, _> = contract(false).vars().into_iter().collect();
        let target = CallbackTarget::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(target.port, 40123);
        assert_eq!(target.token.get(), 77);
        assert_eq!(target.uri(), "http://127.0.0.1:40123");
    }

    #[test]
    fn callback_target_reports_missing_and_invalid_vars() {
        let err = CallbackTarget::from_lookup(|_| None).unwrap_err();
        assert!(matches!(err, Error::MissingEnv(VAR_PORT)));

        let err = CallbackTarget::from_lookup(|k| match k {
            VAR_PORT => Some("0".to_string()),
            _ => Some("1".to_string()),
        })
        .unwrap_err();
        assert!(matches!(err, Error::InvalidEnv { name: VAR_PORT, .. }));

        let err = CallbackTarget::from_lookup(|k| match k {
            VAR_PORT => Some("22".to_string()),
            VAR_HANDLER => Some("-5".to_string()),
            _ => None,
        })
        .unwrap_err();
        assert!(matches!(err, Error::InvalidEnv { name: VAR_HANDLER, .. }));
    }

    #[test]
    fn ipv6_hosts_are_bracketed() {
        let target = CallbackTarget {
            host: "::1".to_string(),
            port: 9,
            token: Token::new(1).unwrap(),
        };
        assert_eq!(target.uri(), "http://[::1]:9");
    }

    #[test]
    fn shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote("/usr/bin/x"), "/usr/bin/x");
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
    }
}
