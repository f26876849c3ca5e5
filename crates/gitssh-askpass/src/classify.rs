//! Recognising free-text OpenSSH askpass prompts.

use regex::Regex;

use gitssh_core::messages::PromptPatterns;

use crate::error::AskpassError;
use crate::known_hosts;

/// What a free-text prompt is asking for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptKind {
    /// Confirmation of an unknown host key.
    HostKey {
        host: String,
        port: u16,
        algorithm: String,
        fingerprint: String,
    },
    Passphrase {
        key_path: String,
    },
    Password {
        username: String,
    },
    /// Anything else, answered as a one-prompt challenge.
    Other {
        text: String,
    },
}

/// Compiled prompt patterns.
#[derive(Debug, Clone)]
pub struct Classifier {
    host_key: Regex,
    passphrase: Regex,
    password: Regex,
}

impl Classifier {
    /// Compile the patterns, rejecting any that lacks a group the
    /// classification reads.
    pub fn new(patterns: &PromptPatterns) -> Result<Self, AskpassError> {
        Ok(Self {
            host_key: compile(
                "host_key",
                &patterns.host_key,
                &["host", "algorithm", "fingerprint"],
            )?,
            passphrase: compile("passphrase", &patterns.passphrase, &["key"])?,
            password: compile("password", &patterns.password, &[])?,
        })
    }

    pub fn classify(&self, prompt: &str) -> PromptKind {
        if let Some(caps) = self.host_key.captures(prompt) {
            if let (Some(host), Some(algorithm), Some(fingerprint)) = (
                caps.name("host"),
                caps.name("algorithm"),
                caps.name("fingerprint"),
            ) {
                let (host, port) = split_host_port(host.as_str());
                return PromptKind::HostKey {
                    host,
                    port,
                    algorithm: algorithm.as_str().to_string(),
                    fingerprint: fingerprint.as_str().to_string(),
                };
            }
        }
        if let Some(key) = self
            .passphrase
            .captures(prompt)
            .and_then(|caps| caps.name("key"))
        {
            return PromptKind::Passphrase {
                key_path: key.as_str().to_string(),
            };
        }
        if let Some(caps) = self.password.captures(prompt) {
            return PromptKind::Password {
                username: caps
                    .name("user")
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default(),
            };
        }
        PromptKind::Other {
            text: prompt.to_string(),
        }
    }
}

fn compile(
    name: &'static str,
    pattern: &str,
    groups: &[&'static str],
) -> Result<Regex, AskpassError> {
    let regex = Regex::new(pattern)?;
    let missing = groups
        .iter()
        .find(|group| !regex.capture_names().flatten().any(|n| n == **group))
        .copied();
    match missing {
        Some(group) => Err(AskpassError::MissingGroup {
            pattern: name,
            group,
        }),
        None => Ok(regex),
    }
}

/// Split `[host]:port` into its parts; a bare host means port 22.
fn split_host_port(raw: &str) -> (String, u16) {
    raw.strip_prefix('[')
        .and_then(|rest| rest.split_once("]:"))
        .and_then(|(host, port)| Some((host.to_string(), port.parse().ok()?)))
        .unwrap_or_else(|| (raw.to_string(), 22))
}

/// The host name OpenSSH shows for `host:port`, for messages.
pub fn display_host(host: &str, port: u16) -> String {
    known_hosts::host_name(host, port)
}
