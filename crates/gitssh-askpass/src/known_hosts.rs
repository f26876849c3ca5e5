//! Local host key checks against OpenSSH `known_hosts` files.
//!
//! Keys already trusted are answered without asking the host process. Hashed
//! entries (`|1|...`) cannot be matched without HMAC support and are skipped,
//! so a host recorded only in hashed form counts as new.

use std::path::PathBuf;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::AskpassError;

const DEFAULT_SSH_PORT: u16 = 22;

/// Trust state of a host key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostStatus {
    /// The exact key is recorded for the host.
    Known,
    /// The host has a different key of the same type.
    Changed,
    /// Nothing usable is recorded.
    New,
    /// The key is marked `@revoked`.
    Revoked,
}

/// One parsed `known_hosts` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    patterns: Vec<String>,
    key_type: String,
    key: String,
    revoked: bool,
}

/// Parse `known_hosts` contents, skipping comments, hashed hosts,
/// certificate authorities and malformed lines.
pub fn parse(content: &str) -> Vec<Entry> {
    content.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<Entry> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let mut fields = line.split_whitespace();
    let mut hosts = fields.next()?;
    let mut revoked = false;
    if let Some(marker) = hosts.strip_prefix('@') {
        match marker {
            "revoked" => revoked = true,
            _ => return None,
        }
        hosts = fields.next()?;
    }
    if hosts.starts_with('|') {
        return None;
    }
    Some(Entry {
        patterns: hosts.split(',').map(str::to_string).collect(),
        key_type: fields.next()?.to_string(),
        key: fields.next()?.to_string(),
        revoked,
    })
}

/// The name a host is recorded under: `host` on port 22, `[host]:port`
/// otherwise.
pub fn host_name(host: &str, port: u16) -> String {
    if port == DEFAULT_SSH_PORT {
        host.to_string()
    } else {
        format!("[{host}]:{port}")
    }
}

impl Entry {
    fn matches_host(&self, name: &str) -> bool {
        let mut matched = false;
        for pattern in &self.patterns {
            if let Some(negated) = pattern.strip_prefix('!') {
                if glob_match(negated, name) {
                    return false;
                }
            } else if glob_match(pattern, name) {
                matched = true;
            }
        }
        matched
    }
}

/// Decide the status of `key` for `host:port` against parsed entries.
pub fn check(entries: &[Entry], host: &str, port: u16, key_type: &str, key: &str) -> HostStatus {
    let name = host_name(host, port);
    let mut status = HostStatus::New;
    for entry in entries.iter().filter(|e| e.matches_host(&name)) {
        if entry.key_type != key_type {
            continue;
        }
        if entry.key == key {
            if entry.revoked {
                return HostStatus::Revoked;
            }
            status = HostStatus::Known;
        } else if !entry.revoked && status == HostStatus::New {
            status = HostStatus::Changed;
        }
    }
    status
}

/// Read and parse several files; missing files are empty.
pub fn load(paths: &[PathBuf]) -> Result<Vec<Entry>, AskpassError> {
    let mut entries = Vec::new();
    for path in paths {
        match std::fs::read_to_string(path) {
            Ok(content) => entries.extend(parse(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No known_hosts file");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(entries)
}

/// `~/.ssh/known_hosts`, when a home directory is known.
pub fn default_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".ssh").join("known_hosts"))
}

/// OpenSSH-style `SHA256:` fingerprint of a base64 public key blob.
pub fn fingerprint(key_base64: &str) -> Result<String, AskpassError> {
    let blob = STANDARD
        .decode(key_base64.trim())
        .map_err(|e| AskpassError::InvalidKey(e.to_string()))?;
    let digest = Sha256::digest(&blob);
    Ok(format!("SHA256:{}", STANDARD_NO_PAD.encode(digest)))
}

/// A `known_hosts` line for an accepted key.
pub fn known_hosts_line(host: &str, port: u16, key_type: &str, key: &str) -> String {
    format!("{} {key_type} {key}", host_name(host, port))
}

/// OpenSSH host pattern matching: `*` and `?` wildcards, case-insensitive.
fn glob_match(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.to_ascii_lowercase().chars().collect();
    let name: Vec<char> = name.to_ascii_lowercase().chars().collect();
    let (mut p, mut n) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while n < name.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == name[n]) {
            p += 1;
            n += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some((p, n));
            p += 1;
        } else if let Some((sp, sn)) = star {
            p = sp + 1;
            n = sn + 1;
            star = Some((sp, sn + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|c| *c == '*')
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const KEY_A: &str = "AAAAC3NzaC1lZDI1NTE5AAAAIOMqqnkVzrm0SdG6UOoqKLsabgH5C9okWi0dh2l9GKJl";
    const KEY_B: &str = "AAAAC3NzaC1lZDI1NTE5AAAAIBGxG5PzhOAf1BbbcTHPeYvK3lV9kxY7sMXaYwzFZZzb";

    fn entries() -> Vec<Entry> {
        parse(&format!(
            "# comment\n\
             github.com,140.82.121.3 ssh-ed25519 {KEY_A}\n\
             [git.example.com]:2222 ssh-ed25519 {KEY_B}\n\
             |1|hashed=|salt= ssh-ed25519 {KEY_B}\n\
             @cert-authority *.example.org ssh-ed25519 {KEY_A}\n\
             @revoked bad.example.com ssh-ed25519 {KEY_A}\n\
             *.corp,!secret.corp ssh-ed25519 {KEY_A}\n\
             broken-line\n"
        ))
    }

    #[test]
    fn comments_hashed_and_ca_lines_are_skipped() {
        assert_eq!(entries().len(), 4);
    }

    #[test]
    fn exact_key_is_known() {
        let status = check(&entries(), "github.com", 22, "ssh-ed25519", KEY_A);
        assert_eq!(status, HostStatus::Known);
        let status = check(&entries(), "140.82.121.3", 22, "ssh-ed25519", KEY_A);
        assert_eq!(status, HostStatus::Known);
    }

    #[test]
    fn different_key_is_changed() {
        let status = check(&entries(), "github.com", 22, "ssh-ed25519", KEY_B);
        assert_eq!(status, HostStatus::Changed);
    }

    #[test]
    fn other_key_type_is_new() {
        let status = check(&entries(), "github.com", 22, "ssh-rsa", KEY_B);
        assert_eq!(status, HostStatus::New);
    }

    #[test]
    fn non_default_port_uses_bracketed_name() {
        assert_eq!(
            check(&entries(), "git.example.com", 2222, "ssh-ed25519", KEY_B),
            HostStatus::Known
        );
        assert_eq!(
            check(&entries(), "git.example.com", 22, "ssh-ed25519", KEY_B),
            HostStatus::New
        );
    }

    #[test]
    fn revoked_key_is_reported() {
        assert_eq!(
            check(&entries(), "bad.example.com", 22, "ssh-ed25519", KEY_A),
            HostStatus::Revoked
        );
    }

    #[test]
    fn wildcards_and_negation() {
        assert_eq!(
            check(&entries(), "build.corp", 22, "ssh-ed25519", KEY_A),
            HostStatus::Known
        );
        assert_eq!(
            check(&entries(), "secret.corp", 22, "ssh-ed25519", KEY_A),
            HostStatus::New
        );
    }

    #[test]
    fn fingerprint_matches_openssh() {
        // SHA-256 of the empty input, unpadded.
        assert_eq!(
            fingerprint("").unwrap(),
            "SHA256:47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU"
        );
        assert!(fingerprint("not base64!").is_err());
    }

    #[test]
    fn accepted_key_line() {
        assert_eq!(
            known_hosts_line("example.com", 22, "ssh-rsa", "AAAA"),
            "example.com ssh-rsa AAAA"
        );
        assert_eq!(
            known_hosts_line("example.com", 2222, "ssh-rsa", "AAAA"),
            "[example.com]:2222 ssh-rsa AAAA"
        );
    }

    #[test]
    fn missing_files_are_empty() {
        let dir = tempfile::tempdir().unwrap();
        let entries = load(&[dir.path().join("absent")]).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn glob_cases() {
        assert!(glob_match("*", "anything"));
        assert!(glob_match("git?.example.com", "git1.example.com"));
        assert!(glob_match("GitHub.com", "github.com"));
        assert!(!glob_match("*.example.com", "example.com"));
        assert!(glob_match("a*b*c", "aXXbYYc"));
    }

    proptest! {
        #[test]
        fn recorded_line_is_known(host in "[a-z][a-z0-9.-]{0,20}", port in 1u16..) {
            let line = known_hosts_line(&host, port, "ssh-ed25519", KEY_A);
            let entries = parse(&line);
            prop_assert_eq!(
                check(&entries, &host, port, "ssh-ed25519", KEY_A),
                HostStatus::Known
            );
        }
    }
}
