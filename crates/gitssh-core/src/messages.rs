//! Prompt message resources shipped inside the bridge artifact.
//!
//! The broker writes [`DEFAULT_MESSAGES`] into every generated artifact; the
//! askpass bridge loads it back (preferring a `messages.<lang>.toml` sibling
//! when one matches the user's locale) to recognise the SSH client's prompts
//! and to word its own diagnostics.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// File name of the default resource inside the artifact directory.
pub const FILE_NAME: &str = "messages.toml";

/// Built-in resource contents.
pub const DEFAULT_MESSAGES: &str = include_str!("../resources/messages.toml");

/// Regular expressions classifying free-text askpass prompts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PromptPatterns {
    /// Captures `host`, `algorithm` and `fingerprint`.
    pub host_key: String,
    /// Captures `key`.
    pub passphrase: String,
    /// Captures optional `user` and `host`.
    pub password: String,
}

/// Texts printed by the askpass bridge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageText {
    pub host_key_accept: String,
    pub cancelled: String,
    pub host_key_rejected: String,
    pub unavailable: String,
    pub not_configured: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Messages {
    pub patterns: PromptPatterns,
    pub text: MessageText,
}

impl Messages {
    /// Parse a resource file's contents.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Messages(e.to_string()))
    }

    /// The messages compiled into the binary.
    pub fn builtin() -> Result<Self> {
        Self::parse(DEFAULT_MESSAGES)
    }

    /// Load messages from an artifact resource directory.
    ///
    /// Tries `messages.<lang>.toml` first when a language is given, then
    /// `messages.toml`, then the built-in defaults.
    pub fn load(dir: &Path, lang: Option<&str>) -> Result<Self> {
        let localized = lang.map(|l| dir.join(format!("messages.{l}.toml")));
        let candidates = localized
            .into_iter()
            .chain(std::iter::once(dir.join(FILE_NAME)));
        for path in candidates {
            if path.is_file() {
                let content = std::fs::read_to_string(&path)?;
                return Self::parse(&content)
                    .map_err(|e| Error::Messages(format!("{}: {e}", path.display())));
            }
        }
        Self::builtin()
    }
}

/// Language code from a POSIX locale string (`de_DE.UTF-8` -> `de`).
pub fn language_of(locale: &str) -> Option<String> {
    let lang: String = locale
        .chars()
        .take_while(char::is_ascii_alphabetic)
        .collect::<String>()
        .to_ascii_lowercase();
    match lang.as_str() {
        "" | "c" | "posix" => None,
        _ => Some(lang),
    }
}

/// Substitute `{name}` placeholders in a message template.
pub fn render(template: &str, args: &[(&str, &str)]) -> String {
    args.iter().fold(template.to_string(), |acc, (name, value)| {
        acc.replace(&format!("{{{name}}}"), value)
    })
}
