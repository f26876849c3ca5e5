//! Handshake questions and answers.

use gitssh_core::Answer;

/// Should the server host key be trusted?
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostKeyQuestion {
    pub hostname: String,
    pub port: u16,
    pub algorithm: String,
    /// Key fingerprint as shown to the user.
    pub key: String,
    /// `true` for an unknown host, `false` when the recorded key changed.
    pub is_new: bool,
}

/// Passphrase for a private key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassphraseQuestion {
    pub username: String,
    pub key_path: String,
    /// The previous answer was wrong; do not reuse a remembered one.
    pub reset_password: bool,
    pub last_error: String,
}

/// Password for a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordQuestion {
    pub username: String,
    pub reset_password: bool,
    pub last_error: String,
}

/// One keyboard-interactive prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub text: String,
    /// Whether the answer may be shown while typing.
    pub echo: bool,
}

/// A keyboard-interactive prompt batch, answered as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeQuestion {
    pub username: String,
    pub name: String,
    pub instruction: String,
    pub prompts: Vec<Prompt>,
    pub last_error: String,
}

/// Outcome of an authentication method, reported for the next attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastSuccessful {
    pub username: String,
    pub method: String,
    pub error: String,
}

/// Any question a handler can be asked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeQuestion {
    HostKey(HostKeyQuestion),
    Passphrase(PassphraseQuestion),
    Challenge(ChallengeQuestion),
    Password(PasswordQuestion),
    SetLastSuccessful(LastSuccessful),
    GetLastSuccessful { username: String },
}

impl HandshakeQuestion {
    /// Short name of the question kind for logs.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::HostKey(_) => "host_key",
            Self::Passphrase(_) => "passphrase",
            Self::Challenge(_) => "challenge",
            Self::Password(_) => "password",
            Self::SetLastSuccessful(_) => "set_last_successful",
            Self::GetLastSuccessful { .. } => "get_last_successful",
        }
    }
}

/// Answer matching a [`HandshakeQuestion`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeAnswer {
    HostKey(bool),
    /// Passphrase or password.
    Secret(Answer<String>),
    Challenge(Answer<Vec<String>>),
    /// Empty when unknown.
    LastSuccessful(String),
    Ack,
}

/// Errors raised by a handler while producing an answer.
///
/// A user declining to answer is not an error; it is an absent answer.
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("Prompt UI failed: {0}")]
    Ui(String),

    #[error("Prompt UI is not available")]
    Unavailable,

    #[error("Answer does not match a {question} question")]
    AnswerMismatch { question: &'static str },

    #[error("Prompt task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
