//! Prompt handlers: whatever answers an SSH client's handshake questions.
//!
//! A handler is registered with the broker for the lifetime of one external
//! process. Handlers may block for as long as a human takes to answer; the
//! dispatcher bounds each call with the configured prompt timeout.

mod channel;
mod memory;
mod reject;
mod terminal;
mod types;

pub use channel::{ChannelHandler, PromptRequest};
pub use memory::MethodMemory;
pub use reject::RejectingHandler;
pub use terminal::TerminalHandler;
pub use types::{
    ChallengeQuestion, HandshakeAnswer, HandshakeQuestion, HostKeyQuestion, LastSuccessful,
    PassphraseQuestion, PasswordQuestion, Prompt, PromptError,
};

use gitssh_core::Answer;

/// The capability set of an interactive handler.
///
/// Declining to answer is [`Answer::Absent`] (or `false` for host keys);
/// `Err` is reserved for the handler itself failing.
#[tonic::async_trait]
pub trait PromptHandler: Send + Sync + 'static {
    /// Decide whether the server host key is trusted.
    async fn verify_server_host_key(&self, question: &HostKeyQuestion)
    -> Result<bool, PromptError>;

    async fn ask_passphrase(
        &self,
        question: &PassphraseQuestion,
    ) -> Result<Answer<String>, PromptError>;

    /// Answer a whole keyboard-interactive batch, one answer per prompt.
    async fn reply_to_challenge(
        &self,
        question: &ChallengeQuestion,
    ) -> Result<Answer<Vec<String>>, PromptError>;

    async fn ask_password(&self, question: &PasswordQuestion)
    -> Result<Answer<String>, PromptError>;

    /// Record the outcome of an authentication method.
    async fn set_last_successful(&self, report: &LastSuccessful) -> Result<(), PromptError>;

    /// The last method that worked for `username`, or an empty string.
    async fn get_last_successful(&self, username: &str) -> Result<String, PromptError>;
}
