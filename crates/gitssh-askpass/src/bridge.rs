//! Turning one invocation into one remote question and one printed answer.

use std::path::PathBuf;

use tracing::{debug, info};

use gitssh_core::Answer;
use gitssh_core::Messages;
use gitssh_core::env::CallbackTarget;
use gitssh_core::messages::render;

use crate::classify::{Classifier, PromptKind, display_host};
use crate::cli::{LastSuccessfulAction, Mode};
use crate::client::{BridgeClient, HostKey};
use crate::error::AskpassError;
use crate::known_hosts::{self, HostStatus};

/// `SSH_ASKPASS_PROMPT` value for notifications that need no answer.
const PROMPT_HINT_VAR: &str = "SSH_ASKPASS_PROMPT";

/// Result of an invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Print this on stdout and succeed.
    Answer(String),
    /// Succeed without output.
    Done,
    /// Fail, printing this on stderr.
    Declined(String),
}

/// Answers invocations by calling back into the host process.
pub struct Bridge<F> {
    messages: Messages,
    classifier: Classifier,
    env: F,
}

impl<F> Bridge<F>
where
    F: Fn(&str) -> Option<String>,
{
    pub fn new(messages: Messages, env: F) -> Result<Self, AskpassError> {
        let classifier = Classifier::new(&messages.patterns)?;
        Ok(Self {
            messages,
            classifier,
            env,
        })
    }

    pub const fn messages(&self) -> &Messages {
        &self.messages
    }

    async fn connect(&self) -> Result<BridgeClient, AskpassError> {
        let target = CallbackTarget::from_lookup(&self.env)?;
        BridgeClient::connect(&target).await
    }

    /// Answer a free-text askpass prompt.
    pub async fn prompt(&self, text: &str) -> Result<Outcome, AskpassError> {
        if (self.env)(PROMPT_HINT_VAR).as_deref() == Some("none") {
            info!(prompt = text, "Notification only");
            return Ok(Outcome::Done);
        }

        let kind = self.classifier.classify(text);
        debug!(?kind, "Classified prompt");
        match kind {
            PromptKind::HostKey {
                host,
                port,
                algorithm,
                fingerprint,
            } => {
                let key = HostKey {
                    hostname: host,
                    port,
                    algorithm,
                    fingerprint,
                    is_new: true,
                };
                let accepted = self.connect().await?.verify_server_host_key(&key).await?;
                Ok(self.host_key_outcome(&key, accepted))
            }
            PromptKind::Passphrase { key_path } => {
                let answer = self
                    .connect()
                    .await?
                    .ask_passphrase("", &key_path, false, "")
                    .await?;
                Ok(self.secret(answer))
            }
            PromptKind::Password { username } => {
                let answer = self
                    .connect()
                    .await?
                    .ask_password(&username, false, "")
                    .await?;
                Ok(self.secret(answer))
            }
            PromptKind::Other { text } => {
                let answer = self
                    .connect()
                    .await?
                    .reply_to_challenge("", "", "", &[(text, false)], "")
                    .await?;
                Ok(self.secret(answer.into_option().and_then(|a| a.into_iter().next()).into()))
            }
        }
    }

    /// Run a structured mode.
    pub async fn run(&self, mode: Mode) -> Result<Outcome, AskpassError> {
        match mode {
            Mode::KnownHosts {
                host,
                port,
                key_type,
                key,
                files,
            } => self.known_hosts(host, port, key_type, &key, files).await,
            Mode::VerifyHostKey {
                host,
                port,
                algorithm,
                key,
                changed,
            } => {
                let key = HostKey {
                    hostname: host,
                    port,
                    algorithm,
                    fingerprint: key,
                    is_new: !changed,
                };
                let accepted = self.connect().await?.verify_server_host_key(&key).await?;
                Ok(self.host_key_outcome(&key, accepted))
            }
            Mode::Passphrase {
                user,
                key_path,
                reset,
                last_error,
            } => {
                let answer = self
                    .connect()
                    .await?
                    .ask_passphrase(&user, &key_path, reset, &last_error)
                    .await?;
                Ok(self.secret(answer))
            }
            Mode::Password {
                user,
                reset,
                last_error,
            } => {
                let answer = self
                    .connect()
                    .await?
                    .ask_password(&user, reset, &last_error)
                    .await?;
                Ok(self.secret(answer))
            }
            Mode::Challenge {
                user,
                name,
                instruction,
                prompts,
                echo,
                last_error,
            } => {
                let prompts: Vec<(String, bool)> = prompts
                    .into_iter()
                    .enumerate()
                    .map(|(i, text)| (text, echo.get(i).copied().unwrap_or(false)))
                    .collect();
                let answer = self
                    .connect()
                    .await?
                    .reply_to_challenge(&user, &name, &instruction, &prompts, &last_error)
                    .await?;
                Ok(match answer {
                    Answer::Present(values) => Outcome::Answer(values.join("\n")),
                    // A batch of zero prompts has nothing to print.
                    Answer::Absent if prompts.is_empty() => Outcome::Done,
                    Answer::Absent => Outcome::Declined(self.messages.text.cancelled.clone()),
                })
            }
            Mode::LastSuccessful { action } => {
                let mut client = self.connect().await?;
                match action {
                    LastSuccessfulAction::Get { user } => {
                        Ok(Outcome::Answer(client.get_last_successful(&user).await?))
                    }
                    LastSuccessfulAction::Set {
                        user,
                        method,
                        error,
                    } => {
                        client.set_last_successful(&user, &method, &error).await?;
                        Ok(Outcome::Done)
                    }
                }
            }
        }
    }

    async fn known_hosts(
        &self,
        host: String,
        port: u16,
        key_type: String,
        key: &str,
        files: Vec<PathBuf>,
    ) -> Result<Outcome, AskpassError> {
        let files = if files.is_empty() {
            known_hosts::default_path().into_iter().collect()
        } else {
            files
        };
        let fingerprint = known_hosts::fingerprint(key)?;
        let entries = known_hosts::load(&files)?;
        let line = known_hosts::known_hosts_line(&host, port, &key_type, key);

        let status = known_hosts::check(&entries, &host, port, &key_type, key);
        debug!(%host, port, %fingerprint, ?status, "Local host key check");
        let is_new = match status {
            HostStatus::Known => return Ok(Outcome::Answer(line)),
            HostStatus::Revoked => return Ok(self.rejected(&host, port)),
            HostStatus::New => true,
            HostStatus::Changed => false,
        };

        let question = HostKey {
            hostname: host,
            port,
            algorithm: key_type,
            fingerprint,
            is_new,
        };
        let accepted = self
            .connect()
            .await?
            .verify_server_host_key(&question)
            .await?;
        if accepted {
            Ok(Outcome::Answer(line))
        } else {
            Ok(self.rejected(&question.hostname, port))
        }
    }

    fn host_key_outcome(&self, key: &HostKey, accepted: bool) -> Outcome {
        if accepted {
            Outcome::Answer(self.messages.text.host_key_accept.clone())
        } else {
            self.rejected(&key.hostname, key.port)
        }
    }

    fn rejected(&self, host: &str, port: u16) -> Outcome {
        Outcome::Declined(render(
            &self.messages.text.host_key_rejected,
            &[("host", &display_host(host, port))],
        ))
    }

    fn secret(&self, answer: Answer<String>) -> Outcome {
        match answer {
            Answer::Present(value) => Outcome::Answer(value),
            Answer::Absent => Outcome::Declined(self.messages.text.cancelled.clone()),
        }
    }

    /// stderr text for a failed invocation.
    pub fn describe_error(&self, error: &AskpassError) -> String {
        let template = if error.is_not_configured() {
            &self.messages.text.not_configured
        } else {
            &self.messages.text.unavailable
        };
        render(template, &[("error", &error.to_string())])
    }
}
