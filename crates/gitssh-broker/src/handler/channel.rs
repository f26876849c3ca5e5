//! Handler that hands questions to a UI task over a channel.

use gitssh_core::Answer;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use super::{
    ChallengeQuestion, HandshakeAnswer, HandshakeQuestion, HostKeyQuestion, LastSuccessful,
    PassphraseQuestion, PasswordQuestion, PromptError, PromptHandler,
};

/// A question waiting for the UI.
///
/// Dropping `reply` without sending cancels the question.
#[derive(Debug)]
pub struct PromptRequest {
    pub question: HandshakeQuestion,
    pub reply: oneshot::Sender<HandshakeAnswer>,
}

/// Forwards every question to whoever holds the receiving end.
#[derive(Debug, Clone)]
pub struct ChannelHandler {
    tx: mpsc::Sender<PromptRequest>,
}

impl ChannelHandler {
    /// Create a handler and the receiver the UI task reads questions from.
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<PromptRequest>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }

    /// Send a question and wait. `None` means the UI dropped it unanswered.
    async fn ask(
        &self,
        question: HandshakeQuestion,
    ) -> Result<Option<HandshakeAnswer>, PromptError> {
        let kind = question.kind();
        let (reply, answer) = oneshot::channel();
        self.tx
            .send(PromptRequest { question, reply })
            .await
            .map_err(|_| PromptError::Unavailable)?;
        let answer = answer.await.ok();
        if answer.is_none() {
            debug!(kind, "Prompt dropped by UI");
        }
        Ok(answer)
    }
}

const fn mismatch(question: &'static str) -> PromptError {
    PromptError::AnswerMismatch { question }
}

#[tonic::async_trait]
impl PromptHandler for ChannelHandler {
    async fn verify_server_host_key(
        &self,
        question: &HostKeyQuestion,
    ) -> Result<bool, PromptError> {
        match self.ask(HandshakeQuestion::HostKey(question.clone())).await? {
            None => Ok(false),
            Some(HandshakeAnswer::HostKey(accepted)) => Ok(accepted),
            Some(_) => Err(mismatch("host_key")),
        }
    }

    async fn ask_passphrase(
        &self,
        question: &PassphraseQuestion,
    ) -> Result<Answer<String>, PromptError> {
        match self
            .ask(HandshakeQuestion::Passphrase(question.clone()))
            .await?
        {
            None => Ok(Answer::Absent),
            Some(HandshakeAnswer::Secret(answer)) => Ok(answer),
            Some(_) => Err(mismatch("passphrase")),
        }
    }

    async fn reply_to_challenge(
        &self,
        question: &ChallengeQuestion,
    ) -> Result<Answer<Vec<String>>, PromptError> {
        match self.ask(HandshakeQuestion::Challenge(question.clone())).await? {
            None => Ok(Answer::Absent),
            Some(HandshakeAnswer::Challenge(answer)) => Ok(answer),
            Some(_) => Err(mismatch("challenge")),
        }
    }

    async fn ask_password(
        &self,
        question: &PasswordQuestion,
    ) -> Result<Answer<String>, PromptError> {
        match self.ask(HandshakeQuestion::Password(question.clone())).await? {
            None => Ok(Answer::Absent),
            Some(HandshakeAnswer::Secret(answer)) => Ok(answer),
            Some(_) => Err(mismatch("password")),
        }
    }

    async fn set_last_successful(&self, report: &LastSuccessful) -> Result<(), PromptError> {
        match self
            .ask(HandshakeQuestion::SetLastSuccessful(report.clone()))
            .await?
        {
            None | Some(HandshakeAnswer::Ack) => Ok(()),
            Some(_) => Err(mismatch("set_last_successful")),
        }
    }

    async fn get_last_successful(&self, username: &str) -> Result<String, PromptError> {
        let question = HandshakeQuestion::GetLastSuccessful {
            username: username.to_string(),
        };
        match self.ask(question).await? {
            None => Ok(String::new()),
            Some(HandshakeAnswer::LastSuccessful(method)) => Ok(method),
            Some(_) => Err(mismatch("get_last_successful")),
        }
    }
}
