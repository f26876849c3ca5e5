use gitssh_core::Answer;
use tracing::debug;

use super::{
    ChallengeQuestion, HostKeyQuestion, LastSuccessful, MethodMemory, PassphraseQuestion,
    PasswordQuestion, PromptError, PromptHandler,
};

/// Handler for headless runs: trusts no host key and supplies no secrets.
#[derive(Debug, Default)]
pub struct RejectingHandler {
    memory: MethodMemory,
}

impl RejectingHandler {
    pub fn new() -> Self {
        Self::default()
    }
}

#[tonic::async_trait]
impl PromptHandler for RejectingHandler {
    async fn verify_server_host_key(
        &self,
        question: &HostKeyQuestion,
    ) -> Result<bool, PromptError> {
        debug!(
            host = %question.hostname,
            port = question.port,
            is_new = question.is_new,
            "Rejecting host key without a prompt"
        );
        Ok(false)
    }

    async fn ask_passphrase(
        &self,
        _question: &PassphraseQuestion,
    ) -> Result<Answer<String>, PromptError> {
        Ok(Answer::Absent)
    }

    async fn reply_to_challenge(
        &self,
        _question: &ChallengeQuestion,
    ) -> Result<Answer<Vec<String>>, PromptError> {
        Ok(Answer::Absent)
    }

    async fn ask_password(
        &self,
        _question: &PasswordQuestion,
    ) -> Result<Answer<String>, PromptError> {
        Ok(Answer::Absent)
    }

    async fn set_last_successful(&self, report: &LastSuccessful) -> Result<(), PromptError> {
        self.memory.record(report);
        Ok(())
    }

    async fn get_last_successful(&self, username: &str) -> Result<String, PromptError> {
        Ok(self.memory.get(username))
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_everything_but_remembers_methods() {
        let handler = RejectingHandler::new();
        let host_key = HostKeyQuestion {
            hostname: "example.com".to_string(),
            port: 22,
            algorithm: "ssh-ed25519".to_string(),
            key: "SHA256:abc".to_string(),
            is_new: true,
        };
        assert!(!handler.verify_server_host_key(&host_key).await.unwrap());

        let password = PasswordQuestion {
            username: "alice".to_string(),
            reset_password: false,
            last_error: String::new(),
        };
        assert_eq!(handler.ask_password(&password).await.unwrap(), Answer::Absent);

        handler
            .set_last_successful(&LastSuccessful {
                username: "alice".to_string(),
                method: "publickey".to_string(),
                error: String::new(),
            })
            .await
            .unwrap();
        assert_eq!(handler.get_last_successful("alice").await.unwrap(), "publickey");
    }
}
