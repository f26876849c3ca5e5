//! Prompts on the controlling terminal.

use std::io::IsTerminal;
use std::sync::Arc;

use dialoguer::{Confirm, Input, Password};
use gitssh_core::Answer;
use tokio::sync::Mutex;

use super::{
    ChallengeQuestion, HostKeyQuestion, LastSuccessful, MethodMemory, PassphraseQuestion,
    PasswordQuestion, PromptError, PromptHandler,
};

/// Asks the user on stderr with `dialoguer`.
///
/// Prompts are serialized: two SSH processes asking at once get their
/// questions one after the other. A prompt abandoned by its caller (for
/// example on timeout) keeps the terminal until its dialog returns.
#[derive(Debug)]
pub struct TerminalHandler {
    attended: bool,
    turn: Arc<Mutex<()>>,
    memory: MethodMemory,
}

impl TerminalHandler {
    pub fn new() -> Self {
        Self {
            attended: std::io::stderr().is_terminal(),
            turn: Arc::new(Mutex::new(())),
            memory: MethodMemory::new(),
        }
    }

    /// Run a blocking dialog on the blocking pool, one at a time.
    async fn prompt<T, F>(&self, dialog: F) -> Result<T, PromptError>
    where
        T: Send + 'static,
        F: FnOnce() -> dialoguer::Result<T> + Send + 'static,
    {
        if !self.attended {
            return Err(PromptError::Unavailable);
        }
        let turn = Arc::clone(&self.turn).lock_owned().await;
        tokio::task::spawn_blocking(move || {
            let _turn = turn;
            dialog()
        })
        .await?
            .map_err(|e| PromptError::Ui(e.to_string()))
    }

    #[allow(clippy::print_stderr)]
    async fn secret(&self, header: String, label: String) -> Result<Answer<String>, PromptError> {
        let value = self
            .prompt(move || {
                eprintln!("{header}");
                Password::new()
                    .with_prompt(label)
                    .allow_empty_password(true)
                    .interact()
            })
            .await?;
        // An empty entry skips the prompt.
        Ok(Some(value).filter(|v| !v.is_empty()).into())
    }
}

impl Default for TerminalHandler {
    fn default() -> Self {
        Self::new()
    }
}

fn with_error(text: String, last_error: &str) -> String {
    if last_error.is_empty() {
        text
    } else {
        format!("{last_error}\n{text}")
    }
}

#[tonic::async_trait]
impl PromptHandler for TerminalHandler {
    async fn verify_server_host_key(
        &self,
        question: &HostKeyQuestion,
    ) -> Result<bool, PromptError> {
        let text = if question.is_new {
            format!(
                "The authenticity of host '{}' (port {}) can't be established.\n\
                 {} key fingerprint is {}.\nAre you sure you want to continue connecting?",
                question.hostname, question.port, question.algorithm, question.key
            )
        } else {
            format!(
                "WARNING: the {} host key for '{}' (port {}) has changed!\n\
                 New fingerprint is {}.\nAccept the new key?",
                question.algorithm, question.hostname, question.port, question.key
            )
        };
        let accepted = self
            .prompt(move || Confirm::new().with_prompt(text).default(false).interact_opt())
            .await?;
        Ok(accepted.unwrap_or(false))
    }

    async fn ask_passphrase(
        &self,
        question: &PassphraseQuestion,
    ) -> Result<Answer<String>, PromptError> {
        let header = with_error(
            format!("Passphrase for key '{}'", question.key_path),
            &question.last_error,
        );
        self.secret(header, "Passphrase".to_string()).await
    }

    async fn reply_to_challenge(
        &self,
        question: &ChallengeQuestion,
    ) -> Result<Answer<Vec<String>>, PromptError> {
        let mut header = Vec::new();
        if !question.last_error.is_empty() {
            header.push(question.last_error.clone());
        }
        if !question.name.is_empty() {
            header.push(question.name.clone());
        }
        if !question.instruction.is_empty() {
            header.push(question.instruction.clone());
        }
        let prompts = question.prompts.clone();
        #[allow(clippy::print_stderr)]
        let answers = self
            .prompt(move || {
                for line in &header {
                    eprintln!("{line}");
                }
                prompts
                    .into_iter()
                    .map(|prompt| {
                        let label = prompt.text.trim_end().trim_end_matches(':').to_string();
                        if prompt.echo {
                            Input::<String>::new()
                                .with_prompt(label)
                                .allow_empty(true)
                                .interact_text()
                        } else {
                            Password::new()
                                .with_prompt(label)
                                .allow_empty_password(true)
                                .interact()
                        }
                    })
                    .collect::<dialoguer::Result<Vec<_>>>()
            })
            .await?;
        Ok(Answer::Present(answers))
    }

    async fn ask_password(
        &self,
        question: &PasswordQuestion,
    ) -> Result<Answer<String>, PromptError> {
        let header = with_error(
            format!("Password for '{}'", question.username),
            &question.last_error,
        );
        self.secret(header, "Password".to_string()).await
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
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn detached() -> TerminalHandler {
        TerminalHandler {
            attended: false,
            ..TerminalHandler::new()
        }
    }

    fn attended() -> TerminalHandler {
        TerminalHandler {
            attended: true,
            ..TerminalHandler::new()
        }
    }

    /// A dialog that records how many dialogs run at once.
    fn counted_dialog(
        active: &Arc<AtomicUsize>,
        peak: &Arc<AtomicUsize>,
    ) -> impl FnOnce() -> dialoguer::Result<()> + Send + 'static {
        let active = Arc::clone(active);
        let peak = Arc::clone(peak);
        move || {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(300));
            active.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn abandoned_prompt_holds_the_terminal_until_its_dialog_ends() {
        let handler = attended();
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let abandoned = tokio::time::timeout(
            Duration::from_millis(50),
            handler.prompt(counted_dialog(&active, &peak)),
        )
        .await;
        assert!(abandoned.is_err());

        handler
            .prompt(counted_dialog(&active, &peak))
            .await
            .unwrap();
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn without_a_terminal_prompts_are_unavailable() {
        let handler = detached();
        let question = PasswordQuestion {
            username: "alice".to_string(),
            reset_password: false,
            last_error: String::new(),
        };
        assert!(matches!(
            handler.ask_password(&question).await,
            Err(PromptError::Unavailable)
        ));
    }

    #[tokio::test]
    async fn method_memory_works_without_a_terminal() {
        let handler = detached();
        handler
            .set_last_successful(&LastSuccessful {
                username: "bob".to_string(),
                method: "keyboard-interactive".to_string(),
                error: String::new(),
            })
            .await
            .unwrap();
        assert_eq!(
            handler.get_last_successful("bob").await.unwrap(),
            "keyboard-interactive"
        );
    }

    #[test]
    fn last_error_is_shown_first() {
        assert_eq!(with_error("Password".into(), ""), "Password");
        assert_eq!(with_error("Password".into(), "denied"), "denied\nPassword");
    }
}
