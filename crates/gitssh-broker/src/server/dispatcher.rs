//! `GitSshHandler` gRPC implementation.
//!
//! Each call resolves the handler named by its token, forwards the question,
//! and encodes the answer for the wire. A call is bounded by the prompt
//! timeout (expiry answers "cancelled") and fails with `ABORTED` if its
//! handler is unregistered while the call is in flight.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tonic::{Request, Response, Status};
use tracing::{debug, instrument, warn};

use gitssh_core::Answer;
use gitssh_core::answer::{encode_scalar, encode_sequence};
use gitssh_proto::methods::{
    METHOD_ASK_PASSPHRASE, METHOD_ASK_PASSWORD, METHOD_GET_LAST_SUCCESSFUL,
    METHOD_REPLY_TO_CHALLENGE, METHOD_SET_LAST_SUCCESSFUL, METHOD_VERIFY_SERVER_HOST_KEY,
};
use gitssh_proto::v1::{
    AskPassphraseRequest, AskPasswordRequest, EncodedAnswer, EncodedSequence,
    GetLastSuccessfulRequest, GetLastSuccessfulResponse, ReplyToChallengeRequest,
    SetLastSuccessfulRequest, SetLastSuccessfulResponse, VerifyServerHostKeyRequest,
    VerifyServerHostKeyResponse, git_ssh_handler_server::GitSshHandler,
};

use crate::handler::{
    ChallengeQuestion, HostKeyQuestion, LastSuccessful, PassphraseQuestion, PasswordQuestion,
    Prompt, PromptError,
};
use crate::registry::{HandlerRegistry, ResolvedHandler};

/// Routes handler RPCs to registered prompt handlers.
#[derive(Clone)]
pub struct DispatcherService {
    registry: Arc<HandlerRegistry>,
    prompt_timeout: Option<Duration>,
}

impl DispatcherService {
    pub const fn new(registry: Arc<HandlerRegistry>, prompt_timeout: Option<Duration>) -> Self {
        Self {
            registry,
            prompt_timeout,
        }
    }

    #[allow(clippy::result_large_err)]
    fn resolve(&self, token: i32) -> Result<ResolvedHandler, Status> {
        self.registry.lookup(token).map_err(|e| {
            warn!(token, "Call for unknown handler");
            Status::from(e)
        })
    }

    /// Run one handler call under the timeout and the unregistration signal.
    ///
    /// `cancelled` is what the call answers when the timeout expires.
    async fn call<T, F>(
        &self,
        resolved: &ResolvedHandler,
        rpc: &'static str,
        cancelled: T,
        answer: F,
    ) -> Result<T, Status>
    where
        F: Future<Output = Result<T, PromptError>>,
    {
        let bounded = async {
            match self.prompt_timeout {
                Some(limit) => match tokio::time::timeout(limit, answer).await {
                    Ok(result) => result,
                    Err(_) => {
                        warn!(token = %resolved.token, rpc, ?limit, "Prompt timed out");
                        Ok(cancelled)
                    }
                },
                None => answer.await,
            }
        };

        tokio::select! {
            result = bounded => result.map_err(|e| {
                warn!(token = %resolved.token, rpc, error = %e, "Prompt handler failed");
                Status::internal(e.to_string())
            }),
            () = resolved.unregistered.cancelled() => {
                debug!(token = %resolved.token, rpc, "Handler unregistered mid-call");
                Err(Status::aborted(format!(
                    "Handler {} was unregistered during the call",
                    resolved.token
                )))
            }
        }
    }
}

impl std::fmt::Debug for DispatcherService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatcherService")
            .field("prompt_timeout", &self.prompt_timeout)
            .finish_non_exhaustive()
    }
}

#[allow(clippy::result_large_err)]
fn port_of(raw: i32) -> Result<u16, Status> {
    u16::try_from(raw).map_err(|_| Status::invalid_argument(format!("Invalid port {raw}")))
}

/// Pair prompts with their echo flags. Missing flags mean "no echo".
#[allow(clippy::result_large_err)]
fn prompts_of(num_prompts: i32, texts: Vec<String>, echo: &[bool]) -> Result<Vec<Prompt>, Status> {
    if usize::try_from(num_prompts).ok() != Some(texts.len()) {
        return Err(Status::invalid_argument(format!(
            "num_prompts is {num_prompts} but {} prompts were sent",
            texts.len()
        )));
    }
    Ok(texts
        .into_iter()
        .enumerate()
        .map(|(i, text)| Prompt {
            text,
            echo: echo.get(i).copied().unwrap_or(false),
        })
        .collect())
}

fn presence<T>(answer: &Answer<T>) -> &'static str {
    if answer.is_present() { "present" } else { "absent" }
}

#[tonic::async_trait]
impl GitSshHandler for DispatcherService {
    #[instrument(skip_all, fields(rpc = METHOD_VERIFY_SERVER_HOST_KEY, handler = request.get_ref().handler))]
    async fn verify_server_host_key(
        &self,
        request: Request<VerifyServerHostKeyRequest>,
    ) -> Result<Response<VerifyServerHostKeyResponse>, Status> {
        let req = request.into_inner();
        let resolved = self.resolve(req.handler)?;
        let question = HostKeyQuestion {
            port: port_of(req.port)?,
            hostname: req.hostname,
            algorithm: req.algorithm,
            key: req.key,
            is_new: req.is_new,
        };

        let accepted = self
            .call(
                &resolved,
                METHOD_VERIFY_SERVER_HOST_KEY,
                false,
                resolved.handler.verify_server_host_key(&question),
            )
            .await?;

        debug!(host = %question.hostname, accepted, "Host key decision");
        Ok(Response::new(VerifyServerHostKeyResponse { accepted }))
    }

    #[instrument(skip_all, fields(rpc = METHOD_ASK_PASSPHRASE, handler = request.get_ref().handler))]
    async fn ask_passphrase(
        &self,
        request: Request<AskPassphraseRequest>,
    ) -> Result<Response<EncodedAnswer>, Status> {
        let req = request.into_inner();
        let resolved = self.resolve(req.handler)?;
        let question = PassphraseQuestion {
            username: req.username,
            key_path: req.key_path,
            reset_password: req.reset_password,
            last_error: req.last_error,
        };

        let answer = self
            .call(
                &resolved,
                METHOD_ASK_PASSPHRASE,
                Answer::Absent,
                resolved.handler.ask_passphrase(&question),
            )
            .await?;

        debug!(answer = presence(&answer), "Passphrase answered");
        Ok(Response::new(EncodedAnswer {
            value: encode_scalar(answer.as_ref().map(String::as_str)),
        }))
    }

    #[instrument(skip_all, fields(rpc = METHOD_REPLY_TO_CHALLENGE, handler = request.get_ref().handler))]
    async fn reply_to_challenge(
        &self,
        request: Request<ReplyToChallengeRequest>,
    ) -> Result<Response<EncodedSequence>, Status> {
        let req = request.into_inner();
        let resolved = self.resolve(req.handler)?;
        let question = ChallengeQuestion {
            prompts: prompts_of(req.num_prompts, req.prompts, &req.echo)?,
            username: req.username,
            name: req.name,
            instruction: req.instruction,
            last_error: req.last_error,
        };

        let answer = self
            .call(
                &resolved,
                METHOD_REPLY_TO_CHALLENGE,
                Answer::Absent,
                resolved.handler.reply_to_challenge(&question),
            )
            .await?;

        debug!(
            prompts = question.prompts.len(),
            answer = presence(&answer),
            "Challenge answered"
        );
        Ok(Response::new(EncodedSequence {
            values: encode_sequence(answer),
        }))
    }

    #[instrument(skip_all, fields(rpc = METHOD_ASK_PASSWORD, handler = request.get_ref().handler))]
    async fn ask_password(
        &self,
        request: Request<AskPasswordRequest>,
    ) -> Result<Response<EncodedAnswer>, Status> {
        let req = request.into_inner();
        let resolved = self.resolve(req.handler)?;
        let question = PasswordQuestion {
            username: req.username,
            reset_password: req.reset_password,
            last_error: req.last_error,
        };

        let answer = self
            .call(
                &resolved,
                METHOD_ASK_PASSWORD,
                Answer::Absent,
                resolved.handler.ask_password(&question),
            )
            .await?;

        debug!(answer = presence(&answer), "Password answered");
        Ok(Response::new(EncodedAnswer {
            value: encode_scalar(answer.as_ref().map(String::as_str)),
        }))
    }

    #[instrument(skip_all, fields(rpc = METHOD_SET_LAST_SUCCESSFUL, handler = request.get_ref().handler))]
    async fn set_last_successful(
        &self,
        request: Request<SetLastSuccessfulRequest>,
    ) -> Result<Response<SetLastSuccessfulResponse>, Status> {
        let req = request.into_inner();
        let resolved = self.resolve(req.handler)?;
        let report = LastSuccessful {
            username: req.username,
            method: req.method,
            error: req.error,
        };

        self.call(
            &resolved,
            METHOD_SET_LAST_SUCCESSFUL,
            (),
            resolved.handler.set_last_successful(&report),
        )
        .await?;

        Ok(Response::new(SetLastSuccessfulResponse {
            value: String::new(),
        }))
    }

    #[instrument(skip_all, fields(rpc = METHOD_GET_LAST_SUCCESSFUL, handler = request.get_ref().handler))]
    async fn get_last_successful(
        &self,
        request: Request<GetLastSuccessfulRequest>,
    ) -> Result<Response<GetLastSuccessfulResponse>, Status> {
        let req = request.into_inner();
        let resolved = self.resolve(req.handler)?;

        let method = self
            .call(
                &resolved,
                METHOD_GET_LAST_SUCCESSFUL,
                String::new(),
                resolved.handler.get_last_successful(&req.username),
            )
            .await?;

        Ok(Response::new(GetLastSuccessfulResponse { method }))
    }
}
