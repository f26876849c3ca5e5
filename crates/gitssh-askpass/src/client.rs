//! Client side of the handler RPC.
//!
//! Every method decodes the wire answer back into an [`Answer`]; callers
//! never see the sentinel strings.

use std::time::Duration;

use tonic::transport::{Channel, Endpoint};
use tracing::debug;

use gitssh_core::answer::{decode_scalar, decode_sequence};
use gitssh_core::env::CallbackTarget;
use gitssh_core::{Answer, Token};
use gitssh_proto::git_ssh_handler_client::GitSshHandlerClient;
use gitssh_proto::methods::{
    METHOD_ASK_PASSPHRASE, METHOD_ASK_PASSWORD, METHOD_GET_LAST_SUCCESSFUL,
    METHOD_REPLY_TO_CHALLENGE, METHOD_SET_LAST_SUCCESSFUL, METHOD_VERIFY_SERVER_HOST_KEY,
};
use gitssh_proto::{
    AskPassphraseRequest, AskPasswordRequest, GetLastSuccessfulRequest, ReplyToChallengeRequest,
    SetLastSuccessfulRequest, VerifyServerHostKeyRequest,
};

use crate::error::AskpassError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Host key details sent for verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostKey {
    pub hostname: String,
    pub port: u16,
    pub algorithm: String,
    pub fingerprint: String,
    pub is_new: bool,
}

/// Connection to the broker, bound to one handler token.
#[derive(Debug, Clone)]
pub struct BridgeClient {
    client: GitSshHandlerClient<Channel>,
    token: Token,
}

impl BridgeClient {
    /// Connect to the endpoint named by the environment contract.
    ///
    /// Only connecting is bounded; calls wait as long as the host takes to
    /// answer (the host applies its own prompt timeout).
    pub async fn connect(target: &CallbackTarget) -> Result<Self, AskpassError> {
        let addr = target.uri();
        let connect_failed = |reason: String| AskpassError::Connect {
            addr: addr.clone(),
            reason,
        };
        let channel = Endpoint::from_shared(addr.clone())
            .map_err(|e| connect_failed(e.to_string()))?
            .connect_timeout(CONNECT_TIMEOUT)
            .connect()
            .await
            .map_err(|e| connect_failed(e.to_string()))?;
        debug!(%addr, token = %target.token, "Connected to host process");
        Ok(Self {
            client: GitSshHandlerClient::new(channel),
            token: target.token,
        })
    }

    pub const fn token(&self) -> Token {
        self.token
    }

    pub async fn verify_server_host_key(&mut self, key: &HostKey) -> Result<bool, AskpassError> {
        let response = self
            .client
            .verify_server_host_key(VerifyServerHostKeyRequest {
                handler: self.token.get(),
                hostname: key.hostname.clone(),
                port: i32::from(key.port),
                algorithm: key.algorithm.clone(),
                key: key.fingerprint.clone(),
                is_new: key.is_new,
            })
            .await
            .map_err(rpc(METHOD_VERIFY_SERVER_HOST_KEY))?;
        Ok(response.into_inner().accepted)
    }

    pub async fn ask_passphrase(
        &mut self,
        username: &str,
        key_path: &str,
        reset_password: bool,
        last_error: &str,
    ) -> Result<Answer<String>, AskpassError> {
        let response = self
            .client
            .ask_passphrase(AskPassphraseRequest {
                handler: self.token.get(),
                username: username.to_string(),
                key_path: key_path.to_string(),
                reset_password,
                last_error: last_error.to_string(),
            })
            .await
            .map_err(rpc(METHOD_ASK_PASSPHRASE))?;
        Ok(decode_scalar(&response.into_inner().value)?)
    }

    pub async fn ask_password(
        &mut self,
        username: &str,
        reset_password: bool,
        last_error: &str,
    ) -> Result<Answer<String>, AskpassError> {
        let response = self
            .client
            .ask_password(AskPasswordRequest {
                handler: self.token.get(),
                username: username.to_string(),
                reset_password,
                last_error: last_error.to_string(),
            })
            .await
            .map_err(rpc(METHOD_ASK_PASSWORD))?;
        Ok(decode_scalar(&response.into_inner().value)?)
    }

    /// Send a whole prompt batch; `prompts` pairs each text with its echo flag.
    pub async fn reply_to_challenge(
        &mut self,
        username: &str,
        name: &str,
        instruction: &str,
        prompts: &[(String, bool)],
        last_error: &str,
    ) -> Result<Answer<Vec<String>>, AskpassError> {
        let num_prompts = i32::try_from(prompts.len())
            .map_err(|_| AskpassError::InvalidArgument(format!("{} prompts", prompts.len())))?;
        let response = self
            .client
            .reply_to_challenge(ReplyToChallengeRequest {
                handler: self.token.get(),
                username: username.to_string(),
                name: name.to_string(),
                instruction: instruction.to_string(),
                num_prompts,
                prompts: prompts.iter().map(|(text, _)| text.clone()).collect(),
                echo: prompts.iter().map(|(_, echo)| *echo).collect(),
                last_error: last_error.to_string(),
            })
            .await
            .map_err(rpc(METHOD_REPLY_TO_CHALLENGE))?;
        Ok(decode_sequence(response.into_inner().values))
    }

    pub async fn set_last_successful(
        &mut self,
        username: &str,
        method: &str,
        error: &str,
    ) -> Result<(), AskpassError> {
        self.client
            .set_last_successful(SetLastSuccessfulRequest {
                handler: self.token.get(),
                username: username.to_string(),
                method: method.to_string(),
                error: error.to_string(),
            })
            .await
            .map_err(rpc(METHOD_SET_LAST_SUCCESSFUL))?;
        Ok(())
    }

    /// Last method recorded for `username`; empty when unknown.
    pub async fn get_last_successful(&mut self, username: &str) -> Result<String, AskpassError> {
        let response = self
            .client
            .get_last_successful(GetLastSuccessfulRequest {
                handler: self.token.get(),
                username: username.to_string(),
            })
            .await
            .map_err(rpc(METHOD_GET_LAST_SUCCESSFUL))?;
        Ok(response.into_inner().method)
    }
}

fn rpc(method: &'static str) -> impl Fn(tonic::Status) -> AskpassError {
    move |status| AskpassError::Rpc { method, status }
}
