#![allow(clippy::unwrap_used)] // Integration tests use unwrap for brevity

//! End-to-end tests: askpass bridge -> broker endpoint -> prompt handler.

use std::collections::HashMap;
use std::sync::Arc;

use gitssh_askpass::cli::{LastSuccessfulAction, Mode};
use gitssh_askpass::known_hosts;
use gitssh_askpass::{AskpassError, Bridge, Outcome};
use gitssh_broker::BrokerService;
use gitssh_broker::artifact::ArtifactSpec;
use gitssh_broker::handler::{
    ChannelHandler, HandshakeAnswer, HandshakeQuestion, PromptHandler, RejectingHandler,
};
use gitssh_broker::server::ServerConfig;
use gitssh_core::{Answer, Messages};

const KEY: &str = "AAAAC3NzaC1lZDI1NTE5AAAAIOMqqnkVzrm0SdG6UOoqKLsabgH5C9okWi0dh2l9GKJl";

struct Host {
    _dir: tempfile::TempDir,
    broker: Arc<BrokerService>,
}

fn host() -> Host {
    let dir = tempfile::tempdir().unwrap();
    let helper = dir.path().join("gitssh-askpass");
    std::fs::write(&helper, "").unwrap();
    let broker = Arc::new(BrokerService::from_parts(
        ServerConfig::default(),
        ArtifactSpec::new(helper, dir.path().join("artifacts")),
        None,
        false,
    ));
    Host { _dir: dir, broker }
}

/// A handler answering like a user who accepts host keys and knows the
/// password "hunter2".
fn agreeable_handler() -> Arc<dyn PromptHandler> {
    let (handler, mut rx) = ChannelHandler::new(4);
    tokio::spawn(async move {
        while let Some(request) = rx.recv().await {
            let answer = match request.question {
                HandshakeQuestion::HostKey(_) => HandshakeAnswer::HostKey(true),
                HandshakeQuestion::Passphrase(q) => {
                    HandshakeAnswer::Secret(Answer::Present(format!("pp:{}", q.key_path)))
                }
                HandshakeQuestion::Password(_) => {
                    HandshakeAnswer::Secret(Answer::Present("hunter2".to_string()))
                }
                HandshakeQuestion::Challenge(q) => HandshakeAnswer::Challenge(Answer::Present(
                    q.prompts.iter().map(|p| p.text.to_uppercase()).collect(),
                )),
                HandshakeQuestion::SetLastSuccessful(_) => HandshakeAnswer::Ack,
                HandshakeQuestion::GetLastSuccessful { .. } => {
                    HandshakeAnswer::LastSuccessful("password".to_string())
                }
            };
            let _ = request.reply.send(answer);
        }
    });
    Arc::new(handler)
}

async fn bridge_for(
    host: &Host,
    handler: Arc<dyn PromptHandler>,
) -> Bridge<impl Fn(&str) -> Option<String>> {
    let token = host.broker.register(handler);
    let vars: HashMap<&'static str, String> = host
        .broker
        .environment(token)
        .await
        .unwrap()
        .vars()
        .into_iter()
        .collect();
    Bridge::new(Messages::builtin().unwrap(), move |name| vars.get(name).cloned()).unwrap()
}

#[tokio::test]
async fn password_prompt_is_answered() {
    let host = host();
    let bridge = bridge_for(&host, agreeable_handler()).await;
    let outcome = bridge.prompt("alice@example.com's password: ").await.unwrap();
    assert_eq!(outcome, Outcome::Answer("hunter2".to_string()));
}

#[tokio::test]
async fn passphrase_prompt_carries_key_path() {
    let host = host();
    let bridge = bridge_for(&host, agreeable_handler()).await;
    let outcome = bridge
        .prompt("Enter passphrase for key '/home/alice/.ssh/id_rsa': ")
        .await
        .unwrap();
    assert_eq!(
        outcome,
        Outcome::Answer("pp:/home/alice/.ssh/id_rsa".to_string())
    );
}

#[tokio::test]
async fn host_key_prompt_accepted_prints_yes() {
    let host = host();
    let bridge = bridge_for(&host, agreeable_handler()).await;
    let outcome = bridge
        .prompt(
            "The authenticity of host 'example.com (10.0.0.1)' can't be established.\n\
             ED25519 key fingerprint is SHA256:abcdef.\n\
             Are you sure you want to continue connecting (yes/no/[fingerprint])? ",
        )
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Answer("yes".to_string()));
}

#[tokio::test]
async fn rejecting_host_declines_everything() {
    let host = host();
    let bridge = bridge_for(&host, Arc::new(RejectingHandler::new())).await;

    let outcome = bridge.prompt("Password: ").await.unwrap();
    assert!(matches!(outcome, Outcome::Declined(_)));

    let outcome = bridge
        .run(Mode::VerifyHostKey {
            host: "example.com".to_string(),
            port: 22,
            algorithm: "ssh-rsa".to_string(),
            key: "AA:BB".to_string(),
            changed: false,
        })
        .await
        .unwrap();
    assert_eq!(
        outcome,
        Outcome::Declined("gitssh: host key for example.com was not accepted".to_string())
    );
}

#[tokio::test]
async fn unknown_prompt_becomes_a_challenge() {
    let host = host();
    let bridge = bridge_for(&host, agreeable_handler()).await;
    let outcome = bridge.prompt("Verification code: ").await.unwrap();
    assert_eq!(outcome, Outcome::Answer("VERIFICATION CODE: ".to_string()));
}

#[tokio::test]
async fn challenge_mode_prints_one_answer_per_line() {
    let host = host();
    let bridge = bridge_for(&host, agreeable_handler()).await;
    let outcome = bridge
        .run(Mode::Challenge {
            user: "alice".to_string(),
            name: String::new(),
            instruction: String::new(),
            prompts: vec!["a".to_string(), "b".to_string()],
            echo: vec![true],
            last_error: String::new(),
        })
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Answer("A\nB".to_string()));
}

#[tokio::test]
async fn last_successful_modes() {
    let host = host();
    let bridge = bridge_for(&host, Arc::new(RejectingHandler::new())).await;
    let set = bridge
        .run(Mode::LastSuccessful {
            action: LastSuccessfulAction::Set {
                user: "alice".to_string(),
                method: "publickey".to_string(),
                error: String::new(),
            },
        })
        .await
        .unwrap();
    assert_eq!(set, Outcome::Done);

    let get = bridge
        .run(Mode::LastSuccessful {
            action: LastSuccessfulAction::Get {
                user: "alice".to_string(),
            },
        })
        .await
        .unwrap();
    assert_eq!(get, Outcome::Answer("publickey".to_string()));
}

#[tokio::test]
async fn known_key_needs_no_host_process() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("known_hosts");
    std::fs::write(&file, format!("example.com ssh-ed25519 {KEY}\n")).unwrap();

    // No environment at all: any remote call would fail.
    let bridge = Bridge::new(Messages::builtin().unwrap(), |_| None).unwrap();
    let outcome = bridge
        .run(Mode::KnownHosts {
            host: "example.com".to_string(),
            port: 22,
            key_type: "ssh-ed25519".to_string(),
            key: KEY.to_string(),
            files: vec![file],
        })
        .await
        .unwrap();
    assert_eq!(
        outcome,
        Outcome::Answer(format!("example.com ssh-ed25519 {KEY}"))
    );
}

#[tokio::test]
async fn new_key_is_asked_and_printed_when_accepted() {
    let host = host();
    let bridge = bridge_for(&host, agreeable_handler()).await;
    let dir = tempfile::tempdir().unwrap();
    let outcome = bridge
        .run(Mode::KnownHosts {
            host: "git.example.com".to_string(),
            port: 2222,
            key_type: "ssh-ed25519".to_string(),
            key: KEY.to_string(),
            files: vec![dir.path().join("known_hosts")],
        })
        .await
        .unwrap();
    assert_eq!(
        outcome,
        Outcome::Answer(known_hosts::known_hosts_line(
            "git.example.com",
            2222,
            "ssh-ed25519",
            KEY
        ))
    );
}

#[tokio::test]
async fn missing_environment_is_not_configured() {
    let bridge = Bridge::new(Messages::builtin().unwrap(), |_| None).unwrap();
    let err = bridge.prompt("Password: ").await.unwrap_err();
    assert!(err.is_not_configured());
    assert!(bridge.describe_error(&err).starts_with("gitssh: not started by a gitssh host"));
}

#[tokio::test]
async fn unregistered_token_is_an_rpc_failure() {
    let host = host();
    let token = host.broker.register(Arc::new(RejectingHandler::new()));
    let vars: HashMap<&'static str, String> = host
        .broker
        .environment(token)
        .await
        .unwrap()
        .vars()
        .into_iter()
        .collect();
    host.broker.unregister(token).unwrap();

    let bridge =
        Bridge::new(Messages::builtin().unwrap(), move |name| vars.get(name).cloned()).unwrap();
    let err = bridge.prompt("Password: ").await.unwrap_err();
    assert!(matches!(err, AskpassError::Rpc { status, .. } if status.code() == tonic::Code::NotFound));
}

#[tokio::test]
async fn notification_prompts_need_no_answer() {
    let bridge = Bridge::new(Messages::builtin().unwrap(), |name| {
        (name == "SSH_ASKPASS_PROMPT").then(|| "none".to_string())
    })
    .unwrap();
    let outcome = bridge.prompt("Confirm user presence for key").await.unwrap();
    assert_eq!(outcome, Outcome::Done);
}
