//! `gitssh-broker`
//!
//! Runs a command (typically `git`) with SSH prompts routed back to this
//! process, where they are answered on the terminal.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::process::Command;
use tracing::info;

use gitssh_broker::BrokerService;
use gitssh_broker::handler::{PromptHandler, RejectingHandler, TerminalHandler};
use gitssh_core::config;

#[derive(Parser, Debug)]
#[command(name = "gitssh-broker")]
#[command(version, about = "gitssh broker - answer SSH prompts of child processes")]
struct Args {
    /// Log level filter (e.g. "info", "debug", "warn").
    #[arg(long, env = "GITSSH_LOG_LEVEL")]
    log_level: Option<String>,

    /// Output logs as JSON.
    #[arg(long, env = "GITSSH_LOG_JSON")]
    log_json: bool,

    /// Seconds to wait for an answer before treating a prompt as cancelled
    /// (0 waits forever).
    #[arg(long, env = "GITSSH_PROMPT_TIMEOUT")]
    prompt_timeout: Option<u64>,

    /// Path to the `gitssh-askpass` helper.
    #[arg(long, env = "GITSSH_ASKPASS_BIN")]
    askpass_bin: Option<PathBuf>,

    /// Also verify host keys through OpenSSH's `KnownHostsCommand`.
    #[arg(long)]
    known_hosts_command: bool,

    /// Never prompt: reject host keys and decline every secret.
    #[arg(long)]
    batch: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a command with its SSH prompts answered here.
    Run {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        command: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    let mut config = config::load_config()?.broker;
    if let Some(level) = args.log_level {
        config.log_level = level;
    }
    if let Some(secs) = args.prompt_timeout {
        config.prompt_timeout_secs = secs;
    }
    if args.askpass_bin.is_some() {
        config.askpass_binary = args.askpass_bin;
    }
    config.known_hosts_command |= args.known_hosts_command;

    let log_filter = format!("gitssh_broker={}", config.log_level);
    gitssh_core::tracing_init::init_tracing(&log_filter, args.log_json);

    let Commands::Run { command } = args.command;
    let (program, rest) = command.split_first().context("no command given")?;

    let broker = Arc::new(BrokerService::new(&config)?);
    let handler: Arc<dyn PromptHandler> = if args.batch {
        Arc::new(RejectingHandler::new())
    } else {
        Arc::new(TerminalHandler::new())
    };
    let session = broker.open_session(handler);
    let env = session.environment().await?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = env.port,
        token = %env.token,
        artifact = %env.artifact.display(),
        program = %program,
        "Spawning command"
    );

    let status = Command::new(program)
        .args(rest)
        .envs(env.vars())
        .status()
        .await
        .with_context(|| format!("failed to run {program}"))?;

    session.close()?;
    info!(%status, "Command finished");

    let code = status
        .code()
        .and_then(|c| u8::try_from(c).ok())
        .unwrap_or(1);
    Ok(ExitCode::from(code))
}
