//! `gitssh-askpass`
//!
//! Exit status 0 with the answer on stdout, or 1 with nothing on stdout.
//! Logging goes to stderr and only when `GITSSH_LOG` is set.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::warn;

use gitssh_askpass::cli::Cli;
use gitssh_askpass::{Bridge, Outcome};
use gitssh_core::env::{VAR_LOG, VAR_RESOURCES};
use gitssh_core::messages::{self, Messages};

fn load_messages() -> anyhow::Result<Messages> {
    let lang = ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
        .and_then(|locale| messages::language_of(&locale));
    match std::env::var_os(VAR_RESOURCES) {
        Some(dir) => Ok(Messages::load(&PathBuf::from(dir), lang.as_deref())?),
        None => Ok(Messages::builtin()?),
    }
}

#[tokio::main(flavor = "current_thread")]
#[allow(clippy::print_stdout, clippy::print_stderr)]
async fn main() -> ExitCode {
    if let Ok(filter) = std::env::var(VAR_LOG) {
        gitssh_core::tracing_init::init_tracing(&filter, false);
    }

    let cli = Cli::parse();

    let messages = match load_messages() {
        Ok(messages) => messages,
        Err(e) => {
            eprintln!("gitssh: {e}");
            return ExitCode::FAILURE;
        }
    };
    let bridge = match Bridge::new(messages, |name| std::env::var(name).ok()) {
        Ok(bridge) => bridge,
        Err(e) => {
            eprintln!("gitssh: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.mode {
        Some(mode) => bridge.run(mode).await,
        None => bridge.prompt(cli.prompt.as_deref().unwrap_or_default()).await,
    };

    match result {
        Ok(Outcome::Answer(answer)) => {
            println!("{answer}");
            ExitCode::SUCCESS
        }
        Ok(Outcome::Done) => ExitCode::SUCCESS,
        Ok(Outcome::Declined(message)) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
        Err(e) => {
            warn!(error = %e, "Askpass failed");
            eprintln!("{}", bridge.describe_error(&e));
            ExitCode::FAILURE
        }
    }
}
