//! Command-line forms the bridge is invoked with.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "gitssh-askpass")]
#[command(
    version,
    about = "Relays SSH prompts to the gitssh host process",
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    /// Prompt text, when run as `SSH_ASKPASS`.
    #[arg(allow_hyphen_values = true)]
    pub prompt: Option<String>,

    #[command(subcommand)]
    pub mode: Option<Mode>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// `KnownHostsCommand` form: `known-hosts %H %p %t %K`.
    KnownHosts {
        host: String,
        port: u16,
        key_type: String,
        /// Base64 public key blob.
        key: String,

        /// known_hosts files to consult (default: ~/.ssh/known_hosts).
        #[arg(long = "file", env = "GITSSH_KNOWN_HOSTS", value_delimiter = ',')]
        files: Vec<PathBuf>,
    },

    /// Ask whether a host key is trusted.
    VerifyHostKey {
        #[arg(long)]
        host: String,
        #[arg(long, default_value_t = 22)]
        port: u16,
        #[arg(long)]
        algorithm: String,
        /// Key fingerprint.
        #[arg(long)]
        key: String,
        /// The host is known but its key changed.
        #[arg(long)]
        changed: bool,
    },

    /// Ask for a private key passphrase.
    Passphrase {
        #[arg(long, default_value = "")]
        user: String,
        #[arg(long)]
        key_path: String,
        #[arg(long)]
        reset: bool,
        #[arg(long, default_value = "")]
        last_error: String,
    },

    /// Ask for a password.
    Password {
        #[arg(long, default_value = "")]
        user: String,
        #[arg(long)]
        reset: bool,
        #[arg(long, default_value = "")]
        last_error: String,
    },

    /// Answer keyboard-interactive prompts; one answer per output line.
    Challenge {
        #[arg(long, default_value = "")]
        user: String,
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long, default_value = "")]
        instruction: String,
        #[arg(long = "prompt")]
        prompts: Vec<String>,
        /// Echo flag per prompt (`true,false,...`); missing flags mean hidden.
        #[arg(long, value_delimiter = ',')]
        echo: Vec<bool>,
        #[arg(long, default_value = "")]
        last_error: String,
    },

    /// Query or record the last authentication method used.
    LastSuccessful {
        #[command(subcommand)]
        action: LastSuccessfulAction,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum LastSuccessfulAction {
    Get {
        #[arg(long)]
        user: String,
    },
    Set {
        #[arg(long)]
        user: String,
        #[arg(long)]
        method: String,
        #[arg(long, default_value = "")]
        error: String,
    },
}
