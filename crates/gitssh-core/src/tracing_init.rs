//! Shared tracing/logging initialization.
//!
//! Both gitssh-broker and gitssh-askpass use the same pattern for setting up
//! `tracing_subscriber` with an env-filter and optional JSON output. Logs go
//! to stderr: the askpass bridge answers on stdout, and the broker shares its
//! stdout with the command it wraps.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialise the global tracing subscriber.
///
/// * `default_filter` -- default `RUST_LOG` value when the env-var is not set
///   (e.g. `"gitssh_broker=info"`).
/// * `log_json` -- when `true`, emit structured JSON log lines instead of the
///   human-readable format.
pub fn init_tracing(default_filter: &str, log_json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
    );
    if log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
