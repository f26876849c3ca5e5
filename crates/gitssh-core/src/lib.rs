//! `gitssh` Core Library
//!
//! Shared functionality for the broker and the askpass bridge:
//! - Absent/present answer type and its null-free wire encoding
//! - Environment contract handed to the external SSH client
//! - Configuration resolution and hierarchy
//! - Prompt message resources
//! - Common error types

pub mod answer;
pub mod config;
pub mod env;
pub mod error;
pub mod messages;
pub mod token;
pub mod tracing_init;

pub use answer::Answer;
pub use config::Config;
pub use env::EnvContract;
pub use error::{Error, Result};
pub use messages::Messages;
pub use token::Token;
