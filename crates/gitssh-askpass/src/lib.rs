//! gitssh Askpass Library
//!
//! The program an external SSH client runs instead of prompting the user:
//! - Recognises free-text OpenSSH askpass prompts
//! - Checks host keys against local `known_hosts` files
//! - Relays questions to the host process and prints the answers

pub mod bridge;
pub mod classify;
pub mod cli;
pub mod client;
pub mod error;
pub mod known_hosts;

pub use bridge::{Bridge, Outcome};
pub use error::AskpassError;
