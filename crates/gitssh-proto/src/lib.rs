//! gitssh Protocol Buffers
//!
//! Generated protobuf code for the prompt handler RPC that the askpass bridge
//! uses to reach back into the host process.
//!
//! This crate contains:
//! - `GitSshHandler` server and client for the handshake callbacks
//! - Named method constants for logging and diagnostics

#![allow(clippy::derive_partial_eq_without_eq)]

pub mod methods;

/// gitssh v1 API definitions.
pub mod v1 {
    tonic::include_proto!("gitssh.v1");
}

// Re-export v1 as the default API version for convenience
pub use v1::*;
