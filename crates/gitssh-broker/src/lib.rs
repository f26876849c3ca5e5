//! gitssh Broker Library
//!
//! Host side of the SSH prompt bridge:
//! - Token allocation and the handler registry
//! - Prompt handler trait and built-in handlers
//! - gRPC endpoint dispatching handshake questions to handlers
//! - Bridge artifact generation
//! - `BrokerService` tying them together

pub mod artifact;
pub mod error;
pub mod handler;
pub mod registry;
pub mod server;
pub mod service;

pub use error::BrokerError;
pub use service::{BrokerService, BrokerSession};
