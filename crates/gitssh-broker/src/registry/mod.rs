//! Handler registry keyed by unguessable tokens.
//!
//! Handlers are registered by whatever thread drives a child process's
//! lifecycle and looked up by the endpoint's request tasks; one lock guards
//! allocation, insertion, lookup and removal.

mod handlers;
mod token;

pub use handlers::{HandlerRegistry, ResolvedHandler};
pub use token::TokenAllocator;
