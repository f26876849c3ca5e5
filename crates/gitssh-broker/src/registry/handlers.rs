//! Token -> handler map.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use gitssh_core::Token;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::token::TokenAllocator;
use crate::error::BrokerError;
use crate::handler::PromptHandler;

struct Registration {
    handler: Arc<dyn PromptHandler>,
    unregistered: CancellationToken,
}

struct Inner {
    allocator: TokenAllocator,
    handlers: HashMap<Token, Registration>,
}

/// A handler resolved for one incoming call.
#[derive(Clone)]
pub struct ResolvedHandler {
    pub token: Token,
    pub handler: Arc<dyn PromptHandler>,
    /// Fires when the token is unregistered, so in-flight calls can stop.
    pub unregistered: CancellationToken,
}

impl std::fmt::Debug for ResolvedHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedHandler")
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

/// Registered prompt handlers keyed by token.
pub struct HandlerRegistry {
    inner: Mutex<Inner>,
}

impl HandlerRegistry {
    /// Create a registry drawing tokens from the thread-local RNG.
    pub fn new() -> Self {
        Self::with_allocator(TokenAllocator::new())
    }

    /// Create a registry with a specific token allocator.
    pub fn with_allocator(allocator: TokenAllocator) -> Self {
        Self {
            inner: Mutex::new(Inner {
                allocator,
                handlers: HashMap::new(),
            }),
        }
    }

    /// Register a handler and return its fresh token.
    ///
    /// Allocation and insertion happen under one lock, so two concurrent
    /// registrations can never be handed the same token.
    pub fn register(&self, handler: Arc<dyn PromptHandler>) -> Token {
        let mut inner = self.lock();
        let Inner {
            allocator,
            handlers,
        } = &mut *inner;
        let token = allocator.allocate(|candidate| handlers.contains_key(&candidate));
        handlers.insert(
            token,
            Registration {
                handler,
                unregistered: CancellationToken::new(),
            },
        );
        info!(%token, live = handlers.len(), "Registered prompt handler");
        token
    }

    /// Resolve the handler for a raw token received from the wire.
    pub fn lookup(&self, raw: i32) -> Result<ResolvedHandler, BrokerError> {
        let token = Token::new(raw).ok_or(BrokerError::UnknownHandler { token: raw })?;
        let inner = self.lock();
        let registration = inner
            .handlers
            .get(&token)
            .ok_or(BrokerError::UnknownHandler { token: raw })?;
        Ok(ResolvedHandler {
            token,
            handler: Arc::clone(&registration.handler),
            unregistered: registration.unregistered.clone(),
        })
    }

    /// Remove a handler. Calls still in flight for it are cancelled.
    pub fn unregister(&self, token: Token) -> Result<(), BrokerError> {
        let registration = self
            .lock()
            .handlers
            .remove(&token)
            .ok_or(BrokerError::UnknownHandler { token: token.get() })?;
        registration.unregistered.cancel();
        debug!(%token, "Unregistered prompt handler");
        Ok(())
    }

    /// Check if a token is registered.
    pub fn contains(&self, token: Token) -> bool {
        self.lock().handlers.contains_key(&token)
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.lock().handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Nothing inside the lock can leave the map half-updated, so a poisoned
    // lock is still usable.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("len", &self.len())
            .finish()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
