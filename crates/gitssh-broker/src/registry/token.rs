//! Random token allocation.

use gitssh_core::Token;
use rand::RngExt;

type Source = Box<dyn FnMut() -> i32 + Send>;

/// Draws random non-negative tokens that are not currently in use.
///
/// Tokens are random rather than sequential so that a confused or hostile
/// child process cannot guess the token of another session.
pub struct TokenAllocator {
    source: Source,
}

impl TokenAllocator {
    /// Allocator backed by the thread-local RNG.
    pub fn new() -> Self {
        Self::with_source(|| rand::rng().random::<i32>())
    }

    /// Allocator drawing candidates from `source` (deterministic in tests).
    pub fn with_source<F>(source: F) -> Self
    where
        F: FnMut() -> i32 + Send + 'static,
    {
        Self {
            source: Box::new(source),
        }
    }

    /// Draw candidates until one is not `in_use`.
    ///
    /// `i32::MIN` is redrawn because its magnitude does not fit an `i32`.
    /// No retry bound: registries hold a handful of live tokens.
    pub fn allocate<F>(&mut self, in_use: F) -> Token
    where
        F: Fn(Token) -> bool,
    {
        loop {
            let candidate = (self.source)();
            if candidate == i32::MIN {
                continue;
            }
            let Some(token) = Token::new(candidate.abs()) else {
                continue;
            };
            if !in_use(token) {
                return token;
            }
        }
    }
}

impl Default for TokenAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TokenAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAllocator").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn scripted(values: Vec<i32>) -> TokenAllocator {
        let mut iter = values.into_iter();
        TokenAllocator::with_source(move || iter.next().unwrap_or(1))
    }

    #[test]
    fn min_value_is_redrawn() {
        let mut allocator = scripted(vec![i32::MIN, -12]);
        assert_eq!(allocator.allocate(|_| false).get(), 12);
    }

    #[test]
    fn negative_candidates_take_their_magnitude() {
        let mut allocator = scripted(vec![-i32::MAX]);
        assert_eq!(allocator.allocate(|_| false).get(), i32::MAX);
    }

    #[test]
    fn collisions_are_redrawn() {
        let taken: HashSet<i32> = [5, 9].into_iter().collect();
        let mut allocator = scripted(vec![5, -9, 9, 31]);
        let token = allocator.allocate(|t| taken.contains(&t.get()));
        assert_eq!(token.get(), 31);
    }

    #[test]
    fn random_tokens_are_non_negative() {
        let mut allocator = TokenAllocator::new();
        for _ in 0..1000 {
            assert!(allocator.allocate(|_| false).get() >= 0);
        }
    }
}
