//! Handler tokens.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Opaque identifier of a registered prompt handler.
///
/// Always non-negative so it fits the `int32` the RPC carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(i32);

impl Token {
    /// Wrap a raw value, rejecting negatives.
    pub const fn new(raw: i32) -> Option<Self> {
        if raw < 0 { None } else { Some(Self(raw)) }
    }

    pub const fn get(self) -> i32 {
        self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Token {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i32>()
            .ok()
            .and_then(Self::new)
            .ok_or_else(|| Error::InvalidEnv {
                name: crate::env::VAR_HANDLER,
                value: s.to_string(),
            })
    }
}
