//! Answers to handshake questions and their wire encoding.
//!
//! The RPC transport has no null: proto3 strings and sequences always carry a
//! value. Business logic works with [`Answer`]; only the functions in this
//! module know about the sentinel strings.
//!
//! | answer | wire |
//! |---|---|
//! | absent scalar | `"-"` |
//! | present scalar `v` | `"+" + v` |
//! | absent sequence | empty sequence |
//! | boolean | native |

use crate::error::{Error, Result};

/// Marker for an absent scalar answer.
pub const ABSENT_MARKER: char = '-';

/// Marker prefixed to a present scalar answer.
pub const PRESENT_MARKER: char = '+';

/// Answer to a question: either nothing (declined or cancelled) or a value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Answer<T> {
    /// No answer. A normal outcome, not an error.
    #[default]
    Absent,
    /// The value the user supplied.
    Present(T),
}

impl<T> Answer<T> {
    pub const fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }

    pub const fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Absent => None,
            Self::Present(value) => Some(value),
        }
    }

    pub const fn as_ref(&self) -> Answer<&T> {
        match self {
            Self::Absent => Answer::Absent,
            Self::Present(value) => Answer::Present(value),
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Answer<U> {
        match self {
            Self::Absent => Answer::Absent,
            Self::Present(value) => Answer::Present(f(value)),
        }
    }
}

impl<T> From<Option<T>> for Answer<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Absent, Self::Present)
    }
}

impl<T> From<Answer<T>> for Option<T> {
    fn from(value: Answer<T>) -> Self {
        value.into_option()
    }
}

/// Encode a scalar answer for the wire.
pub fn encode_scalar(answer: Answer<&str>) -> String {
    match answer {
        Answer::Absent => ABSENT_MARKER.to_string(),
        Answer::Present(value) => {
            let mut encoded = String::with_capacity(value.len() + 1);
            encoded.push(PRESENT_MARKER);
            encoded.push_str(value);
            encoded
        }
    }
}

/// Decode a scalar answer received from the wire.
///
/// Only the first character is a marker; the rest is the value verbatim, so
/// values that themselves start with `+` or `-` survive.
pub fn decode_scalar(encoded: &str) -> Result<Answer<String>> {
    if let Some(value) = encoded.strip_prefix(PRESENT_MARKER) {
        Ok(Answer::Present(value.to_string()))
    } else if encoded.len() == ABSENT_MARKER.len_utf8() && encoded.starts_with(ABSENT_MARKER) {
        Ok(Answer::Absent)
    } else {
        Err(Error::MalformedAnswer(encoded.to_string()))
    }
}

/// Encode a sequence answer for the wire. Absence becomes an empty sequence.
pub fn encode_sequence(answer: Answer<Vec<String>>) -> Vec<String> {
    answer.into_option().unwrap_or_default()
}

/// Decode a sequence answer received from the wire.
///
/// An empty sequence decodes as absent, so a present-but-empty batch (the
/// answer to zero prompts) is indistinguishable from no answer.
pub fn decode_sequence(encoded: Vec<String>) -> Answer<Vec<String>> {
    if encoded.is_empty() {
        Answer::Absent
    } else {
        Answer::Present(encoded)
    }
}
