//! Error types for the relay
//!
//! Defines the error taxonomy reported to clients plus the fatal
//! transport failure that ends a single connection.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

use crate::codec::DecodeError;

/// Relay errors
///
/// `Io` is fatal to the connection it occurred on. Every other variant is
/// reported back to the offending session as an `error:` frame and the
/// session keeps running.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Transport read/write failure (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parameter token could not be decoded
    #[error("undecodable parameter: {0}")]
    Decode(#[from] DecodeError),

    /// Malformed command
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Session tried to pick a name twice
    #[error("name already set for this session")]
    Forbidden,

    /// Another live session holds the requested name
    #[error("name '{0}' is already in use")]
    DuplicateName(String),

    /// Catch-all, e.g. a session that vanished from the registry mid-dispatch
    #[error("unknown error")]
    Unknown,
}

impl RelayError {
    /// Shorthand for a `BadRequest` with the given reason
    pub fn bad_request(reason: impl Into<String>) -> Self {
        Self::BadRequest(reason.into())
    }

    /// Whether this error ends the connection instead of being reported
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}
