//! Failure taxonomy.
//!
//! A routing miss is not an error — dispatch synthesizes a 404 for it. This
//! type covers everything that *is* one: rejected route patterns at
//! registration time, malformed request framing, and the failures handlers
//! and middleware raise during chain execution.
//!
//! The [`ExceptionHandler`](crate::ExceptionHandler) turns the handler-raised
//! variants into terminal responses; [`Error::status`] is the mapping it uses.

use thiserror::Error;

/// The error type for pilum's fallible operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A route pattern that cannot be compiled: a non-final `*` segment or a
    /// duplicate variable name. Raised at registration, never at dispatch.
    #[error("invalid route pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Malformed or missing request framing, e.g. `multipart()` called on a
    /// request that is not `multipart/form-data` or lacks a boundary. Fails
    /// fast before any parsing proceeds.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A client-input failure raised by handler or middleware logic.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A permission failure raised by handler or middleware logic.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// I/O failure while reading the request body or serving a connection.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Anything a handler raises that fits no other class. Maps to 500; the
    /// message is logged, never sent to the client.
    #[error("internal: {0}")]
    Internal(String),
}

impl Error {
    /// The response status this failure class maps to.
    ///
    /// `InvalidRequest` and `BadRequest` are both client-input classes (400);
    /// `Forbidden` is the permission class (403); everything else is an
    /// unclassified server failure (500).
    pub fn status(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) | Self::BadRequest(_) => 400,
            Self::Forbidden(_) => 403,
            _ => 500,
        }
    }
}
