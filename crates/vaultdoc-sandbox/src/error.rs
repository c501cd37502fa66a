//! Error types for the isolated execution host.

use thiserror::Error;

/// Errors crossing or raised at the isolation boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SandboxError {
    /// Entrypoint name is not in the session's dispatch table.
    ///
    /// Raised on the caller's side, before anything crosses the
    /// boundary.
    #[error("unknown entrypoint: {0}")]
    UnknownEntrypoint(String),

    /// A capability name is not in the session's grant map.
    #[error("unknown capability: {0}")]
    UnknownCapability(String),

    /// A key handle does not resolve in this session's cache.
    ///
    /// Handles are session-scoped; presenting a handle minted by a
    /// different session fails here.
    #[error("unknown key handle")]
    UnknownHandle,

    /// The session was shut down before or while the call completed.
    #[error("session terminated")]
    Cancelled,

    /// A value failed to serialize across the boundary.
    #[error("boundary transfer failed: {0}")]
    Transport(String),

    /// An argument had the wrong type, arity or shape.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Failure inside an entrypoint, reduced to its message text.
    ///
    /// Structured error values never cross the boundary; the caller
    /// only sees this string.
    #[error("{0}")]
    Entrypoint(String),
}
