//! Error types for document assembly and extraction.

use thiserror::Error;

/// Errors from assembling or picking apart an archive document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArchiveError {
    /// The signer-reported to-be-signed digest does not match the
    /// digest recomputed from the resources being embedded.
    #[error("detached signature digest does not match the assembled payload")]
    SignatureDigestMismatch,

    /// No element with the requested id exists in the document.
    #[error("no embedded block with id \"{0}\"")]
    BlockNotFound(String),

    /// An embedded block exists but its framing is damaged.
    #[error("embedded block \"{0}\" has malformed framing")]
    MalformedBlock(String),
}
