//! Error types for the client facade.

use thiserror::Error;

/// Errors surfaced to callers of the facade.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Decryption did not produce a plaintext.
    ///
    /// Deliberately undifferentiated: a wrong password and tampered
    /// ciphertext are indistinguishable to the caller.
    #[error("decryption failed")]
    DecryptFailed,

    /// The envelope could not be parsed before any key work started.
    #[error("malformed envelope: {0}")]
    Envelope(String),

    /// Encryption-side validation failed (empty password, iteration
    /// count out of range, oversized salt).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A session died or the boundary transfer failed.
    #[error("session failure: {0}")]
    Session(String),
}

impl From<vaultdoc_cms::CodecError> for ClientError {
    fn from(e: vaultdoc_cms::CodecError) -> Self {
        Self::Envelope(e.to_string())
    }
}
