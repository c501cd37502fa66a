//! Error types for key derivation and envelope encryption.

use thiserror::Error;

/// Errors produced by the key-derivation and cipher layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Password was empty (derivation refuses to run on it).
    #[error("invalid or empty password")]
    InvalidPassword,

    /// Iteration count outside `1..=i32::MAX`.
    #[error("invalid iteration count")]
    InvalidIterationCount,

    /// Usage literal was not `encrypt` or `decrypt`.
    #[error("invalid key usage: {0}")]
    InvalidUsage(String),

    /// A key scoped to one usage was presented for the other.
    #[error("key usage violation: key is not scoped for {operation}")]
    WrongKeyUsage {
        /// Operation that was attempted
        operation: &'static str,
    },

    /// AEAD authentication failed.
    ///
    /// Deliberately undifferentiated: a wrong password and a tampered
    /// ciphertext produce this same error so the failure mode cannot be
    /// used as an oracle.
    #[error("decryption failed")]
    DecryptFailed,

    /// Decrypted file-name payload had an unsupported version byte or
    /// a length byte inconsistent with the buffer.
    #[error("malformed file-name payload")]
    NameFormat,
}
