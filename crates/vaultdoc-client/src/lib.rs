//! Client facade over the Vaultdoc session host.
//!
//! Establishes the crypto host and cipher sessions, drives the
//! encrypt/decrypt entrypoints, and frames envelopes as PEM text ready
//! for embedding in an archive document:
//!
//! ```text
//!   plaintext + password ──► Client::encrypt_to_pem ──► two PEM blocks
//!   two PEM blocks + password ──► Client::decrypt_from_pem ──► plaintext + name
//! ```
//!
//! Wrong-password and tampered-ciphertext failures are reported as the
//! same [`ClientError::DecryptFailed`].

pub mod client;
pub mod error;

pub use client::Client;
pub use error::ClientError;
