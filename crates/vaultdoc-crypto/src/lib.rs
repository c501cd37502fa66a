//! Vaultdoc Cryptographic Primitives
//!
//! Password-based key derivation and the dual-envelope cipher that
//! protects a file's content and its name as two independent secrets.
//!
//! # Key Lifecycle
//!
//! ```text
//! Password + Salt + Iterations
//!        │
//!        ▼
//! PBKDF2-HMAC-SHA-256 → KEK (usage-scoped, non-extractable)
//!        │
//!        ▼
//! AES-256-GCM key wrap → wrapped CEK        (fresh random CEK)
//!        │                                        │
//!        ▼                                        ▼
//! key-wrap envelope field            AES-256-GCM → ciphertext
//! ```
//!
//! Each envelope carries a fresh content-encryption key and two
//! independent 96-bit nonces. The file-name envelope reuses the same
//! password derivation (same salt and iteration count) but its CEK and
//! nonces are generated independently.
//!
//! # Security
//!
//! Usage scoping:
//! - A derived KEK is scoped to exactly one of encrypt or decrypt,
//!   never both, limiting the blast radius of a leaked key handle.
//! - Key material is zeroized on drop and never exposed by reference
//!   outside this crate's provider seam.
//!
//! Oracle resistance:
//! - Every AEAD authentication failure maps to the single
//!   [`CryptoError::DecryptFailed`] class: wrong password and tampered
//!   ciphertext are indistinguishable to a caller.
//!
//! All functions take the platform provider as an explicit argument;
//! nothing here reaches for ambient global state.

pub mod envelope;
pub mod error;
pub mod kdf;
pub mod name;
pub mod provider;

pub use envelope::{EnvelopeFields, decrypt_envelope, encrypt_envelope};
pub use error::CryptoError;
pub use kdf::{DerivedKey, KeyUsage, derive_key};
pub use name::{NAME_BUFFER_SIZE, decode_name, encode_name};
pub use provider::{CryptoProvider, OsCryptoProvider};
