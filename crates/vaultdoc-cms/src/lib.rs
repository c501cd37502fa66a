//! Vaultdoc CMS Codec
//!
//! Byte-exact codec for the single CMS enveloped-data profile used by
//! Vaultdoc archives: one password-based recipient (PBKDF2-HMAC-SHA-256
//! derived KEK wrapping an AES-256-GCM CEK) plus one AES-256-GCM
//! encrypted content block. This is NOT a general ASN.1 library: the
//! encoder emits exactly one structure and the decoder accepts exactly
//! that structure, comparing every fixed byte region against a constant
//! table and aborting on the first mismatch.
//!
//! ```text
//! SEQUENCE
//!   OID pkcs7-envelopedData
//!   [0] EnvelopedData
//!     INTEGER 3
//!     SET
//!       [3] PasswordRecipientInfo
//!         INTEGER 0
//!         [0] PBKDF2 { salt, iterationCount, hmacWithSHA256 }
//!         SEQUENCE id-alg-PWRI-KEK { aes-256-gcm, nonce, ICVlen 16 }
//!         OCTET STRING encryptedKey
//!     SEQUENCE EncryptedContentInfo
//!       OID pkcs7-data
//!       SEQUENCE { aes-256-gcm, nonce, ICVlen 16 }
//!       [0] encryptedContent
//! ```
//!
//! The crate also provides the PEM framing (`-----BEGIN CMS-----`,
//! base64 at 64 columns, CRLF line endings) used to embed encoded
//! envelopes in the final archive document.

pub mod codec;
pub mod envelope;
pub mod error;
pub mod pem;

pub use codec::{decode, encode};
pub use envelope::{Envelope, NONCE_SIZE};
pub use error::CodecError;
pub use pem::{der_to_pem, pem_to_der};

/// Convenience alias for codec results.
pub type Result<T> = std::result::Result<T, CodecError>;
