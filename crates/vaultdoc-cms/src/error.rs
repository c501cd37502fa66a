//! Error types for the CMS codec.
//!
//! Structural mismatches are fatal with no recovery: the decoder names
//! the byte class it expected and the offset where the input diverged.

use thiserror::Error;

/// Errors produced while encoding or decoding the fixed CMS profile.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// A fixed byte region did not match the expected constant.
    #[error("structural mismatch at offset {offset}: expected {expected}")]
    Structural {
        /// Byte class that was expected (tag or algorithm identifier)
        expected: &'static str,
        /// Offset into the input where the mismatch occurred
        offset: usize,
    },

    /// Input ended before the structure was complete.
    #[error("truncated structure: ran out of bytes reading {what}")]
    Truncated {
        /// Field that could not be read
        what: &'static str,
    },

    /// A length prefix was malformed or would overflow.
    #[error("invalid length prefix at offset {offset}")]
    InvalidLength {
        /// Offset of the offending length octet
        offset: usize,
    },

    /// Salt longer than the one-byte DER length form allows.
    #[error("salt too long: {len} bytes (maximum 127)")]
    SaltTooLong {
        /// Actual salt length
        len: usize,
    },

    /// Iteration count outside `1..=i32::MAX`.
    ///
    /// The 31-bit cap is part of the profile: the decoder rejects any
    /// INTEGER that carries a sign bit or needs more than 31 bits, and
    /// the encoder enforces the same bound symmetrically.
    #[error("iteration count out of range (must be 1..=2^31-1)")]
    IterationOutOfRange,

    /// PEM begin/end markers were missing or out of order.
    #[error("PEM framing error: {0}")]
    Pem(&'static str),

    /// The PEM body did not decode as base64.
    #[error("invalid base64 in PEM body: {0}")]
    Base64(#[from] base64::DecodeError),
}
