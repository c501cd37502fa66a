//! The six-field encrypted envelope carried by the CMS structure.

/// AES-GCM nonce size in bytes. Both nonces in an envelope are always
/// exactly this long; the codec hard-codes it into the algorithm
/// parameter blocks.
pub const NONCE_SIZE: usize = 12;

/// One independently wrapped secret (file content or file name).
///
/// # Invariants
///
/// - `salt` is at most 127 bytes so its DER length fits one octet.
/// - `iteration_count` is in `1..=i32::MAX` (31-bit cap, never signed).
/// - Both nonces are exactly 12 bytes (enforced by the array type).
/// - The 16-byte AEAD tag is the trailing 16 bytes of `encrypted_key`
///   and `encrypted_content`; the codec treats both as opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// PBKDF2 salt (≤ 127 bytes)
    pub salt: Vec<u8>,
    /// PBKDF2 iteration count (1..=2^31-1)
    pub iteration_count: u32,
    /// Nonce for the key-wrap (PWRI) AES-GCM operation
    pub nonce_pwri: [u8; NONCE_SIZE],
    /// AES-GCM-wrapped content-encryption key (ciphertext + tag)
    pub encrypted_key: Vec<u8>,
    /// Nonce for the content AES-GCM operation
    pub nonce_content: [u8; NONCE_SIZE],
    /// AES-GCM-encrypted content (ciphertext + tag)
    pub encrypted_content: Vec<u8>,
}
