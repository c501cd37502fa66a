//! Platform cryptographic provider seam.
//!
//! The core never implements primitives itself: PBKDF2, AES-GCM and
//! the random source are supplied through this trait and injected into
//! the execution host as capabilities. [`OsCryptoProvider`] is the
//! production implementation backed by the RustCrypto crates.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use rand::RngCore;
use sha2::Sha256;

use crate::error::CryptoError;

/// Cryptographic primitives required by the envelope cipher.
///
/// Implementations must be safe to share across sessions; every method
/// is a pure function of its inputs apart from `random_bytes`.
pub trait CryptoProvider: Send + Sync {
    /// Fill `buf` with cryptographically secure random bytes.
    fn random_bytes(&self, buf: &mut [u8]);

    /// PBKDF2-HMAC-SHA-256 over `iterations` rounds, producing a
    /// 256-bit key.
    fn pbkdf2_sha256(&self, password: &[u8], salt: &[u8], iterations: u32) -> [u8; 32];

    /// AES-256-GCM encryption with a 128-bit tag appended to the
    /// returned ciphertext.
    fn aes_gcm_encrypt(&self, key: &[u8; 32], nonce: &[u8; 12], plaintext: &[u8]) -> Vec<u8>;

    /// AES-256-GCM decryption; the trailing 16 bytes of `ciphertext`
    /// are the authentication tag.
    ///
    /// # Errors
    ///
    /// [`CryptoError::DecryptFailed`] on any authentication failure.
    fn aes_gcm_decrypt(
        &self,
        key: &[u8; 32],
        nonce: &[u8; 12],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, CryptoError>;
}

/// Production provider using the operating system random source and
/// the RustCrypto AES-GCM / PBKDF2 implementations.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsCryptoProvider;

impl CryptoProvider for OsCryptoProvider {
    fn random_bytes(&self, buf: &mut [u8]) {
        rand::rngs::OsRng.fill_bytes(buf);
    }

    fn pbkdf2_sha256(&self, password: &[u8], salt: &[u8], iterations: u32) -> [u8; 32] {
        let mut key = [0u8; 32];
        pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut key);
        key
    }

    fn aes_gcm_encrypt(&self, key: &[u8; 32], nonce: &[u8; 12], plaintext: &[u8]) -> Vec<u8> {
        let cipher = Aes256Gcm::new(key.into());
        let Ok(ciphertext) = cipher.encrypt(Nonce::from_slice(nonce), plaintext) else {
            unreachable!("AES-256-GCM encryption cannot fail with valid inputs");
        };
        ciphertext
    }

    fn aes_gcm_decrypt(
        &self,
        key: &[u8; 32],
        nonce: &[u8; 12],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let cipher = Aes256Gcm::new(key.into());
        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::DecryptFailed)
    }
}
