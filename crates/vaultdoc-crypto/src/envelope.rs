//! Two-layer AES-256-GCM envelope construction.
//!
//! Each envelope wraps a fresh content-encryption key (CEK) under the
//! password-derived KEK, then encrypts the payload under the CEK. Both
//! layers use AES-256-GCM with independent random 96-bit nonces. The
//! salt and iteration count live in the key-derivation layer; this
//! module only produces and consumes the two ciphertext fields of the
//! wire envelope.
//!
//! # Security
//!
//! Decryption failure is deliberately undifferentiated. A wrong
//! password, a corrupted wrapped key and a corrupted payload all
//! surface as [`CryptoError::DecryptFailed`] so the error channel does
//! not act as an oracle.

use zeroize::Zeroize;

use crate::{
    error::CryptoError,
    kdf::{DerivedKey, KeyUsage},
    provider::CryptoProvider,
};

/// Size of the raw content-encryption key wrapped in the PWRI layer.
const CEK_SIZE: usize = 32;

/// Nonce size shared by both GCM layers.
const NONCE_SIZE: usize = 12;

/// Cryptographic fields of one envelope, ready for wire encoding.
///
/// Salt and iteration count are intentionally absent: they belong to
/// key derivation and are shared when two envelopes use the same KEK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeFields {
    /// Nonce for the key-wrapping layer.
    pub nonce_pwri: [u8; NONCE_SIZE],
    /// CEK encrypted under the KEK, tag appended.
    pub encrypted_key: Vec<u8>,
    /// Nonce for the content layer.
    pub nonce_content: [u8; NONCE_SIZE],
    /// Payload encrypted under the CEK, tag appended.
    pub encrypted_content: Vec<u8>,
}

/// Encrypt `plaintext` under a fresh CEK, wrapping the CEK with `kek`.
///
/// # Errors
///
/// [`CryptoError::WrongKeyUsage`] when `kek` is not scoped to
/// encryption.
pub fn encrypt_envelope(
    provider: &dyn CryptoProvider,
    kek: &DerivedKey,
    plaintext: &[u8],
) -> Result<EnvelopeFields, CryptoError> {
    if kek.usage() != KeyUsage::Encrypt {
        return Err(CryptoError::WrongKeyUsage { operation: "encrypt" });
    }

    let mut cek = [0u8; CEK_SIZE];
    provider.random_bytes(&mut cek);

    let mut nonce_pwri = [0u8; NONCE_SIZE];
    provider.random_bytes(&mut nonce_pwri);
    let mut nonce_content = [0u8; NONCE_SIZE];
    provider.random_bytes(&mut nonce_content);

    let encrypted_key = provider.aes_gcm_encrypt(kek.material(), &nonce_pwri, &cek);
    let encrypted_content = provider.aes_gcm_encrypt(&cek, &nonce_content, plaintext);
    cek.zeroize();

    Ok(EnvelopeFields { nonce_pwri, encrypted_key, nonce_content, encrypted_content })
}

/// Unwrap the CEK with `kek` and decrypt the payload.
///
/// # Errors
///
/// - [`CryptoError::WrongKeyUsage`] when `kek` is not scoped to
///   decryption
/// - [`CryptoError::DecryptFailed`] for any cryptographic failure in
///   either layer, including a recovered CEK of the wrong length
pub fn decrypt_envelope(
    provider: &dyn CryptoProvider,
    kek: &DerivedKey,
    fields: &EnvelopeFields,
) -> Result<Vec<u8>, CryptoError> {
    if kek.usage() != KeyUsage::Decrypt {
        return Err(CryptoError::WrongKeyUsage { operation: "decrypt" });
    }

    let mut raw_cek = provider.aes_gcm_decrypt(kek.material(), &fields.nonce_pwri, &fields.encrypted_key)?;
    if raw_cek.len() != CEK_SIZE {
        raw_cek.zeroize();
        return Err(CryptoError::DecryptFailed);
    }
    let mut cek = [0u8; CEK_SIZE];
    cek.copy_from_slice(&raw_cek);
    raw_cek.zeroize();

    let plaintext = provider.aes_gcm_decrypt(&cek, &fields.nonce_content, &fields.encrypted_content);
    cek.zeroize();
    plaintext
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{kdf::derive_key, provider::OsCryptoProvider};

    fn key_pair(password: &str) -> (DerivedKey, DerivedKey) {
        let salt = [3u8; 32];
        let (enc, _) =
            derive_key(&OsCryptoProvider, password, 100, KeyUsage::Encrypt, Some(&salt)).unwrap();
        let (dec, _) =
            derive_key(&OsCryptoProvider, password, 100, KeyUsage::Decrypt, Some(&salt)).unwrap();
        (enc, dec)
    }

    #[test]
    fn round_trip() {
        let (enc, dec) = key_pair("pw");
        let fields = encrypt_envelope(&OsCryptoProvider, &enc, b"payload").unwrap();
        let plaintext = decrypt_envelope(&OsCryptoProvider, &dec, &fields).unwrap();
        assert_eq!(plaintext, b"payload");
    }

    #[test]
    fn empty_payload_round_trip() {
        let (enc, dec) = key_pair("pw");
        let fields = encrypt_envelope(&OsCryptoProvider, &enc, b"").unwrap();
        // GCM of an empty plaintext is just the 16-byte tag.
        assert_eq!(fields.encrypted_content.len(), 16);
        assert_eq!(decrypt_envelope(&OsCryptoProvider, &dec, &fields).unwrap(), b"");
    }

    #[test]
    fn wrapped_key_carries_tag_overhead() {
        let (enc, _) = key_pair("pw");
        let fields = encrypt_envelope(&OsCryptoProvider, &enc, b"x").unwrap();
        assert_eq!(fields.encrypted_key.len(), CEK_SIZE + 16);
    }

    #[test]
    fn wrong_password_is_decrypt_failed() {
        let (enc, _) = key_pair("pw");
        let (_, wrong) = key_pair("other");
        let fields = encrypt_envelope(&OsCryptoProvider, &enc, b"payload").unwrap();
        let result = decrypt_envelope(&OsCryptoProvider, &wrong, &fields);
        assert!(matches!(result, Err(CryptoError::DecryptFailed)));
    }

    #[test]
    fn tampered_key_and_tampered_content_fail_identically() {
        let (enc, dec) = key_pair("pw");
        let fields = encrypt_envelope(&OsCryptoProvider, &enc, b"payload").unwrap();

        let mut bad_key = fields.clone();
        bad_key.encrypted_key[0] ^= 0x01;
        let key_err = decrypt_envelope(&OsCryptoProvider, &dec, &bad_key).unwrap_err();

        let mut bad_content = fields.clone();
        bad_content.encrypted_content[0] ^= 0x01;
        let content_err = decrypt_envelope(&OsCryptoProvider, &dec, &bad_content).unwrap_err();

        assert_eq!(key_err.to_string(), content_err.to_string());
    }

    #[test]
    fn encrypt_with_decrypt_key_rejected() {
        let (_, dec) = key_pair("pw");
        let result = encrypt_envelope(&OsCryptoProvider, &dec, b"payload");
        assert!(matches!(result, Err(CryptoError::WrongKeyUsage { operation: "encrypt" })));
    }

    #[test]
    fn decrypt_with_encrypt_key_rejected() {
        let (enc, _) = key_pair("pw");
        let fields = encrypt_envelope(&OsCryptoProvider, &enc, b"payload").unwrap();
        let result = decrypt_envelope(&OsCryptoProvider, &enc, &fields);
        assert!(matches!(result, Err(CryptoError::WrongKeyUsage { operation: "decrypt" })));
    }

    #[test]
    fn fresh_randomness_per_envelope() {
        let (enc, _) = key_pair("pw");
        let a = encrypt_envelope(&OsCryptoProvider, &enc, b"payload").unwrap();
        let b = encrypt_envelope(&OsCryptoProvider, &enc, b"payload").unwrap();
        assert_ne!(a.nonce_pwri, b.nonce_pwri);
        assert_ne!(a.nonce_content, b.nonce_content);
        assert_ne!(a.encrypted_key, b.encrypted_key);
        assert_ne!(a.encrypted_content, b.encrypted_content);
    }
}
