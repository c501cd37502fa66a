//! Password-based key derivation.
//!
//! `derive_key` turns a password, salt and iteration count into a
//! 256-bit AES-GCM key scoped to exactly one usage. Validation happens
//! before any cryptographic work so invalid inputs fail fast.

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{error::CryptoError, provider::CryptoProvider};

/// Length of a generated salt when the caller does not supply one.
pub const GENERATED_SALT_SIZE: usize = 32;

/// Scope of a derived key: exactly one of encrypt or decrypt, never
/// both. Limits the blast radius of a leaked key handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyUsage {
    /// Key may only wrap (encrypt) content-encryption keys.
    Encrypt,
    /// Key may only unwrap (decrypt) content-encryption keys.
    Decrypt,
}

impl KeyUsage {
    /// Parse the usage literal used across the isolation boundary.
    pub fn parse(literal: &str) -> Result<Self, CryptoError> {
        match literal {
            "encrypt" => Ok(Self::Encrypt),
            "decrypt" => Ok(Self::Decrypt),
            other => Err(CryptoError::InvalidUsage(other.to_string())),
        }
    }

    /// Wire literal of this usage.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Encrypt => "encrypt",
            Self::Decrypt => "decrypt",
        }
    }
}

/// A password-derived key-encryption key (KEK).
///
/// Non-extractable by construction: the raw material never leaves the
/// crypto layer and is zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    material: [u8; 32],
    #[zeroize(skip)]
    usage: KeyUsage,
}

impl DerivedKey {
    /// Usage this key is scoped to.
    pub fn usage(&self) -> KeyUsage {
        self.usage
    }

    /// Raw key material, for use by the cipher layer only.
    pub(crate) fn material(&self) -> &[u8; 32] {
        &self.material
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key material is intentionally not printed.
        f.debug_struct("DerivedKey").field("usage", &self.usage).finish_non_exhaustive()
    }
}

/// Derive a usage-scoped KEK from a password.
///
/// When `salt` is absent, 32 cryptographically random bytes are
/// generated. Returns the derived key together with the salt that was
/// actually used, so a fresh salt can be carried into the envelope.
///
/// # Errors
///
/// - [`CryptoError::InvalidPassword`] for an empty password
/// - [`CryptoError::InvalidIterationCount`] for a count outside
///   `1..=i32::MAX` (the 31-bit cap matches the wire codec)
pub fn derive_key(
    provider: &dyn CryptoProvider,
    password: &str,
    iteration_count: u32,
    usage: KeyUsage,
    salt: Option<&[u8]>,
) -> Result<(DerivedKey, Vec<u8>), CryptoError> {
    if password.is_empty() {
        return Err(CryptoError::InvalidPassword);
    }
    if iteration_count == 0 || iteration_count > i32::MAX as u32 {
        return Err(CryptoError::InvalidIterationCount);
    }

    let salt = match salt {
        Some(bytes) => bytes.to_vec(),
        None => {
            let mut generated = vec![0u8; GENERATED_SALT_SIZE];
            provider.random_bytes(&mut generated);
            generated
        },
    };

    let material = provider.pbkdf2_sha256(password.as_bytes(), &salt, iteration_count);
    Ok((DerivedKey { material, usage }, salt))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::provider::OsCryptoProvider;

    #[test]
    fn empty_password_rejected() {
        let result = derive_key(&OsCryptoProvider, "", 1000, KeyUsage::Encrypt, None);
        assert!(matches!(result, Err(CryptoError::InvalidPassword)));
    }

    #[test]
    fn zero_iteration_count_rejected() {
        let result = derive_key(&OsCryptoProvider, "pw", 0, KeyUsage::Encrypt, None);
        assert!(matches!(result, Err(CryptoError::InvalidIterationCount)));
    }

    #[test]
    fn over_31_bit_iteration_count_rejected() {
        let result =
            derive_key(&OsCryptoProvider, "pw", (i32::MAX as u32) + 1, KeyUsage::Encrypt, None);
        assert!(matches!(result, Err(CryptoError::InvalidIterationCount)));
    }

    #[test]
    fn missing_salt_generates_32_bytes() {
        let (_, salt) = derive_key(&OsCryptoProvider, "pw", 10, KeyUsage::Encrypt, None).unwrap();
        assert_eq!(salt.len(), GENERATED_SALT_SIZE);
    }

    #[test]
    fn same_inputs_same_key_different_usage_allowed() {
        let salt = [7u8; 32];
        let (enc, _) =
            derive_key(&OsCryptoProvider, "pw", 10, KeyUsage::Encrypt, Some(&salt)).unwrap();
        let (dec, _) =
            derive_key(&OsCryptoProvider, "pw", 10, KeyUsage::Decrypt, Some(&salt)).unwrap();
        assert_eq!(enc.material(), dec.material());
        assert_ne!(enc.usage(), dec.usage());
    }

    #[test]
    fn usage_literal_round_trip() {
        assert_eq!(KeyUsage::parse("encrypt").unwrap(), KeyUsage::Encrypt);
        assert_eq!(KeyUsage::parse("decrypt").unwrap(), KeyUsage::Decrypt);
        assert!(matches!(KeyUsage::parse("sign"), Err(CryptoError::InvalidUsage(_))));
        assert_eq!(KeyUsage::Encrypt.as_str(), "encrypt");
    }

    #[test]
    fn debug_does_not_leak_material() {
        let (key, _) = derive_key(&OsCryptoProvider, "pw", 10, KeyUsage::Encrypt, None).unwrap();
        let rendered = format!("{key:?}");
        assert!(!rendered.contains("material"));
    }
}
