//! Property tests for the envelope and name layers.

use proptest::prelude::*;
use vaultdoc_crypto::{
    KeyUsage, OsCryptoProvider, decode_name, decrypt_envelope, derive_key, encode_name,
    encrypt_envelope,
};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Any payload survives an encrypt/decrypt round trip under keys
    /// derived from the same password and salt.
    #[test]
    fn envelope_round_trip(payload in proptest::collection::vec(any::<u8>(), 0..2048)) {
        let provider = OsCryptoProvider;
        let salt = [9u8; 32];
        let (enc, _) = derive_key(&provider, "pw", 64, KeyUsage::Encrypt, Some(&salt)).unwrap();
        let (dec, _) = derive_key(&provider, "pw", 64, KeyUsage::Decrypt, Some(&salt)).unwrap();

        let fields = encrypt_envelope(&provider, &enc, &payload).unwrap();
        prop_assert_eq!(decrypt_envelope(&provider, &dec, &fields).unwrap(), payload);
    }

    /// Flipping any single ciphertext byte fails authentication.
    #[test]
    fn envelope_rejects_any_content_corruption(
        payload in proptest::collection::vec(any::<u8>(), 1..256),
        flip in any::<prop::sample::Index>(),
    ) {
        let provider = OsCryptoProvider;
        let salt = [9u8; 32];
        let (enc, _) = derive_key(&provider, "pw", 64, KeyUsage::Encrypt, Some(&salt)).unwrap();
        let (dec, _) = derive_key(&provider, "pw", 64, KeyUsage::Decrypt, Some(&salt)).unwrap();

        let mut fields = encrypt_envelope(&provider, &enc, &payload).unwrap();
        let at = flip.index(fields.encrypted_content.len());
        fields.encrypted_content[at] ^= 0x01;
        prop_assert!(decrypt_envelope(&provider, &dec, &fields).is_err());
    }

    /// Names of up to 255 UTF-16 units survive encoding unchanged.
    #[test]
    fn name_round_trip(name in "\\PC{0,200}") {
        prop_assume!(name.encode_utf16().count() <= 255);
        prop_assert_eq!(decode_name(&encode_name(&name)).unwrap(), name);
    }
}
