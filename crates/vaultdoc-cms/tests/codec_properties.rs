//! Property-based tests for the CMS codec.

use proptest::prelude::*;
use vaultdoc_cms::{Envelope, decode, encode};

fn arb_envelope() -> impl Strategy<Value = Envelope> {
    (
        proptest::collection::vec(any::<u8>(), 0..=127),
        1u32..=i32::MAX as u32,
        any::<[u8; 12]>(),
        proptest::collection::vec(any::<u8>(), 0..=512),
        any::<[u8; 12]>(),
        proptest::collection::vec(any::<u8>(), 0..=4096),
    )
        .prop_map(
            |(salt, iteration_count, nonce_pwri, encrypted_key, nonce_content, encrypted_content)| {
                Envelope {
                    salt,
                    iteration_count,
                    nonce_pwri,
                    encrypted_key,
                    nonce_content,
                    encrypted_content,
                }
            },
        )
}

proptest! {
    #[test]
    fn codec_inverse(envelope in arb_envelope()) {
        let der = encode(&envelope).expect("should encode");
        let parsed = decode(&der).expect("should decode");
        prop_assert_eq!(parsed, envelope);
    }

    #[test]
    fn single_byte_corruption_in_fixed_regions_is_detected(
        envelope in arb_envelope(),
        flip in any::<u8>(),
    ) {
        // Flipping a bit inside the first 20 bytes (outer header and
        // type OID) must either fail decode or land in a length octet
        // the fixed-order parser does not consult.
        let der = encode(&envelope).expect("should encode");
        let mut corrupted = der.clone();
        let idx = (flip as usize) % 20.min(corrupted.len());
        corrupted[idx] ^= 0x01;
        if let Ok(parsed) = decode(&corrupted) {
            // The only survivable flips are inside skipped length
            // octets; the recovered fields must still be plausible.
            prop_assert_eq!(parsed.salt, envelope.salt);
        }
    }
}
