//! Fuzz target for encoder/decoder inversion.
//!
//! Any structurally valid envelope must encode, and decoding the
//! encoding must return the identical envelope.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use vaultdoc_cms::{Envelope, decode, encode};

#[derive(Arbitrary, Debug)]
struct Input {
    salt: Vec<u8>,
    iteration_count: u32,
    nonce_pwri: [u8; 12],
    encrypted_key: Vec<u8>,
    nonce_content: [u8; 12],
    encrypted_content: Vec<u8>,
}

fuzz_target!(|input: Input| {
    // Clamp to the envelope's validity domain; rejection paths are
    // covered by envelope_decode.
    if input.salt.len() > 0x7f || input.iteration_count == 0 || input.iteration_count > i32::MAX as u32 {
        return;
    }

    let envelope = Envelope {
        salt: input.salt,
        iteration_count: input.iteration_count,
        nonce_pwri: input.nonce_pwri,
        encrypted_key: input.encrypted_key,
        nonce_content: input.nonce_content,
        encrypted_content: input.encrypted_content,
    };

    let der = encode(&envelope).expect("valid envelope must encode");
    let decoded = decode(&der).expect("encoder output must decode");
    assert_eq!(decoded, envelope);
});
