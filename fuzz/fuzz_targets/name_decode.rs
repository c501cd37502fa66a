//! Fuzz target for the fixed-size file-name payload decoder.

#![no_main]

use libfuzzer_sys::fuzz_target;
use vaultdoc_crypto::decode_name;

fuzz_target!(|data: &[u8]| {
    let _ = decode_name(data);
});
