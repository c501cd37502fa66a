//! Fuzz target for the CMS envelope decoder.
//!
//! Arbitrary bytes must never panic the decoder: every invalid input
//! returns an error, every over-read is caught by the cursor.

#![no_main]

use libfuzzer_sys::fuzz_target;
use vaultdoc_cms::decode;

fuzz_target!(|data: &[u8]| {
    let _ = decode(data);
});
