//! Fuzz target for PEM dearmoring.

#![no_main]

use libfuzzer_sys::fuzz_target;
use vaultdoc_cms::pem_to_der;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = pem_to_der(text);
    }
});
