//! Fuzz target for embedded-block extraction from archive documents.

#![no_main]

use libfuzzer_sys::fuzz_target;
use vaultdoc_archive::{CMS_DATA_ID, comment_cdata_extract, extract_block};

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = extract_block(text, CMS_DATA_ID);
        let _ = comment_cdata_extract(text);
    }
});
