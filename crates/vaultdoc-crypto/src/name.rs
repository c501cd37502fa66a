//! Fixed-size filename payload encoding.
//!
//! The filename travels in its own envelope as a fixed 512-byte
//! plaintext so its ciphertext length reveals nothing about the name.
//! Layout: byte 0 is a format version (currently 0), byte 1 is the
//! UTF-16 code-unit count, and units follow little-endian from byte 2.
//! Names longer than 255 units are truncated at a code-unit boundary.

use crate::error::CryptoError;

/// Fixed plaintext size of an encoded name.
pub const NAME_BUFFER_SIZE: usize = 512;

/// Current format version written to byte 0.
const NAME_FORMAT_VERSION: u8 = 0;

/// Maximum number of UTF-16 code units the buffer can describe.
const MAX_NAME_UNITS: usize = 255;

/// Encode a filename into the fixed-size buffer.
///
/// Truncates to 255 UTF-16 code units; truncation can split a
/// surrogate pair, in which case the name will not survive decoding.
pub fn encode_name(name: &str) -> [u8; NAME_BUFFER_SIZE] {
    let mut buf = [0u8; NAME_BUFFER_SIZE];
    buf[0] = NAME_FORMAT_VERSION;

    let mut count = 0usize;
    for unit in name.encode_utf16().take(MAX_NAME_UNITS) {
        let offset = 2 + count * 2;
        buf[offset..offset + 2].copy_from_slice(&unit.to_le_bytes());
        count += 1;
    }
    // Count fits in a byte after the take(255) above.
    buf[1] = count as u8;
    buf
}

/// Decode a filename from an encoded buffer.
///
/// Accepts any buffer long enough to hold the declared code-unit
/// count (`2 + 2 * count` bytes), so envelopes produced by writers
/// that pad differently still decode. Trailing bytes are ignored.
///
/// # Errors
///
/// [`CryptoError::NameFormat`] for an unknown version byte, a buffer
/// too short for its declared count, or code units that do not form
/// valid UTF-16.
pub fn decode_name(buf: &[u8]) -> Result<String, CryptoError> {
    if buf.len() < 2 || buf[0] != NAME_FORMAT_VERSION {
        return Err(CryptoError::NameFormat);
    }

    let count = buf[1] as usize;
    if buf.len() < 2 + count * 2 {
        return Err(CryptoError::NameFormat);
    }
    let mut units = Vec::with_capacity(count);
    for i in 0..count {
        let offset = 2 + i * 2;
        units.push(u16::from_le_bytes([buf[offset], buf[offset + 1]]));
    }
    String::from_utf16(&units).map_err(|_| CryptoError::NameFormat)
}
