//! PEM framing for encoded CMS envelopes.
//!
//! Archives embed envelopes as text: fixed begin/end markers framing
//! base64 wrapped at 64 columns with CRLF line endings. Extraction is
//! tolerant of surrounding text (the markers are searched for, not
//! anchored) and of any non-base64 characters inside the body, which
//! lets the same routine consume blocks lifted out of a document.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::error::CodecError;

const BEGIN_MARKER: &str = "-----BEGIN CMS-----";
const END_MARKER: &str = "-----END CMS-----";

/// Base64 column width inside the PEM body.
const LINE_WIDTH: usize = 64;

/// Armor DER bytes as a PEM CMS block (CRLF line endings throughout).
pub fn der_to_pem(der: &[u8]) -> String {
    let encoded = BASE64.encode(der);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / LINE_WIDTH * 2 + 48);
    out.push_str(BEGIN_MARKER);
    out.push_str("\r\n");
    for chunk in encoded.as_bytes().chunks(LINE_WIDTH) {
        // Base64 output is always ASCII, chunk boundaries are safe.
        out.push_str(std::str::from_utf8(chunk).unwrap_or_default());
        out.push_str("\r\n");
    }
    out.push_str(END_MARKER);
    out.push_str("\r\n");
    out
}

/// Recover DER bytes from a PEM CMS block embedded anywhere in `text`.
///
/// # Errors
///
/// - [`CodecError::Pem`] if the begin or end marker is missing
/// - [`CodecError::Base64`] if the body does not decode
pub fn pem_to_der(text: &str) -> Result<Vec<u8>, CodecError> {
    let start = text.find(BEGIN_MARKER).ok_or(CodecError::Pem("missing begin marker"))?;
    let body_start = start + BEGIN_MARKER.len();
    let end = text
        .get(body_start..)
        .and_then(|rest| rest.find(END_MARKER))
        .ok_or(CodecError::Pem("missing end marker"))?;

    let body: String = text[body_start..body_start + end]
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '='))
        .collect();

    Ok(BASE64.decode(body.as_bytes())?)
}
