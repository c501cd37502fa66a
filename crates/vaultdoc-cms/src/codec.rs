//! Encoder and allowlist decoder for the fixed enveloped-data profile.
//!
//! All type and algorithm identifiers come from the constant table
//! below; there is no algorithm negotiation. Output length is fully
//! determined by input lengths (deterministic TLV construction with
//! short-form lengths below 128 bytes and 1-4 extra octets otherwise).

use crate::{
    envelope::{Envelope, NONCE_SIZE},
    error::CodecError,
};

/// OID 1.2.840.113549.1.7.3 (pkcs7-envelopedData), tag and length included.
const OID_ENVELOPED_DATA: [u8; 11] =
    [0x06, 0x09, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x07, 0x03];

/// OID 1.2.840.113549.1.7.1 (pkcs7-data), tag and length included.
const OID_PKCS7_DATA: [u8; 11] = [0x06, 0x09, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x07, 0x01];

/// OID 1.2.840.113549.1.5.12 (PBKDF2), tag and length included.
const OID_PBKDF2: [u8; 11] = [0x06, 0x09, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x05, 0x0c];

/// AlgorithmIdentifier for hmacWithSHA256 with absent (NULL) parameters.
const PRF_HMAC_SHA256: [u8; 14] =
    [0x30, 0x0c, 0x06, 0x08, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x02, 0x09, 0x05, 0x00];

/// keyEncryptionAlgorithm prefix: SEQUENCE(45) { OID id-alg-PWRI-KEK,
/// SEQUENCE(30) { OID aes-256-gcm, SEQUENCE(17) { OCTET STRING(12) ...
/// The 12-byte nonce and the `INTEGER 16` ICV length follow this block;
/// every length inside is fixed because nonces are always 12 bytes.
const KEY_ENC_ALG_PREFIX: [u8; 32] = [
    0x30, 0x2d, 0x06, 0x0b, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x09, 0x10, 0x03, 0x09,
    0x30, 0x1e, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x01, 0x2e, 0x30, 0x11,
    0x04, 0x0c,
];

/// contentEncryptionAlgorithm prefix: SEQUENCE(30) { OID aes-256-gcm,
/// SEQUENCE(17) { OCTET STRING(12) ...; nonce and ICV length follow.
const CONTENT_ENC_ALG_PREFIX: [u8; 17] = [
    0x30, 0x1e, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x01, 0x2e, 0x30, 0x11,
    0x04, 0x0c,
];

/// INTEGER 16: the GCM ICV (tag) length in bytes.
const GCM_ICV_LEN: [u8; 3] = [0x02, 0x01, 0x10];

/// INTEGER 3: the EnvelopedData version for password recipients.
const VERSION_ENVELOPED: [u8; 3] = [0x02, 0x01, 0x03];

/// INTEGER 0: the PasswordRecipientInfo version.
const VERSION_PWRI: [u8; 3] = [0x02, 0x01, 0x00];

/// Encode a DER definite length (short form below 128, long form with
/// 1-4 length octets otherwise).
fn der_len(len: usize) -> Vec<u8> {
    if len < 0x80 {
        vec![len as u8]
    } else {
        let bytes = len.to_be_bytes();
        let skip = bytes.iter().take_while(|&&b| b == 0).count();
        let mut out = Vec::with_capacity(1 + bytes.len() - skip);
        out.push(0x80 | (bytes.len() - skip) as u8);
        out.extend_from_slice(&bytes[skip..]);
        out
    }
}

/// Emit one TLV (tag, definite length, content).
fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let len = der_len(content.len());
    let mut out = Vec::with_capacity(1 + len.len() + content.len());
    out.push(tag);
    out.extend_from_slice(&len);
    out.extend_from_slice(content);
    out
}

/// Content octets of a minimal positive DER INTEGER.
///
/// A leading zero octet is inserted when the most significant content
/// bit would otherwise read as a sign bit.
fn der_uint(value: u32) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count().min(3);
    let mut out = Vec::with_capacity(5);
    if bytes[skip] & 0x80 != 0 {
        out.push(0x00);
    }
    out.extend_from_slice(&bytes[skip..]);
    out
}

/// Encode the six envelope fields as the fixed enveloped-data profile.
///
/// # Errors
///
/// - [`CodecError::SaltTooLong`] if the salt exceeds 127 bytes (the
///   profile requires a one-byte DER length for the salt)
/// - [`CodecError::IterationOutOfRange`] if the iteration count is zero
///   or above `i32::MAX`
pub fn encode(envelope: &Envelope) -> Result<Vec<u8>, CodecError> {
    if envelope.salt.len() > 0x7f {
        return Err(CodecError::SaltTooLong { len: envelope.salt.len() });
    }
    if envelope.iteration_count == 0 || envelope.iteration_count > i32::MAX as u32 {
        return Err(CodecError::IterationOutOfRange);
    }

    // PBKDF2-params ::= SEQUENCE { salt, iterationCount, prf }
    let mut pbkdf2_params = tlv(0x04, &envelope.salt);
    pbkdf2_params.extend_from_slice(&tlv(0x02, &der_uint(envelope.iteration_count)));
    pbkdf2_params.extend_from_slice(&PRF_HMAC_SHA256);
    let pbkdf2_params = tlv(0x30, &pbkdf2_params);

    // [0] keyDerivationAlgorithm ::= { OID pbkdf2, PBKDF2-params }
    let mut kdf_alg = Vec::with_capacity(OID_PBKDF2.len() + pbkdf2_params.len());
    kdf_alg.extend_from_slice(&OID_PBKDF2);
    kdf_alg.extend_from_slice(&pbkdf2_params);
    let kdf_alg = tlv(0xa0, &kdf_alg);

    // [3] PasswordRecipientInfo ::= { version, kdf, kek-alg, encryptedKey }
    let mut pwri = Vec::new();
    pwri.extend_from_slice(&VERSION_PWRI);
    pwri.extend_from_slice(&kdf_alg);
    pwri.extend_from_slice(&KEY_ENC_ALG_PREFIX);
    pwri.extend_from_slice(&envelope.nonce_pwri);
    pwri.extend_from_slice(&GCM_ICV_LEN);
    pwri.extend_from_slice(&tlv(0x04, &envelope.encrypted_key));
    let recipient_infos = tlv(0x31, &tlv(0xa3, &pwri));

    // EncryptedContentInfo ::= { OID data, content-alg, [0] content }
    let mut eci = Vec::new();
    eci.extend_from_slice(&OID_PKCS7_DATA);
    eci.extend_from_slice(&CONTENT_ENC_ALG_PREFIX);
    eci.extend_from_slice(&envelope.nonce_content);
    eci.extend_from_slice(&GCM_ICV_LEN);
    eci.extend_from_slice(&tlv(0x80, &envelope.encrypted_content));
    let eci = tlv(0x30, &eci);

    let mut enveloped = Vec::new();
    enveloped.extend_from_slice(&VERSION_ENVELOPED);
    enveloped.extend_from_slice(&recipient_infos);
    enveloped.extend_from_slice(&eci);
    let enveloped = tlv(0x30, &enveloped);

    let mut outer = Vec::with_capacity(OID_ENVELOPED_DATA.len() + enveloped.len() + 4);
    outer.extend_from_slice(&OID_ENVELOPED_DATA);
    outer.extend_from_slice(&tlv(0xa0, &enveloped));
    Ok(tlv(0x30, &outer))
}

/// Cursor over the input buffer for the allowlist decoder.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn byte(&self, what: &'static str) -> Result<u8, CodecError> {
        self.buf.get(self.pos).copied().ok_or(CodecError::Truncated { what })
    }

    /// Decode a definite length field at the cursor: one octet below
    /// 128, or `0x81..=0x84` followed by that many big-endian octets.
    /// Advances past the length field and returns the value.
    fn read_len(&mut self, what: &'static str) -> Result<usize, CodecError> {
        let offset = self.pos;
        let first = self.byte(what)?;
        self.pos += 1;
        if first < 0x80 {
            return Ok(first as usize);
        }
        let extra = (first ^ 0x80) as usize;
        if extra == 0 || extra > 4 {
            return Err(CodecError::InvalidLength { offset });
        }
        let mut value: usize = 0;
        for _ in 0..extra {
            let octet = self.byte(what)?;
            self.pos += 1;
            value = value
                .checked_shl(8)
                .map(|v| v | octet as usize)
                .ok_or(CodecError::InvalidLength { offset })?;
        }
        Ok(value)
    }

    /// Expect a structural tag and skip its length field. The length
    /// value itself is discarded: the profile is fixed-order, so the
    /// decoder walks fields positionally rather than by extent.
    fn expect_tag(&mut self, tag: u8, what: &'static str) -> Result<(), CodecError> {
        let offset = self.pos;
        if self.byte(what)? != tag {
            return Err(CodecError::Structural { expected: what, offset });
        }
        self.pos += 1;
        self.read_len(what)?;
        Ok(())
    }

    /// Expect an exact constant byte region.
    fn expect_bytes(&mut self, expected: &[u8], what: &'static str) -> Result<(), CodecError> {
        let offset = self.pos;
        let end = self.pos.checked_add(expected.len()).ok_or(CodecError::Truncated { what })?;
        let actual = self.buf.get(self.pos..end).ok_or(CodecError::Truncated { what })?;
        // Constant-shape comparison: accumulate the mismatch instead of
        // short-circuiting on the first differing byte.
        let mut diff = 0u8;
        for (a, e) in actual.iter().zip(expected) {
            diff |= a ^ e;
        }
        if diff != 0 {
            return Err(CodecError::Structural { expected: what, offset });
        }
        self.pos = end;
        Ok(())
    }

    fn take(&mut self, n: usize, what: &'static str) -> Result<&'a [u8], CodecError> {
        let end = self.pos.checked_add(n).ok_or(CodecError::Truncated { what })?;
        let slice = self.buf.get(self.pos..end).ok_or(CodecError::Truncated { what })?;
        self.pos = end;
        Ok(slice)
    }

    fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos.min(self.buf.len())..]
    }
}

/// Decode a big-endian unsigned INTEGER content, rejecting sign bits
/// and anything that needs more than 31 bits.
fn der_uint_decode(content: &[u8]) -> Result<u32, CodecError> {
    let first = *content.first().ok_or(CodecError::IterationOutOfRange)?;
    if first & 0x80 != 0 {
        return Err(CodecError::IterationOutOfRange);
    }
    let mut value: u64 = 0;
    for &octet in content {
        value = (value << 8) | u64::from(octet);
        if value > i32::MAX as u64 {
            return Err(CodecError::IterationOutOfRange);
        }
    }
    Ok(value as u32)
}

/// Decode the fixed enveloped-data profile back into its six fields.
///
/// Allowlist-only: every fixed byte region is compared against the
/// constant table and any mismatch aborts immediately. There is no
/// best-effort mode.
///
/// The encrypted content is read as "all remaining bytes" after its
/// `[0]` tag and length field; the declared length is not used, so
/// bytes appended after the true end of the structure are silently
/// absorbed as ciphertext. This matches the historical wire behavior
/// and is deliberately preserved.
pub fn decode(buf: &[u8]) -> Result<Envelope, CodecError> {
    let mut r = Reader::new(buf);

    r.expect_tag(0x30, "outer SEQUENCE")?;
    r.expect_bytes(&OID_ENVELOPED_DATA, "OID pkcs7-envelopedData")?;
    r.expect_tag(0xa0, "context [0]")?;
    r.expect_tag(0x30, "EnvelopedData SEQUENCE")?;
    r.expect_bytes(&VERSION_ENVELOPED, "INTEGER 3 (version)")?;
    r.expect_tag(0x31, "RecipientInfos SET")?;
    r.expect_tag(0xa3, "context [3] (pwri)")?;
    r.expect_bytes(&VERSION_PWRI, "INTEGER 0 (pwri version)")?;
    r.expect_tag(0xa0, "context [0] (key derivation)")?;
    r.expect_bytes(&OID_PBKDF2, "OID PBKDF2")?;
    r.expect_tag(0x30, "PBKDF2-params SEQUENCE")?;

    let salt_offset = r.pos;
    if r.byte("salt OCTET STRING")? != 0x04 {
        return Err(CodecError::Structural { expected: "salt OCTET STRING", offset: salt_offset });
    }
    r.pos += 1;
    let salt_len = r.read_len("salt length")?;
    if salt_len > 0x7f {
        return Err(CodecError::SaltTooLong { len: salt_len });
    }
    let salt = r.take(salt_len, "salt")?.to_vec();

    let iter_offset = r.pos;
    if r.byte("iteration count INTEGER")? != 0x02 {
        return Err(CodecError::Structural {
            expected: "iteration count INTEGER",
            offset: iter_offset,
        });
    }
    r.pos += 1;
    let iter_len = r.read_len("iteration count length")?;
    if iter_len == 0 || iter_len > 5 {
        return Err(CodecError::IterationOutOfRange);
    }
    let iteration_count = der_uint_decode(r.take(iter_len, "iteration count")?)?;
    if iteration_count == 0 {
        return Err(CodecError::IterationOutOfRange);
    }

    r.expect_bytes(&PRF_HMAC_SHA256, "hmacWithSHA256 AlgorithmIdentifier")?;
    r.expect_bytes(&KEY_ENC_ALG_PREFIX, "id-alg-PWRI-KEK AlgorithmIdentifier")?;

    let mut nonce_pwri = [0u8; NONCE_SIZE];
    nonce_pwri.copy_from_slice(r.take(NONCE_SIZE, "key-wrap nonce")?);
    r.expect_bytes(&GCM_ICV_LEN, "INTEGER 16 (ICV length)")?;

    let key_offset = r.pos;
    if r.byte("encrypted key OCTET STRING")? != 0x04 {
        return Err(CodecError::Structural {
            expected: "encrypted key OCTET STRING",
            offset: key_offset,
        });
    }
    r.pos += 1;
    let key_len = r.read_len("encrypted key length")?;
    let encrypted_key = r.take(key_len, "encrypted key")?.to_vec();

    r.expect_tag(0x30, "EncryptedContentInfo SEQUENCE")?;
    r.expect_bytes(&OID_PKCS7_DATA, "OID pkcs7-data")?;
    r.expect_bytes(&CONTENT_ENC_ALG_PREFIX, "aes-256-gcm AlgorithmIdentifier")?;

    let mut nonce_content = [0u8; NONCE_SIZE];
    nonce_content.copy_from_slice(r.take(NONCE_SIZE, "content nonce")?);
    r.expect_bytes(&GCM_ICV_LEN, "INTEGER 16 (ICV length)")?;

    r.expect_tag(0x80, "context [0] (encrypted content)")?;
    let encrypted_content = r.rest().to_vec();

    Ok(Envelope {
        salt,
        iteration_count,
        nonce_pwri,
        encrypted_key,
        nonce_content,
        encrypted_content,
    })
}
