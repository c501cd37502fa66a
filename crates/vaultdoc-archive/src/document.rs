//! Archive document assembly.
//!
//! Produces one self-contained XHTML document embedding the encrypted
//! envelopes, the application resources that decrypt them, and an
//! optional detached signature over everything that executes. Every
//! inline resource carries an SRI digest and the CSP meta tag pins
//! exactly those digests, so the artifact validates itself.
//!
//! The head fragment up to the signature block is deterministic for a
//! given configuration. That fragment is the to-be-signed payload: it
//! can be produced offline (`tbs_payload`), signed out of band, and
//! the signature embedded in a later assembly run.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use sha2::{Digest, Sha256, Sha384};
use vaultdoc_cms::der_to_pem;

use crate::{
    error::ArchiveError,
    escape::{
        ESCAPE_END, ESCAPE_START, comment_cdata_extract, json_script_escape, xml_escape,
        xml_escape_attr,
    },
};

/// Element id of the content envelope block.
pub const CMS_DATA_ID: &str = "cms-data";

/// Element id of the file-name envelope block.
pub const CMS_FILENAME_ID: &str = "cms-filename";

/// Element id of the password-hint block.
pub const CMS_HINT_ID: &str = "cms-hint";

/// Element id of the detached signature block.
pub const SIGNATURE_ID: &str = "openpgp-signature";

/// Element id of the embedded main script source.
pub const MAIN_SCRIPT_ID: &str = "main-script-src";

/// Element id of the embedded stylesheet.
pub const STYLESHEET_ID: &str = "main-stylesheet";

/// Column width for base64 chunking of the embedded main script.
const SCRIPT_CHUNK_WIDTH: usize = 512;

/// Resources baked into every archive. Built once, immutable.
#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    /// Compiled application script, embedded as chunked base64.
    pub main_script: Vec<u8>,
    /// Compiled stylesheet, embedded as a data: URI.
    pub stylesheet: Vec<u8>,
    /// Bootstrap script shown when the main script cannot run.
    pub fallback_script: Vec<u8>,
    /// Bootstrap script that unpacks and executes the main script.
    pub loader_script: Vec<u8>,
    /// Document title.
    pub title: String,
}

/// Encrypted payloads to embed.
#[derive(Debug, Clone)]
pub struct EncryptedBlocks {
    /// DER of the content envelope.
    pub content_der: Vec<u8>,
    /// DER of the file-name envelope, when a name was encrypted.
    pub name_der: Option<Vec<u8>>,
    /// Plaintext password hint.
    pub hint: Option<String>,
}

/// Detached signature produced out of band over a presign payload.
#[derive(Debug, Clone)]
pub struct DetachedSignature {
    /// ASCII-armored signature text.
    pub armor_text: String,
    /// SHA-256 digest of the payload the signer actually signed.
    pub tbs_digest: [u8; 32],
}

/// What to do when the detached signature does not cover the payload
/// being assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignaturePolicy {
    /// Log a warning and assemble unsigned.
    Opportunistic,
    /// Fail the assembly.
    Mandatory,
}

/// Deterministic to-be-signed head fragment and its digest.
#[derive(Debug, Clone)]
pub struct PresignPayload {
    /// The exact fragment bytes a signer must sign.
    pub text: String,
    /// SHA-256 over `text`.
    pub digest: [u8; 32],
}

/// SRI digest of a resource: `sha384-` plus base64 of SHA-384.
pub fn sri_digest(resource: &[u8]) -> String {
    let digest = Sha384::digest(resource);
    format!("sha384-{}", STANDARD.encode(digest))
}

/// Percent-encode base64 text for use inside a data: URI.
fn data_uri_b64(bytes: &[u8]) -> String {
    STANDARD
        .encode(bytes)
        .replace('+', "%2B")
        .replace('/', "%2F")
        .replace('=', "%3D")
}

/// Split text into fixed-width lines joined by CRLF.
fn chunk_crlf(text: &str, width: usize) -> String {
    text.as_bytes()
        .chunks(width)
        .map(|chunk| std::str::from_utf8(chunk).unwrap_or_default())
        .collect::<Vec<_>>()
        .join("\r\n")
}

/// Build the deterministic to-be-signed head fragment.
///
/// The fragment opens by closing the frame the document will wrap it
/// in, carries the charset/viewport/CSP metas, the fallback and loader
/// bootstrap scripts, the inert main-script and stylesheet resources,
/// and ends by opening the signature block's frame. Wrapping it in a
/// cleartext signature therefore covers everything that can execute.
pub fn tbs_payload(config: &ArchiveConfig) -> PresignPayload {
    let main_sri = sri_digest(&config.main_script);
    let style_sri = sri_digest(&config.stylesheet);
    let fallback_sri = sri_digest(&config.fallback_script);
    let loader_sri = sri_digest(&config.loader_script);

    let csp = format!(
        "default-src 'none'; \
         script-src 'self' 'unsafe-eval' blob: data:; \
         script-src-elem blob: data: '{fallback_sri}' '{loader_sri}' '{main_sri}'; \
         script-src-attr 'none'; \
         style-src data: '{style_sri}'; \
         child-src blob:; connect-src blob: data:; frame-src blob:; \
         worker-src blob:; form-action about:"
    );

    let main_b64 = chunk_crlf(&STANDARD.encode(&config.main_script), SCRIPT_CHUNK_WIDTH);

    let text = format!(
        "{ESCAPE_END}</script>\
         <meta charset=\"UTF-8\"/>\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\"/>\
         <meta http-equiv=\"content-security-policy\" content=\"{csp}\"/>\
         <title>{title}</title>\
         <script src=\"data:text/javascript;base64,{fallback_uri}\" \
         integrity=\"{fallback_attr}\" crossorigin=\"anonymous\"></script>\r\n\
         <script type=\"text/plain\" data-integrity=\"{main_attr}\" id=\"{MAIN_SCRIPT_ID}\">\
         {ESCAPE_START}{main_body}{ESCAPE_END}</script>\r\n\
         <link rel=\"stylesheet\" href=\"data:text/css;base64,{style_uri}\" \
         crossorigin=\"anonymous\" integrity=\"{style_attr}\" id=\"{STYLESHEET_ID}\"/>\r\n\
         <script src=\"data:text/javascript;base64,{loader_uri}\" defer=\"defer\" \
         integrity=\"{loader_attr}\" crossorigin=\"anonymous\"></script>\
         <script type=\"application/pgp-signature\" id=\"{SIGNATURE_ID}\">{ESCAPE_START}",
        title = xml_escape(&config.title),
        fallback_uri = data_uri_b64(&config.fallback_script),
        fallback_attr = xml_escape_attr(&fallback_sri),
        main_attr = xml_escape_attr(&main_sri),
        main_body = xml_escape(&main_b64),
        style_uri = data_uri_b64(&config.stylesheet),
        style_attr = xml_escape_attr(&style_sri),
        loader_uri = data_uri_b64(&config.loader_script),
        loader_attr = xml_escape_attr(&loader_sri),
    );

    let digest = Sha256::digest(text.as_bytes()).into();
    PresignPayload { text, digest }
}

/// Wrap the to-be-signed payload in cleartext-signature framing.
fn cleartext_signature(payload: &str, armor_text: &str) -> String {
    let dashes = "-".repeat(5);
    let armor = armor_text.split(['\r', '\n']).filter(|l| !l.is_empty()).collect::<Vec<_>>();
    format!(
        "<script type=\"text/plain\">{ESCAPE_START}\
         {dashes}BEGIN PGP SIGNED MESSAGE{dashes}\r\nHash: SHA256\r\n\r\n\
         {payload}{armor}{ESCAPE_END}</script>\r\n",
        armor = armor.join("\r\n"),
    )
}

/// Render one framed embedded block.
fn framed_block(content_type: &str, id: &str, body: &str) -> String {
    format!(
        "<script type=\"{}\" id=\"{}\">{ESCAPE_START}{body}{ESCAPE_END}</script>",
        xml_escape_attr(content_type),
        xml_escape_attr(id),
    )
}

/// Assemble the complete archive document.
///
/// The encrypted envelopes are PEM-framed and embedded as inert
/// blocks. With a signature present, its reported digest must cover
/// the recomputed to-be-signed payload: under
/// [`SignaturePolicy::Opportunistic`] a mismatch logs a warning and
/// the archive ships unsigned; under [`SignaturePolicy::Mandatory`] it
/// aborts.
pub fn assemble(
    config: &ArchiveConfig,
    blocks: &EncryptedBlocks,
    signature: Option<&DetachedSignature>,
    policy: SignaturePolicy,
) -> Result<String, ArchiveError> {
    let tbs = tbs_payload(config);

    let signature = match signature {
        Some(sig) if sig.tbs_digest != tbs.digest => match policy {
            SignaturePolicy::Mandatory => return Err(ArchiveError::SignatureDigestMismatch),
            SignaturePolicy::Opportunistic => {
                tracing::warn!("signature covers a different payload, assembling unsigned");
                None
            },
        },
        other => other,
    };

    let head = match signature {
        Some(sig) => cleartext_signature(&tbs.text, &sig.armor_text),
        None => format!("<script type=\"text/plain\">{ESCAPE_START}{}{ESCAPE_END}</script>", tbs.text),
    };

    let mut envelopes = framed_block(
        "application/pkcs7-mime",
        CMS_DATA_ID,
        &der_to_pem(&blocks.content_der),
    );
    if let Some(name_der) = &blocks.name_der {
        envelopes.push_str(&framed_block(
            "application/pkcs7-mime",
            CMS_FILENAME_ID,
            &der_to_pem(name_der),
        ));
    }
    if let Some(hint) = &blocks.hint {
        // Guard against a hint that could close the script element.
        let hint = hint.replace("</", "<//");
        let json = serde_json::to_string(&hint).unwrap_or_default();
        envelopes.push_str(&framed_block(
            "application/json",
            CMS_HINT_ID,
            &json_script_escape(&json),
        ));
    }

    Ok(format!(
        "<!DOCTYPE html>\
         <html xmlns=\"http://www.w3.org/1999/xhtml\" xml:lang=\"en\" lang=\"en\">\
         <head>{head}{envelopes}</head>\
         <body>\
         <div id=\"root\">\
         <noscript><p lang=\"en\" xml:lang=\"en\">\
         Scripting must be enabled to use this application.\
         </p></noscript>\
         <div id=\"loading\"><p lang=\"en\" xml:lang=\"en\">Loading</p></div>\
         </div>\
         <div id=\"error\"><p lang=\"en\" xml:lang=\"en\">An error occurred</p></div>\
         </body></html>\r\n"
    ))
}

/// Recover the text of an embedded block by element id.
///
/// The decrypt-side collaborator uses this to pull the PEM envelopes
/// and signature text back out of an archive.
pub fn extract_block(document: &str, id: &str) -> Result<String, ArchiveError> {
    let marker = format!("id=\"{}\"", xml_escape_attr(id));
    let at = document
        .find(&marker)
        .ok_or_else(|| ArchiveError::BlockNotFound(id.to_string()))?;
    let rest = &document[at + marker.len()..];

    let open = rest.find('>').ok_or_else(|| ArchiveError::MalformedBlock(id.to_string()))?;
    let body = &rest[open + 1..];
    let close = body.find("</").ok_or_else(|| ArchiveError::MalformedBlock(id.to_string()))?;

    comment_cdata_extract(&body[..close]).ok_or_else(|| ArchiveError::MalformedBlock(id.to_string()))
}
