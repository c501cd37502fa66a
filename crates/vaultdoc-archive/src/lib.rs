//! Self-decrypting archive assembly.
//!
//! Turns encrypted envelopes plus the application's compiled resources
//! into one XHTML document that carries everything needed to decrypt
//! itself:
//!
//! ```text
//!   <head>
//!     to-be-signed fragment (CSP + SRI-pinned resources)
//!       [optionally wrapped in a cleartext signature]
//!     content envelope  (PEM, framed inert block)
//!     name envelope     (PEM, framed inert block, optional)
//!     hint              (JSON, framed inert block, optional)
//!   </head>
//! ```
//!
//! Each embedded block is framed so it is inert under both XML and
//! HTML parsing; [`extract_block`] is the inverse used on the decrypt
//! path. The head fragment before the envelopes is deterministic and
//! can be signed offline (`tbs_payload`, the presign flow).

pub mod document;
pub mod error;
pub mod escape;

pub use document::{
    ArchiveConfig, CMS_DATA_ID, CMS_FILENAME_ID, CMS_HINT_ID, DetachedSignature, EncryptedBlocks,
    MAIN_SCRIPT_ID, PresignPayload, SIGNATURE_ID, STYLESHEET_ID, SignaturePolicy, assemble,
    extract_block, sri_digest, tbs_payload,
};
pub use error::ArchiveError;
pub use escape::{ESCAPE_END, ESCAPE_START, comment_cdata_extract};
