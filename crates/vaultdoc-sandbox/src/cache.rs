//! Per-session key cache.
//!
//! Key material never crosses the isolation boundary. A session that
//! creates a key stores it here and hands out an opaque handle; later
//! calls present the handle and the operation runs next to the
//! material. Handles are random, session-scoped and carry no
//! information about the key they name.

use std::collections::HashMap;

use vaultdoc_crypto::{CryptoProvider, DerivedKey};

use crate::error::SandboxError;

/// Random bytes behind one handle.
const HANDLE_SIZE: usize = 16;

/// A key held by the cache.
pub enum KeyObject {
    /// Password-derived key-encryption key. Never extractable.
    Kek(DerivedKey),
    /// Raw content key, imported or generated inside the session.
    Cek {
        /// 256-bit key material.
        key: [u8; 32],
        /// Whether `export_key` may release the raw bytes.
        extractable: bool,
    },
}

impl std::fmt::Debug for KeyObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Kek(kek) => f.debug_tuple("Kek").field(kek).finish(),
            Self::Cek { extractable, .. } => {
                f.debug_struct("Cek").field("extractable", extractable).finish_non_exhaustive()
            },
        }
    }
}

/// Handle-to-key map for one session.
#[derive(Debug, Default)]
pub struct KeyCache {
    keys: HashMap<String, KeyObject>,
}

impl KeyCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a key and mint a fresh handle for it.
    ///
    /// Handles are 16 random bytes rendered as 32 lowercase hex
    /// characters.
    pub fn insert(&mut self, provider: &dyn CryptoProvider, key: KeyObject) -> String {
        let mut raw = [0u8; HANDLE_SIZE];
        provider.random_bytes(&mut raw);
        let handle = hex::encode(raw);
        self.keys.insert(handle.clone(), key);
        handle
    }

    /// Resolve a handle.
    ///
    /// # Errors
    ///
    /// [`SandboxError::UnknownHandle`] when the handle was not minted
    /// by this cache. This is a hard failure; handles are not portable
    /// across sessions.
    pub fn get(&self, handle: &str) -> Result<&KeyObject, SandboxError> {
        self.keys.get(handle).ok_or(SandboxError::UnknownHandle)
    }

    /// Number of keys currently held.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Cache holds no keys.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
