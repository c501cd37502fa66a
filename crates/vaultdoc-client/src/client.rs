//! Session orchestration.
//!
//! [`Client`] owns the standard two-session topology: a crypto host
//! holding the key cache and a cipher session reaching it through
//! proxy capabilities. The facade drives the cipher session's
//! entrypoints and handles PEM framing on both paths, so callers deal
//! only in passwords, plaintexts and armored text.

use std::sync::{Arc, Mutex};

use vaultdoc_cms::{der_to_pem, pem_to_der};
use vaultdoc_crypto::{CryptoProvider, OsCryptoProvider};
use vaultdoc_sandbox::{
    CRYPTO_CAPABILITIES, Invoker, KeyCache, SandboxError, SessionConfig, SessionHandle, Value,
    cipher_entrypoints, crypto_capabilities, crypto_host_entrypoints, proxy_capabilities, spawn,
};

use crate::error::ClientError;

/// Facade over the two-session host.
///
/// Dropping a client leaves the session tasks to wind down when their
/// channels close; call [`Client::shutdown`] first to cancel in-flight
/// work.
#[derive(Debug)]
pub struct Client {
    cipher: Invoker,
    cipher_handle: SessionHandle,
    crypto_handle: SessionHandle,
}

impl Client {
    /// Spawn the session topology over the OS crypto provider.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new() -> Self {
        Self::with_provider(Arc::new(OsCryptoProvider))
    }

    /// Spawn the session topology over a specific crypto provider.
    pub fn with_provider(provider: Arc<dyn CryptoProvider>) -> Self {
        let cache = Arc::new(Mutex::new(KeyCache::new()));
        let (crypto, crypto_handle) = spawn(
            SessionConfig::new("crypto-host"),
            crypto_host_entrypoints(),
            crypto_capabilities(provider, cache),
        );
        let caps = proxy_capabilities(&crypto, CRYPTO_CAPABILITIES);
        let (cipher, cipher_handle) = spawn(SessionConfig::new("cipher"), cipher_entrypoints(), caps);
        Self { cipher, cipher_handle, crypto_handle }
    }

    /// Encrypt a payload and its file name into two PEM blocks.
    ///
    /// Returns `(content_pem, name_pem)`. Both envelopes share the
    /// salt and iteration count but carry independent content keys and
    /// nonces.
    pub async fn encrypt_to_pem(
        &self,
        password: &str,
        iteration_count: u32,
        data: &[u8],
        filename: &str,
    ) -> Result<(String, String), ClientError> {
        tracing::debug!(len = data.len(), iteration_count, "encrypting payload");

        let fields = self
            .cipher
            .invoke("encrypt_file", vec![
                Value::Text(password.to_string()),
                Value::Int(i64::from(iteration_count)),
                Value::Bytes(data.to_vec()),
                Value::Text(filename.to_string()),
            ])
            .await
            .map_err(encrypt_error)?;
        let fields = list_of(&fields, 10)?;

        let content_der = self.construct(&fields[..2], &fields[2..6]).await?;
        let name_der = self.construct(&fields[..2], &fields[6..10]).await?;

        Ok((der_to_pem(&content_der), der_to_pem(&name_der)))
    }

    /// Decrypt a content PEM block and, when present, its name block.
    ///
    /// A missing or damaged name block never blocks content recovery;
    /// the name comes back as `None`.
    pub async fn decrypt_from_pem(
        &self,
        password: &str,
        content_pem: &str,
        name_pem: Option<&str>,
    ) -> Result<(Vec<u8>, Option<String>), ClientError> {
        let content_der = pem_to_der(content_pem)?;
        let content_fields = self.parse(&content_der).await?;

        // Name-path failures are swallowed from here on.
        let name_fields = match name_pem {
            Some(pem) => match pem_to_der(pem) {
                Ok(der) => match self.parse(&der).await {
                    Ok(fields) => Value::List(fields),
                    Err(e) => {
                        tracing::debug!(error = %e, "name envelope unparseable");
                        Value::Null
                    },
                },
                Err(e) => {
                    tracing::debug!(error = %e, "name envelope unreadable");
                    Value::Null
                },
            },
            None => Value::Null,
        };

        let result = self
            .cipher
            .invoke("decrypt_file", vec![
                Value::Text(password.to_string()),
                Value::List(content_fields),
                name_fields,
            ])
            .await
            .map_err(decrypt_error)?;
        let result = result.as_list().map_err(session_error)?;

        let data = result
            .first()
            .ok_or_else(|| ClientError::Session("empty decrypt result".to_string()))?
            .as_bytes()
            .map_err(session_error)?
            .to_vec();
        let name = match result.get(1) {
            Some(value) => Some(value.as_text().map_err(session_error)?.to_string()),
            None => None,
        };

        Ok((data, name))
    }

    /// Cancel both sessions.
    pub fn shutdown(&self) {
        self.cipher_handle.shutdown();
        self.crypto_handle.shutdown();
    }

    /// Encode six envelope fields through the codec entrypoint.
    async fn construct(&self, shared: &[Value], fields: &[Value]) -> Result<Vec<u8>, ClientError> {
        let mut args = shared.to_vec();
        args.extend(fields.to_vec());
        let der = self.cipher.invoke("construct_cms", args).await.map_err(encrypt_error)?;
        Ok(der.as_bytes().map_err(session_error)?.to_vec())
    }

    /// Decode a DER envelope through the codec entrypoint.
    async fn parse(&self, der: &[u8]) -> Result<Vec<Value>, ClientError> {
        let fields = self
            .cipher
            .invoke("parse_cms", vec![Value::Bytes(der.to_vec())])
            .await
            .map_err(|e| match e {
                SandboxError::Entrypoint(text) => ClientError::Envelope(text),
                other => session_error(other),
            })?;
        list_of(&fields, 6)
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

fn list_of(value: &Value, len: usize) -> Result<Vec<Value>, ClientError> {
    let list = value.as_list().map_err(session_error)?;
    if list.len() != len {
        return Err(ClientError::Session(format!(
            "expected {len} fields, got {}",
            list.len()
        )));
    }
    Ok(list.to_vec())
}

fn session_error(e: SandboxError) -> ClientError {
    ClientError::Session(e.to_string())
}

/// Classify an encrypt-path failure.
fn encrypt_error(e: SandboxError) -> ClientError {
    match e {
        SandboxError::Entrypoint(text) => ClientError::InvalidInput(text),
        other => session_error(other),
    }
}

/// Classify a decrypt-path failure.
///
/// Anything that went wrong after the envelope parsed cleanly is
/// reported as the one undifferentiated decryption failure.
fn decrypt_error(e: SandboxError) -> ClientError {
    match e {
        SandboxError::Entrypoint(_) => ClientError::DecryptFailed,
        other => session_error(other),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trip_via_pem() {
        let client = Client::new();
        let (content_pem, name_pem) =
            client.encrypt_to_pem("pw", 1000, b"hello", "greeting.txt").await.unwrap();

        assert!(content_pem.starts_with("-----BEGIN CMS-----"));
        assert!(name_pem.starts_with("-----BEGIN CMS-----"));

        let (data, name) =
            client.decrypt_from_pem("pw", &content_pem, Some(&name_pem)).await.unwrap();
        assert_eq!(data, b"hello");
        assert_eq!(name.as_deref(), Some("greeting.txt"));
        client.shutdown();
    }

    #[tokio::test]
    async fn empty_password_is_invalid_input() {
        let client = Client::new();
        let err = client.encrypt_to_pem("", 1000, b"x", "x").await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn garbage_pem_is_an_envelope_error() {
        let client = Client::new();
        let err = client.decrypt_from_pem("pw", "not pem at all", None).await.unwrap_err();
        assert!(matches!(err, ClientError::Envelope(_)));
    }
}
