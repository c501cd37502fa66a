//! Capability grants.
//!
//! A session can only reach the outside world through the capabilities
//! it was granted at spawn time. Each capability is a named async
//! function over boundary [`Value`]s. Two grant sets exist: the crypto
//! set, which runs primitives next to a key cache, and the proxy set,
//! which forwards each call to another session's invoker so key
//! material stays where it was created.

use std::{
    collections::HashMap,
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex},
};

use vaultdoc_crypto::{
    CryptoProvider, EnvelopeFields, KeyUsage, decrypt_envelope, derive_key, encrypt_envelope,
};

use crate::{
    cache::{KeyCache, KeyObject},
    error::SandboxError,
    session::Invoker,
    value::{Value, arg},
};

/// Largest byte count `random_bytes` will produce in one call.
const RANDOM_BYTES_LIMIT: i64 = 65536;

/// Future returned by a capability call.
pub type CapFuture = Pin<Box<dyn Future<Output = Result<Value, SandboxError>> + Send + 'static>>;

/// A granted capability.
pub type CapabilityFn = Arc<dyn Fn(Vec<Value>) -> CapFuture + Send + Sync>;

/// Named capabilities available to one session.
#[derive(Clone, Default)]
pub struct Capabilities {
    grants: HashMap<&'static str, CapabilityFn>,
}

impl Capabilities {
    /// Create an empty grant set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a capability under `name`.
    #[must_use]
    pub fn grant(
        mut self,
        name: &'static str,
        f: impl Fn(Vec<Value>) -> CapFuture + Send + Sync + 'static,
    ) -> Self {
        self.grants.insert(name, Arc::new(f));
        self
    }

    /// Invoke a granted capability.
    ///
    /// # Errors
    ///
    /// [`SandboxError::UnknownCapability`] when `name` was never
    /// granted, plus whatever the capability itself returns.
    pub async fn call(&self, name: &str, args: Vec<Value>) -> Result<Value, SandboxError> {
        let Some(f) = self.grants.get(name) else {
            return Err(SandboxError::UnknownCapability(name.to_string()));
        };
        f(args).await
    }
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.grants.keys().collect();
        names.sort_unstable();
        f.debug_struct("Capabilities").field("grants", &names).finish()
    }
}

/// Names of the crypto capability set, in grant order.
pub const CRYPTO_CAPABILITIES: &[&str] = &[
    "derive_key",
    "generate_key",
    "import_key",
    "export_key",
    "encrypt",
    "decrypt",
    "random_bytes",
];

/// Build the crypto capability set over a provider and key cache.
///
/// All key material produced by these capabilities stays in `cache`;
/// callers only ever see handles, except for `export_key` on a key
/// explicitly marked extractable.
pub fn crypto_capabilities(
    provider: Arc<dyn CryptoProvider>,
    cache: Arc<Mutex<KeyCache>>,
) -> Capabilities {
    let mut caps = Capabilities::new();

    let (p, c) = (Arc::clone(&provider), Arc::clone(&cache));
    caps = caps.grant("derive_key", move |args| {
        let (p, c) = (Arc::clone(&p), Arc::clone(&c));
        Box::pin(async move { derive_key_cap(p.as_ref(), &c, &args) })
    });

    let (p, c) = (Arc::clone(&provider), Arc::clone(&cache));
    caps = caps.grant("generate_key", move |args| {
        let (p, c) = (Arc::clone(&p), Arc::clone(&c));
        Box::pin(async move { generate_key_cap(p.as_ref(), &c, &args) })
    });

    let (p, c) = (Arc::clone(&provider), Arc::clone(&cache));
    caps = caps.grant("import_key", move |args| {
        let (p, c) = (Arc::clone(&p), Arc::clone(&c));
        Box::pin(async move { import_key_cap(p.as_ref(), &c, &args) })
    });

    let c = Arc::clone(&cache);
    caps = caps.grant("export_key", move |args| {
        let c = Arc::clone(&c);
        Box::pin(async move { export_key_cap(&c, &args) })
    });

    let (p, c) = (Arc::clone(&provider), Arc::clone(&cache));
    caps = caps.grant("encrypt", move |args| {
        let (p, c) = (Arc::clone(&p), Arc::clone(&c));
        Box::pin(async move { encrypt_cap(p.as_ref(), &c, &args) })
    });

    let (p, c) = (Arc::clone(&provider), Arc::clone(&cache));
    caps = caps.grant("decrypt", move |args| {
        let (p, c) = (Arc::clone(&p), Arc::clone(&c));
        Box::pin(async move { decrypt_cap(p.as_ref(), &c, &args) })
    });

    let p = Arc::clone(&provider);
    caps = caps.grant("random_bytes", move |args| {
        let p = Arc::clone(&p);
        Box::pin(async move { random_bytes_cap(p.as_ref(), &args) })
    });

    caps
}

/// Build a capability set that forwards every named capability to
/// `invoker` as a same-named entrypoint call.
///
/// This is the one-directional bridge between sessions: the holder can
/// ask the target session to operate on its keys but can never read
/// them.
pub fn proxy_capabilities(invoker: &Invoker, names: &[&'static str]) -> Capabilities {
    let mut caps = Capabilities::new();
    for &name in names {
        let invoker = invoker.clone();
        caps = caps.grant(name, move |args| {
            let invoker = invoker.clone();
            Box::pin(async move { invoker.invoke(name, args).await })
        });
    }
    caps
}

fn lock(cache: &Mutex<KeyCache>) -> Result<std::sync::MutexGuard<'_, KeyCache>, SandboxError> {
    cache.lock().map_err(|_| SandboxError::Entrypoint("key cache poisoned".to_string()))
}

fn crypto_err(e: vaultdoc_crypto::CryptoError) -> SandboxError {
    SandboxError::Entrypoint(e.to_string())
}

fn iteration_arg(value: &Value) -> Result<u32, SandboxError> {
    u32::try_from(value.as_int()?)
        .map_err(|_| SandboxError::InvalidArgument("iteration count out of range".to_string()))
}

fn nonce_arg(value: &Value) -> Result<[u8; 12], SandboxError> {
    value
        .as_bytes()?
        .try_into()
        .map_err(|_| SandboxError::InvalidArgument("nonce must be 12 bytes".to_string()))
}

/// `derive_key(password, iterations, usage, salt | null)` ->
/// `[handle, salt]`.
fn derive_key_cap(
    provider: &dyn CryptoProvider,
    cache: &Mutex<KeyCache>,
    args: &[Value],
) -> Result<Value, SandboxError> {
    let password = arg(args, 0)?.as_text()?;
    let iterations = iteration_arg(arg(args, 1)?)?;
    let usage = KeyUsage::parse(arg(args, 2)?.as_text()?).map_err(crypto_err)?;
    let salt = match arg(args, 3)? {
        Value::Null => None,
        other => Some(other.as_bytes()?),
    };

    let (kek, salt) = derive_key(provider, password, iterations, usage, salt).map_err(crypto_err)?;
    let handle = lock(cache)?.insert(provider, KeyObject::Kek(kek));
    Ok(Value::List(vec![Value::Handle(handle), Value::Bytes(salt)]))
}

/// `generate_key(extractable)` -> `handle`.
fn generate_key_cap(
    provider: &dyn CryptoProvider,
    cache: &Mutex<KeyCache>,
    args: &[Value],
) -> Result<Value, SandboxError> {
    let extractable = arg(args, 0)?.as_bool()?;
    let mut key = [0u8; 32];
    provider.random_bytes(&mut key);
    let handle = lock(cache)?.insert(provider, KeyObject::Cek { key, extractable });
    Ok(Value::Handle(handle))
}

/// `import_key(raw)` -> `handle`. Imported keys are extractable.
fn import_key_cap(
    provider: &dyn CryptoProvider,
    cache: &Mutex<KeyCache>,
    args: &[Value],
) -> Result<Value, SandboxError> {
    let raw = arg(args, 0)?.as_bytes()?;
    let key: [u8; 32] = raw
        .try_into()
        .map_err(|_| SandboxError::InvalidArgument("raw key must be 32 bytes".to_string()))?;
    let handle = lock(cache)?.insert(provider, KeyObject::Cek { key, extractable: true });
    Ok(Value::Handle(handle))
}

/// `export_key(handle)` -> `raw`.
fn export_key_cap(cache: &Mutex<KeyCache>, args: &[Value]) -> Result<Value, SandboxError> {
    let handle = arg(args, 0)?.as_handle()?;
    let guard = lock(cache)?;
    match guard.get(handle)? {
        KeyObject::Cek { key, extractable: true } => Ok(Value::Bytes(key.to_vec())),
        KeyObject::Cek { extractable: false, .. } | KeyObject::Kek(_) => {
            Err(SandboxError::Entrypoint("key is not extractable".to_string()))
        },
    }
}

/// `encrypt(handle, plaintext)` ->
/// `[nonce_pwri, encrypted_key, nonce_content, encrypted_content]`.
fn encrypt_cap(
    provider: &dyn CryptoProvider,
    cache: &Mutex<KeyCache>,
    args: &[Value],
) -> Result<Value, SandboxError> {
    let handle = arg(args, 0)?.as_handle()?;
    let plaintext = arg(args, 1)?.as_bytes()?;

    let guard = lock(cache)?;
    let KeyObject::Kek(kek) = guard.get(handle)? else {
        return Err(SandboxError::InvalidArgument(
            "handle does not name a key-encryption key".to_string(),
        ));
    };
    let fields = encrypt_envelope(provider, kek, plaintext).map_err(crypto_err)?;

    Ok(Value::List(vec![
        Value::Bytes(fields.nonce_pwri.to_vec()),
        Value::Bytes(fields.encrypted_key),
        Value::Bytes(fields.nonce_content.to_vec()),
        Value::Bytes(fields.encrypted_content),
    ]))
}

/// `decrypt(handle, nonce_pwri, encrypted_key, nonce_content,
/// encrypted_content)` -> `plaintext`.
fn decrypt_cap(
    provider: &dyn CryptoProvider,
    cache: &Mutex<KeyCache>,
    args: &[Value],
) -> Result<Value, SandboxError> {
    let handle = arg(args, 0)?.as_handle()?;
    let fields = EnvelopeFields {
        nonce_pwri: nonce_arg(arg(args, 1)?)?,
        encrypted_key: arg(args, 2)?.as_bytes()?.to_vec(),
        nonce_content: nonce_arg(arg(args, 3)?)?,
        encrypted_content: arg(args, 4)?.as_bytes()?.to_vec(),
    };

    let guard = lock(cache)?;
    let KeyObject::Kek(kek) = guard.get(handle)? else {
        return Err(SandboxError::InvalidArgument(
            "handle does not name a key-encryption key".to_string(),
        ));
    };
    decrypt_envelope(provider, kek, &fields).map(Value::Bytes).map_err(crypto_err)
}

/// `random_bytes(count)` -> `bytes`.
fn random_bytes_cap(provider: &dyn CryptoProvider, args: &[Value]) -> Result<Value, SandboxError> {
    let count = arg(args, 0)?.as_int()?;
    if !(0..=RANDOM_BYTES_LIMIT).contains(&count) {
        return Err(SandboxError::InvalidArgument(format!(
            "random byte count must be within 0..={RANDOM_BYTES_LIMIT}"
        )));
    }
    let mut buf = vec![0u8; count as usize];
    provider.random_bytes(&mut buf);
    Ok(Value::Bytes(buf))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use vaultdoc_crypto::OsCryptoProvider;

    use super::*;

    fn crypto_caps() -> Capabilities {
        crypto_capabilities(Arc::new(OsCryptoProvider), Arc::new(Mutex::new(KeyCache::new())))
    }

    #[tokio::test]
    async fn ungranted_capability_is_rejected() {
        let caps = Capabilities::new();
        let err = caps.call("derive_key", vec![]).await.unwrap_err();
        assert_eq!(err, SandboxError::UnknownCapability("derive_key".to_string()));
    }

    #[tokio::test]
    async fn derive_then_encrypt_then_decrypt() {
        let caps = crypto_caps();
        let derive_args = vec![
            Value::Text("pw".to_string()),
            Value::Int(100),
            Value::Text("encrypt".to_string()),
            Value::Null,
        ];
        let derived = caps.call("derive_key", derive_args).await.unwrap();
        let [handle, salt] = derived.as_list().unwrap() else {
            panic!("expected [handle, salt]");
        };
        assert_eq!(salt.as_bytes().unwrap().len(), 32);

        let fields = caps
            .call("encrypt", vec![handle.clone(), Value::Bytes(b"payload".to_vec())])
            .await
            .unwrap();

        let decrypt_args = vec![
            Value::Text("pw".to_string()),
            Value::Int(100),
            Value::Text("decrypt".to_string()),
            salt.clone(),
        ];
        let derived = caps.call("derive_key", decrypt_args).await.unwrap();
        let [dec_handle, _] = derived.as_list().unwrap() else {
            panic!("expected [handle, salt]");
        };

        let mut args = vec![dec_handle.clone()];
        args.extend(fields.as_list().unwrap().to_vec());
        let plaintext = caps.call("decrypt", args).await.unwrap();
        assert_eq!(plaintext, Value::Bytes(b"payload".to_vec()));
    }

    #[tokio::test]
    async fn derived_keys_are_not_extractable() {
        let caps = crypto_caps();
        let derived = caps
            .call("derive_key", vec![
                Value::Text("pw".to_string()),
                Value::Int(100),
                Value::Text("encrypt".to_string()),
                Value::Null,
            ])
            .await
            .unwrap();
        let handle = derived.as_list().unwrap()[0].clone();

        let err = caps.call("export_key", vec![handle]).await.unwrap_err();
        assert_eq!(err.to_string(), "key is not extractable");
    }

    #[tokio::test]
    async fn import_export_round_trip() {
        let caps = crypto_caps();
        let raw = vec![7u8; 32];
        let handle = caps.call("import_key", vec![Value::Bytes(raw.clone())]).await.unwrap();
        let exported = caps.call("export_key", vec![handle]).await.unwrap();
        assert_eq!(exported, Value::Bytes(raw));
    }

    #[tokio::test]
    async fn generated_unextractable_key_stays_inside() {
        let caps = crypto_caps();
        let handle = caps.call("generate_key", vec![Value::Bool(false)]).await.unwrap();
        let err = caps.call("export_key", vec![handle]).await.unwrap_err();
        assert_eq!(err.to_string(), "key is not extractable");
    }

    #[tokio::test]
    async fn unknown_handle_fails_hard() {
        let caps = crypto_caps();
        let err = caps
            .call("encrypt", vec![Value::Handle("0".repeat(32)), Value::Bytes(vec![])])
            .await
            .unwrap_err();
        assert_eq!(err, SandboxError::UnknownHandle);
    }

    #[tokio::test]
    async fn random_bytes_enforces_limit() {
        let caps = crypto_caps();
        let bytes = caps.call("random_bytes", vec![Value::Int(16)]).await.unwrap();
        assert_eq!(bytes.as_bytes().unwrap().len(), 16);

        let err = caps.call("random_bytes", vec![Value::Int(65537)]).await.unwrap_err();
        assert!(matches!(err, SandboxError::InvalidArgument(_)));
    }
}
