//! Entrypoint dispatch tables for the two session roles.
//!
//! The crypto host session holds the key cache; its entrypoints are
//! thin forwards to its own crypto capabilities. The cipher session
//! does envelope and wire work; it reaches keys only through proxy
//! capabilities pointing at the crypto host, so key material never
//! enters the session that parses attacker-controlled bytes.

use std::sync::Arc;

use vaultdoc_cms::{Envelope, codec};
use vaultdoc_crypto::{decode_name, encode_name};

use crate::{
    caps::{CRYPTO_CAPABILITIES, Capabilities},
    error::SandboxError,
    session::EntrypointRegistry,
    value::{Value, arg},
};

/// Dispatch table for the crypto host session.
///
/// One entrypoint per crypto capability, each forwarding its arguments
/// unchanged. The interesting work happens in the capability layer
/// next to the key cache.
pub fn crypto_host_entrypoints() -> EntrypointRegistry {
    let mut registry = EntrypointRegistry::new();
    for &name in CRYPTO_CAPABILITIES {
        registry = registry
            .register(name, move |caps, args| Box::pin(async move { caps.call(name, args).await }));
    }
    registry
}

/// Dispatch table for the cipher session.
///
/// Entrypoints:
///
/// - `derive_kek(password, iterations, usage, salt | null)` ->
///   `[handle, salt, iterations]`
/// - `encrypt_file(password, iterations, data, filename)` -> ten
///   fields: `[salt, iterations]` followed by the four content fields
///   and the four file-name fields
/// - `decrypt_file(password, content_fields, name_fields | null)` ->
///   `[data]` or `[data, filename]`
/// - `construct_cms(salt, iterations, nonce_pwri, encrypted_key,
///   nonce_content, encrypted_content)` -> `der`
/// - `parse_cms(der)` -> the same six fields
pub fn cipher_entrypoints() -> EntrypointRegistry {
    EntrypointRegistry::new()
        .register("derive_kek", |caps, args| Box::pin(derive_kek(caps, args)))
        .register("encrypt_file", |caps, args| Box::pin(encrypt_file(caps, args)))
        .register("decrypt_file", |caps, args| Box::pin(decrypt_file(caps, args)))
        .register("construct_cms", |_caps, args| {
            Box::pin(async move { construct_cms(&args) })
        })
        .register("parse_cms", |_caps, args| Box::pin(async move { parse_cms(&args) }))
}

fn codec_err(e: vaultdoc_cms::CodecError) -> SandboxError {
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

/// Derive a usage-scoped KEK through the crypto host.
async fn derive_kek(caps: Arc<Capabilities>, args: Vec<Value>) -> Result<Value, SandboxError> {
    let iterations = iteration_arg(arg(&args, 1)?)?;
    let derived = caps.call("derive_key", args).await?;
    let derived = derived.as_list()?;
    Ok(Value::List(vec![
        arg(derived, 0)?.clone(),
        arg(derived, 1)?.clone(),
        Value::Int(i64::from(iterations)),
    ]))
}

/// Derive a KEK for one call and return `[handle, salt]`.
async fn derive_for(
    caps: &Capabilities,
    password: &str,
    iterations: u32,
    usage: &str,
    salt: Value,
) -> Result<(Value, Vec<u8>), SandboxError> {
    let derived = caps
        .call("derive_key", vec![
            Value::Text(password.to_string()),
            Value::Int(i64::from(iterations)),
            Value::Text(usage.to_string()),
            salt,
        ])
        .await?;
    let derived = derived.as_list()?;
    let handle = arg(derived, 0)?.clone();
    let salt = arg(derived, 1)?.as_bytes()?.to_vec();
    Ok((handle, salt))
}

/// Encrypt a payload and its file name under one freshly derived KEK.
///
/// Both envelopes share the salt and iteration count (one derivation
/// per call) but get independent content keys and nonces. Returns the
/// ten wire fields: salt, iteration count, then four fields per
/// envelope.
async fn encrypt_file(caps: Arc<Capabilities>, args: Vec<Value>) -> Result<Value, SandboxError> {
    let password = arg(&args, 0)?.as_text()?;
    let iterations = iteration_arg(arg(&args, 1)?)?;
    let data = arg(&args, 2)?.clone();
    data.as_bytes()?;
    let filename = arg(&args, 3)?.as_text()?;

    let (handle, salt) =
        derive_for(&caps, password, iterations, "encrypt", Value::Null).await?;

    let content_fields = caps.call("encrypt", vec![handle.clone(), data]).await?;
    let name_buf = encode_name(filename);
    let name_fields =
        caps.call("encrypt", vec![handle, Value::Bytes(name_buf.to_vec())]).await?;

    let mut fields = vec![Value::Bytes(salt), Value::Int(i64::from(iterations))];
    fields.extend(content_fields.as_list()?.to_vec());
    fields.extend(name_fields.as_list()?.to_vec());
    Ok(Value::List(fields))
}

/// Parse the six-field list `parse_cms` produces into an [`Envelope`].
fn fields_to_envelope(fields: &Value) -> Result<Envelope, SandboxError> {
    let fields = fields.as_list()?;
    Ok(Envelope {
        salt: arg(fields, 0)?.as_bytes()?.to_vec(),
        iteration_count: iteration_arg(arg(fields, 1)?)?,
        nonce_pwri: nonce_arg(arg(fields, 2)?)?,
        encrypted_key: arg(fields, 3)?.as_bytes()?.to_vec(),
        nonce_content: nonce_arg(arg(fields, 4)?)?,
        encrypted_content: arg(fields, 5)?.as_bytes()?.to_vec(),
    })
}

/// Decrypt a content envelope and, best-effort, its name envelope.
///
/// Content failures are fatal. Name-path failures of any kind are
/// swallowed and the content is returned alone; a damaged name must
/// never block content recovery.
async fn decrypt_file(caps: Arc<Capabilities>, args: Vec<Value>) -> Result<Value, SandboxError> {
    let password = arg(&args, 0)?.as_text()?.to_string();
    let content = fields_to_envelope(arg(&args, 1)?)?;
    let name_fields = arg(&args, 2)?.clone();

    let (handle, _) = derive_for(
        &caps,
        &password,
        content.iteration_count,
        "decrypt",
        Value::Bytes(content.salt.clone()),
    )
    .await?;

    let data = decrypt_with(&caps, &handle, &content).await?;

    let name = match &name_fields {
        Value::Null => None,
        other => match recover_name(&caps, &handle, &password, &content, other).await {
            Ok(name) => Some(name),
            Err(e) => {
                tracing::debug!(error = %e, "name recovery failed, returning content only");
                None
            },
        },
    };

    match name {
        Some(name) => Ok(Value::List(vec![data, Value::Text(name)])),
        None => Ok(Value::List(vec![data])),
    }
}

/// Run the crypto host's `decrypt` capability over an envelope.
async fn decrypt_with(
    caps: &Capabilities,
    handle: &Value,
    envelope: &Envelope,
) -> Result<Value, SandboxError> {
    caps.call("decrypt", vec![
        handle.clone(),
        Value::Bytes(envelope.nonce_pwri.to_vec()),
        Value::Bytes(envelope.encrypted_key.clone()),
        Value::Bytes(envelope.nonce_content.to_vec()),
        Value::Bytes(envelope.encrypted_content.clone()),
    ])
    .await
}

/// Decrypt and decode the name envelope.
///
/// Reuses the content KEK when the name envelope carries the same salt
/// and iteration count, which is the shape `encrypt_file` produces.
/// Otherwise a fresh key is derived from the name envelope's own
/// parameters.
async fn recover_name(
    caps: &Capabilities,
    content_handle: &Value,
    password: &str,
    content_envelope: &Envelope,
    name_fields: &Value,
) -> Result<String, SandboxError> {
    let envelope = fields_to_envelope(name_fields)?;

    let handle = if envelope.salt == content_envelope.salt
        && envelope.iteration_count == content_envelope.iteration_count
    {
        content_handle.clone()
    } else {
        derive_for(
            caps,
            password,
            envelope.iteration_count,
            "decrypt",
            Value::Bytes(envelope.salt.clone()),
        )
        .await?
        .0
    };

    let buf = decrypt_with(caps, &handle, &envelope).await?;
    decode_name(buf.as_bytes()?).map_err(|e| SandboxError::Entrypoint(e.to_string()))
}

/// Encode six envelope fields into the fixed DER profile.
fn construct_cms(args: &[Value]) -> Result<Value, SandboxError> {
    let envelope = fields_to_envelope(&Value::List(args.to_vec()))?;
    codec::encode(&envelope).map(Value::Bytes).map_err(codec_err)
}

/// Decode the fixed DER profile into six envelope fields.
fn parse_cms(args: &[Value]) -> Result<Value, SandboxError> {
    let der = arg(args, 0)?.as_bytes()?;
    let envelope = codec::decode(der).map_err(codec_err)?;
    Ok(Value::List(vec![
        Value::Bytes(envelope.salt),
        Value::Int(i64::from(envelope.iteration_count)),
        Value::Bytes(envelope.nonce_pwri.to_vec()),
        Value::Bytes(envelope.encrypted_key),
        Value::Bytes(envelope.nonce_content.to_vec()),
        Value::Bytes(envelope.encrypted_content),
    ]))
}
