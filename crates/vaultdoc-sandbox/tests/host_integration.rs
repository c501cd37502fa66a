//! Two-session composition tests: cipher session proxying all key
//! operations to a crypto host session.

use std::sync::{Arc, Mutex};

use vaultdoc_crypto::OsCryptoProvider;
use vaultdoc_sandbox::{
    CRYPTO_CAPABILITIES, Invoker, KeyCache, SandboxError, SessionConfig, SessionHandle, Value,
    cipher_entrypoints, crypto_capabilities, crypto_host_entrypoints, proxy_capabilities, spawn,
};

struct Host {
    cipher: Invoker,
    crypto: Invoker,
    cipher_handle: SessionHandle,
    crypto_handle: SessionHandle,
}

fn spawn_host() -> Host {
    let provider = Arc::new(OsCryptoProvider);
    let cache = Arc::new(Mutex::new(KeyCache::new()));
    let (crypto, crypto_handle) = spawn(
        SessionConfig::new("crypto-host"),
        crypto_host_entrypoints(),
        crypto_capabilities(provider, cache),
    );
    let caps = proxy_capabilities(&crypto, CRYPTO_CAPABILITIES);
    let (cipher, cipher_handle) = spawn(SessionConfig::new("cipher"), cipher_entrypoints(), caps);
    Host { cipher, crypto, cipher_handle, crypto_handle }
}

/// Run `encrypt_file` and split the ten fields into the six-field
/// content and name lists `decrypt_file` expects.
async fn encrypt(host: &Host, password: &str, data: &[u8], name: &str) -> (Value, Value) {
    let fields = host
        .cipher
        .invoke("encrypt_file", vec![
            Value::Text(password.to_string()),
            Value::Int(1000),
            Value::Bytes(data.to_vec()),
            Value::Text(name.to_string()),
        ])
        .await
        .unwrap();
    let fields = fields.as_list().unwrap();
    assert_eq!(fields.len(), 10);

    let mut content = fields[..2].to_vec();
    content.extend(fields[2..6].to_vec());
    let mut filename = fields[..2].to_vec();
    filename.extend(fields[6..10].to_vec());
    (Value::List(content), Value::List(filename))
}

#[tokio::test]
async fn encrypt_decrypt_round_trip_through_both_sessions() {
    let host = spawn_host();
    let (content, name) =
        encrypt(&host, "correct-horse-battery-staple", b"attack at dawn", "orders.txt").await;

    let result = host
        .cipher
        .invoke("decrypt_file", vec![
            Value::Text("correct-horse-battery-staple".to_string()),
            content,
            name,
        ])
        .await
        .unwrap();

    let list = result.as_list().unwrap();
    assert_eq!(list[0], Value::Bytes(b"attack at dawn".to_vec()));
    assert_eq!(list[1], Value::Text("orders.txt".to_string()));

    host.cipher_handle.shutdown();
    host.crypto_handle.shutdown();
}

#[tokio::test]
async fn derive_kek_reports_handle_salt_and_iterations() {
    let host = spawn_host();
    let derived = host
        .cipher
        .invoke("derive_kek", vec![
            Value::Text("pw".to_string()),
            Value::Int(1000),
            Value::Text("encrypt".to_string()),
            Value::Null,
        ])
        .await
        .unwrap();

    let list = derived.as_list().unwrap();
    assert!(matches!(&list[0], Value::Handle(h) if h.len() == 32));
    assert_eq!(list[1].as_bytes().unwrap().len(), 32);
    assert_eq!(list[2], Value::Int(1000));
}

#[tokio::test]
async fn wrong_password_and_tampered_content_fail_with_same_text() {
    let host = spawn_host();
    let (content, name) = encrypt(&host, "pw", b"payload", "n.bin").await;

    let wrong = host
        .cipher
        .invoke("decrypt_file", vec![
            Value::Text("not-the-password".to_string()),
            content.clone(),
            name.clone(),
        ])
        .await
        .unwrap_err();

    let mut fields = content.as_list().unwrap().to_vec();
    let mut ciphertext = fields[5].as_bytes().unwrap().to_vec();
    ciphertext[0] ^= 0x01;
    fields[5] = Value::Bytes(ciphertext);
    let torn = host
        .cipher
        .invoke("decrypt_file", vec![
            Value::Text("pw".to_string()),
            Value::List(fields),
            name,
        ])
        .await
        .unwrap_err();

    assert_eq!(wrong.to_string(), torn.to_string());
}

#[tokio::test]
async fn tampered_wrapped_key_fails_like_tampered_content() {
    let host = spawn_host();
    let (content, _) = encrypt(&host, "pw", b"payload", "n.bin").await;

    let mut fields = content.as_list().unwrap().to_vec();
    let mut wrapped = fields[3].as_bytes().unwrap().to_vec();
    wrapped[0] ^= 0x01;
    fields[3] = Value::Bytes(wrapped);

    let err = host
        .cipher
        .invoke("decrypt_file", vec![
            Value::Text("pw".to_string()),
            Value::List(fields),
            Value::Null,
        ])
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "decryption failed");
}

#[tokio::test]
async fn damaged_name_envelope_still_returns_content() {
    let host = spawn_host();
    let (content, name) = encrypt(&host, "pw", b"payload", "n.bin").await;

    let mut fields = name.as_list().unwrap().to_vec();
    let mut ciphertext = fields[5].as_bytes().unwrap().to_vec();
    ciphertext[0] ^= 0x01;
    fields[5] = Value::Bytes(ciphertext);

    let result = host
        .cipher
        .invoke("decrypt_file", vec![
            Value::Text("pw".to_string()),
            content,
            Value::List(fields),
        ])
        .await
        .unwrap();

    let list = result.as_list().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0], Value::Bytes(b"payload".to_vec()));
}

#[tokio::test]
async fn missing_name_envelope_returns_content_only() {
    let host = spawn_host();
    let (content, _) = encrypt(&host, "pw", b"payload", "n.bin").await;

    let result = host
        .cipher
        .invoke("decrypt_file", vec![Value::Text("pw".to_string()), content, Value::Null])
        .await
        .unwrap();

    assert_eq!(result.as_list().unwrap().len(), 1);
}

#[tokio::test]
async fn handles_do_not_cross_hosts() {
    let first = spawn_host();
    let second = spawn_host();

    let derived = first
        .crypto
        .invoke("derive_key", vec![
            Value::Text("pw".to_string()),
            Value::Int(1000),
            Value::Text("encrypt".to_string()),
            Value::Null,
        ])
        .await
        .unwrap();
    let handle = derived.as_list().unwrap()[0].clone();

    // The handle resolves in the host that minted it.
    let ok = first
        .crypto
        .invoke("encrypt", vec![handle.clone(), Value::Bytes(b"payload".to_vec())])
        .await;
    assert!(ok.is_ok());

    // The same handle is meaningless to any other host.
    let err = second
        .crypto
        .invoke("encrypt", vec![handle, Value::Bytes(b"payload".to_vec())])
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "unknown key handle");
}

#[tokio::test]
async fn unknown_entrypoint_never_crosses_the_boundary() {
    let host = spawn_host();
    let err = host.cipher.invoke("steal_keys", vec![]).await.unwrap_err();
    assert_eq!(err, SandboxError::UnknownEntrypoint("steal_keys".to_string()));
}

#[tokio::test]
async fn crypto_host_shutdown_cancels_cipher_calls() {
    let host = spawn_host();
    host.crypto_handle.shutdown();
    host.crypto_handle.join().await;

    let err = host
        .cipher
        .invoke("derive_kek", vec![
            Value::Text("pw".to_string()),
            Value::Int(1000),
            Value::Text("encrypt".to_string()),
            Value::Null,
        ])
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "session terminated");
}
