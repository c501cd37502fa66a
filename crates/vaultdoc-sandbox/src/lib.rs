//! Isolated execution host with key-handle indirection.
//!
//! Cryptographic work runs in sessions: tokio tasks reachable only
//! through message-passing invokers. Two roles compose into the
//! standard topology:
//!
//! ```text
//!   caller
//!     │ invoke("encrypt_file", ...)
//!     ▼
//!   cipher session ──── proxy capabilities ────► crypto host session
//!   (codec, envelopes,                           (PBKDF2, AES-GCM,
//!    name encoding)                               key cache)
//! ```
//!
//! The cipher session parses untrusted bytes but holds no keys; the
//! crypto host holds keys but parses nothing. Between them travel only
//! boundary [`Value`]s, and keys are named by opaque session-scoped
//! handles minted by the host's [`KeyCache`].
//!
//! # Security
//!
//! - Key material never crosses a session boundary; handles do.
//! - Handles from one session do not resolve in another.
//! - Entrypoint failures cross the boundary as message text only.

pub mod cache;
pub mod caps;
pub mod entrypoints;
pub mod error;
pub mod session;
pub mod value;

pub use cache::{KeyCache, KeyObject};
pub use caps::{CRYPTO_CAPABILITIES, Capabilities, crypto_capabilities, proxy_capabilities};
pub use entrypoints::{cipher_entrypoints, crypto_host_entrypoints};
pub use error::SandboxError;
pub use session::{EntrypointRegistry, Invoker, SessionConfig, SessionHandle, spawn};
pub use value::{Value, structured_clone};
