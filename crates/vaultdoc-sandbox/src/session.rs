//! Session tasks and invokers.
//!
//! A session is a tokio task owning a dispatch table of entrypoints
//! and a capability grant set. Callers hold an [`Invoker`]: a cheap
//! clone of the session's request channel plus the set of entrypoint
//! names, so calls to unknown entrypoints are rejected on the caller's
//! side without crossing the boundary.
//!
//! # Design
//!
//! Requests travel over an mpsc channel, replies over per-call oneshot
//! channels, and shutdown over a watch channel. Arguments are
//! structured-cloned before they are sent and results before they are
//! returned, so neither side can alias the other's data. An in-flight
//! entrypoint races against cancellation; the caller of a cancelled
//! call sees [`SandboxError::Cancelled`].
//!
//! # Security
//!
//! Entrypoint failures are reduced to their message text before the
//! reply is sent. The caller never receives structured error values
//! from inside a session.

use std::{collections::HashMap, ops::ControlFlow, sync::Arc};

use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};
use tracing::Instrument;

use crate::{
    caps::{CapFuture, Capabilities},
    error::SandboxError,
    value::{Value, structured_clone},
};

/// Depth of a session's request channel.
const REQUEST_CHANNEL_CAPACITY: usize = 32;

/// An entrypoint handler.
pub type EntrypointFn = Arc<dyn Fn(Arc<Capabilities>, Vec<Value>) -> CapFuture + Send + Sync>;

/// One request crossing the boundary.
struct Invocation {
    entrypoint: String,
    args: Vec<Value>,
    reply: oneshot::Sender<Result<Value, SandboxError>>,
}

/// Dispatch table mapping entrypoint names to handlers.
#[derive(Clone, Default)]
pub struct EntrypointRegistry {
    table: HashMap<&'static str, EntrypointFn>,
}

impl EntrypointRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entrypoint under `name`.
    #[must_use]
    pub fn register(
        mut self,
        name: &'static str,
        f: impl Fn(Arc<Capabilities>, Vec<Value>) -> CapFuture + Send + Sync + 'static,
    ) -> Self {
        self.table.insert(name, Arc::new(f));
        self
    }

    /// Names of all registered entrypoints.
    pub fn names(&self) -> Vec<&'static str> {
        self.table.keys().copied().collect()
    }

    fn get(&self, name: &str) -> Option<&EntrypointFn> {
        self.table.get(name)
    }

    /// Drop every entrypoint not named in `allow`.
    fn restrict(mut self, allow: &[&'static str]) -> Self {
        self.table.retain(|name, _| allow.contains(name));
        self
    }
}

impl std::fmt::Debug for EntrypointRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names = self.names();
        names.sort_unstable();
        f.debug_struct("EntrypointRegistry").field("entrypoints", &names).finish()
    }
}

/// Immutable configuration for one session, built once at spawn time.
///
/// The optional allowlist narrows a dispatch table to a granted
/// subset: entrypoints outside it are stripped before the task starts
/// and rejected caller-side, exactly like names that were never
/// registered.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    name: &'static str,
    allowlist: Option<Vec<&'static str>>,
}

impl SessionConfig {
    /// Configuration exposing every registered entrypoint.
    pub fn new(name: &'static str) -> Self {
        Self { name, allowlist: None }
    }

    /// Restrict the session to the named entrypoints.
    #[must_use]
    pub fn with_allowlist(mut self, names: &[&'static str]) -> Self {
        self.allowlist = Some(names.to_vec());
        self
    }

    /// Name of the session being configured.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Caller-side handle for invoking a session's entrypoints.
///
/// Clones are cheap and share the same session. An invoker only grants
/// the ability to call entrypoints; it gives no access to the
/// session's keys or capabilities.
#[derive(Clone, Debug)]
pub struct Invoker {
    session: &'static str,
    tx: mpsc::Sender<Invocation>,
    entrypoints: Arc<Vec<&'static str>>,
}

impl Invoker {
    /// Call an entrypoint and wait for its result.
    ///
    /// # Errors
    ///
    /// - [`SandboxError::UnknownEntrypoint`] when `entrypoint` is not
    ///   in the session's dispatch table (rejected before sending)
    /// - [`SandboxError::Cancelled`] when the session shut down before
    ///   the call completed
    /// - [`SandboxError::Entrypoint`] carrying the message text of any
    ///   failure inside the session
    pub async fn invoke(
        &self,
        entrypoint: &str,
        args: Vec<Value>,
    ) -> Result<Value, SandboxError> {
        if !self.entrypoints.iter().any(|name| *name == entrypoint) {
            return Err(SandboxError::UnknownEntrypoint(entrypoint.to_string()));
        }

        let args =
            args.iter().map(structured_clone).collect::<Result<Vec<_>, SandboxError>>()?;

        let (reply_tx, reply_rx) = oneshot::channel();
        let invocation =
            Invocation { entrypoint: entrypoint.to_string(), args, reply: reply_tx };
        self.tx.send(invocation).await.map_err(|_| SandboxError::Cancelled)?;
        reply_rx.await.map_err(|_| SandboxError::Cancelled)?
    }

    /// Name of the session this invoker targets.
    pub fn session(&self) -> &'static str {
        self.session
    }
}

/// Owner-side handle controlling a session's lifetime.
#[derive(Debug)]
pub struct SessionHandle {
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Request shutdown. In-flight calls fail with
    /// [`SandboxError::Cancelled`]; queued calls are dropped.
    pub fn shutdown(&self) {
        let _ = self.cancel.send(true);
    }

    /// Wait for the session task to exit.
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

/// Spawn a session task.
///
/// Returns the caller-side invoker and the owner-side lifetime handle.
/// Must be called from within a tokio runtime.
pub fn spawn(
    config: SessionConfig,
    registry: EntrypointRegistry,
    caps: Capabilities,
) -> (Invoker, SessionHandle) {
    let registry = match &config.allowlist {
        Some(allow) => registry.restrict(allow),
        None => registry,
    };

    let (tx, rx) = mpsc::channel(REQUEST_CHANNEL_CAPACITY);
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let entrypoints = Arc::new(registry.names());

    let span = tracing::debug_span!("session", name = config.name);
    let task = tokio::spawn(run(registry, Arc::new(caps), rx, cancel_rx).instrument(span));

    (
        Invoker { session: config.name, tx, entrypoints },
        SessionHandle { cancel: cancel_tx, task },
    )
}

/// Session main loop: serve requests until cancelled or orphaned.
async fn run(
    registry: EntrypointRegistry,
    caps: Arc<Capabilities>,
    mut rx: mpsc::Receiver<Invocation>,
    mut cancel: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = cancel.changed() => {
                tracing::debug!("session shutting down");
                break;
            },
            request = rx.recv() => {
                let Some(invocation) = request else { break };
                if dispatch(&registry, &caps, &mut cancel, invocation).await.is_break() {
                    tracing::debug!("session cancelled mid-call");
                    break;
                }
            },
        }
    }
}

/// Run one invocation, racing it against cancellation.
async fn dispatch(
    registry: &EntrypointRegistry,
    caps: &Arc<Capabilities>,
    cancel: &mut watch::Receiver<bool>,
    invocation: Invocation,
) -> ControlFlow<()> {
    let Invocation { entrypoint, args, reply } = invocation;

    let Some(handler) = registry.get(&entrypoint) else {
        tracing::warn!(entrypoint, "invocation of unknown entrypoint");
        let _ = reply.send(Err(SandboxError::UnknownEntrypoint(entrypoint)));
        return ControlFlow::Continue(());
    };

    tracing::debug!(entrypoint, "dispatching");
    tokio::select! {
        _ = cancel.changed() => {
            let _ = reply.send(Err(SandboxError::Cancelled));
            ControlFlow::Break(())
        },
        result = handler(Arc::clone(caps), args) => {
            let result = result.and_then(|value| structured_clone(&value)).map_err(reduce);
            let _ = reply.send(result);
            ControlFlow::Continue(())
        },
    }
}

/// Reduce an entrypoint failure to its message text.
fn reduce(error: SandboxError) -> SandboxError {
    match error {
        transport @ SandboxError::Transport(_) => transport,
        other => SandboxError::Entrypoint(other.to_string()),
    }
}
