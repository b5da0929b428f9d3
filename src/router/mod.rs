//! The command/proxy router (dispatcher).
//!
//! One router instance serves one endpoint: the pairing of a live UI
//! surface (one window) with one channel. Host setup code registers
//! direct commands and capability proxies into the router's effective
//! command namespace, binds it to the channel, and the router dispatches
//! inbound requests to handlers, answering each with exactly one
//! response envelope. Closing the endpoint tears every registration
//! down in bulk; a closed router never services another request.

pub mod commands;
pub mod error;
pub mod proxy;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, Notify};

use crate::ipc::protocol::{ErrorPayload, Request, Response};
use crate::ipc::transport::HostChannel;

use commands::{CommandHandler, CommandRegistry};
use error::{HandlerError, RegisterError};
use proxy::{Capability, ProxyRegistry};

/// Built-in command: re-initialize the client presentation
pub const RELOAD_APP: &str = "RELOAD_APP";
/// Built-in command: flip the host-side developer tools view
pub const TOGGLE_DEV_TOOLS: &str = "TOGGLE_DEV_TOOLS";

/// GUI-shell surface backing one router instance.
///
/// The shell itself (window, menus) lives outside this crate; the
/// router reaches it only through this trait.
pub trait Endpoint: Send + Sync {
    /// Re-initialize the client presentation without dropping the
    /// router/endpoint binding
    fn reload(&self);
    /// Flip the host-side developer tools view
    fn toggle_dev_tools(&self);
}

/// Lifecycle state of a router instance. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterState {
    /// Constructed, no channel attached yet
    Unbound,
    /// Attached to a live channel; dispatching
    Bound,
    /// Channel/endpoint gone; registries cleared
    Closed,
}

/// Both registries plus the effective command namespace: the union of
/// direct names and every derived `proxy.method` name. Names in the
/// namespace are globally unique at any point in time.
#[derive(Default)]
struct Registries {
    commands: CommandRegistry,
    proxies: ProxyRegistry,
    names: HashSet<String>,
}

impl Registries {
    fn clear(&mut self) {
        self.commands.clear();
        self.proxies.clear();
        self.names.clear();
    }
}

struct RouterInner {
    registries: Mutex<Registries>,
    state: Mutex<RouterState>,
    /// Lock-free close check for responders of in-flight handlers
    closed: AtomicBool,
    /// Wakes the dispatch loop when `close` is called locally
    shutdown: Notify,
}

/// The command/proxy dispatcher for one endpoint.
///
/// Cheap to clone; clones share the same registries and lifecycle.
#[derive(Clone)]
pub struct Router {
    inner: Arc<RouterInner>,
}

/// What a command name resolved to
enum Resolved {
    Command(CommandHandler),
    Proxy(Arc<dyn Capability>, String),
}

impl Router {
    /// Create an unbound router with empty registries
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RouterInner {
                registries: Mutex::new(Registries::default()),
                state: Mutex::new(RouterState::Unbound),
                closed: AtomicBool::new(false),
                shutdown: Notify::new(),
            }),
        }
    }

    pub fn state(&self) -> RouterState {
        *self.inner.state.lock()
    }

    /// Register a direct command.
    ///
    /// Fails with [`RegisterError::DuplicateCommand`] if the name is
    /// already anywhere in the effective namespace.
    pub fn register(&self, name: &str, handler: CommandHandler) -> Result<(), RegisterError> {
        self.ensure_open()?;
        let mut regs = self.inner.registries.lock();
        if regs.names.contains(name) {
            return Err(RegisterError::DuplicateCommand {
                name: name.to_string(),
            });
        }
        regs.commands.insert(name, handler)?;
        regs.names.insert(name.to_string());
        Ok(())
    }

    /// Register a synchronous handler without writing the future
    /// plumbing at the call site
    pub fn register_fn<F>(&self, name: &str, f: F) -> Result<(), RegisterError>
    where
        F: Fn(Vec<Value>) -> Result<Value, HandlerError> + Send + Sync + 'static,
    {
        self.register(
            name,
            Arc::new(move |args| {
                let outcome = f(args);
                Box::pin(async move { outcome })
            }),
        )
    }

    /// Register a capability object under a proxy name, exposing every
    /// method as `proxyName.methodName`.
    ///
    /// All-or-nothing: a duplicate proxy name or a collision of any
    /// derived name fails the call without adding a single entry.
    pub fn register_proxy(
        &self,
        proxy_name: &str,
        target: Arc<dyn Capability>,
    ) -> Result<(), RegisterError> {
        self.ensure_open()?;
        let mut regs = self.inner.registries.lock();
        if regs.proxies.contains_proxy(proxy_name) {
            return Err(RegisterError::DuplicateProxy {
                name: proxy_name.to_string(),
            });
        }

        let derived = ProxyRegistry::derived_names(proxy_name, target.as_ref());
        let mut seen = HashSet::new();
        for name in &derived {
            if regs.names.contains(name) || !seen.insert(name.clone()) {
                return Err(RegisterError::NamespaceCollision { name: name.clone() });
            }
        }

        regs.proxies.insert(proxy_name, target)?;
        regs.names.extend(derived);
        Ok(())
    }

    /// Clear both registries and the effective namespace. Idempotent.
    ///
    /// Leaves the lifecycle state untouched; `close` calls this as part
    /// of endpoint teardown.
    pub fn unregister_all(&self) {
        self.inner.registries.lock().clear();
    }

    /// Attach the router to a live channel and its endpoint surface.
    ///
    /// Registers the built-in commands, transitions `Unbound -> Bound`,
    /// and spawns the dispatch loop. The loop runs until the channel
    /// tears down or [`close`](Self::close) is called. A failed bind
    /// leaves the router `Unbound`.
    pub fn bind(&self, channel: HostChannel, endpoint: Arc<dyn Endpoint>) -> Result<()> {
        self.ensure_bindable()?;
        // Built-ins go in before the state commits: a name collision
        // fails the bind with the router still Unbound, so host setup
        // code can correct the registration and bind again.
        self.register_builtins(endpoint)?;
        {
            let mut state = self.inner.state.lock();
            match *state {
                RouterState::Unbound => *state = RouterState::Bound,
                RouterState::Bound => anyhow::bail!("router is already bound"),
                RouterState::Closed => anyhow::bail!("router is closed"),
            }
        }

        let inner = self.inner.clone();
        let HostChannel {
            mut requests,
            responses,
        } = channel;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    request = requests.recv() => {
                        match request {
                            Some(request) => {
                                if inner.closed.load(Ordering::Relaxed) {
                                    tracing::debug!(
                                        command = %request.command,
                                        "dropping request for closed endpoint"
                                    );
                                    continue;
                                }
                                Self::dispatch(&inner, request, responses.clone());
                            }
                            None => break, // channel teardown
                        }
                    }
                    _ = inner.shutdown.notified() => break,
                }
            }
            Self::close_inner(&inner);
            tracing::debug!("router unbound from channel");
        });

        Ok(())
    }

    /// Endpoint-closed transition: `-> Closed`, terminal. Idempotent.
    ///
    /// Clears both registries so no handler whose backing resources are
    /// gone can ever be invoked again, and stops the dispatch loop.
    pub fn close(&self) {
        Self::close_inner(&self.inner);
    }

    fn close_inner(inner: &Arc<RouterInner>) {
        {
            let mut state = inner.state.lock();
            if *state == RouterState::Closed {
                return;
            }
            *state = RouterState::Closed;
        }
        inner.closed.store(true, Ordering::Relaxed);
        inner.registries.lock().clear();
        inner.shutdown.notify_one();
        tracing::debug!("router closed, registrations dropped");
    }

    fn ensure_bindable(&self) -> Result<()> {
        match *self.inner.state.lock() {
            RouterState::Unbound => Ok(()),
            RouterState::Bound => anyhow::bail!("router is already bound"),
            RouterState::Closed => anyhow::bail!("router is closed"),
        }
    }

    fn ensure_open(&self) -> Result<(), RegisterError> {
        if *self.inner.state.lock() == RouterState::Closed {
            return Err(RegisterError::Closed);
        }
        Ok(())
    }

    fn register_builtins(&self, endpoint: Arc<dyn Endpoint>) -> Result<(), RegisterError> {
        let ep = endpoint.clone();
        self.register(
            RELOAD_APP,
            Arc::new(move |_args| {
                ep.reload();
                Box::pin(async { Ok(Value::Bool(true)) })
            }),
        )?;
        self.register(
            TOGGLE_DEV_TOOLS,
            Arc::new(move |_args| {
                endpoint.toggle_dev_tools();
                Box::pin(async { Ok(Value::Null) })
            }),
        )
    }

    /// Dispatch one inbound request.
    ///
    /// Resolution order: direct commands first, then proxies. The
    /// handler runs on its own task so the loop never blocks on a
    /// pending handler; in-flight requests complete in any order.
    fn dispatch(inner: &Arc<RouterInner>, request: Request, responses: mpsc::Sender<Response>) {
        let Request {
            request_id,
            command,
            args,
        } = request;
        let responder = Responder {
            request_id,
            responses,
            inner: inner.clone(),
        };

        // At most one arm resolves: the effective namespace is unique.
        let resolved = {
            let regs = inner.registries.lock();
            if let Some(handler) = regs.commands.resolve(&command) {
                Some(Resolved::Command(handler))
            } else {
                regs.proxies
                    .resolve(&command)
                    .map(|(target, method)| Resolved::Proxy(target, method))
            }
        };

        match resolved {
            None => {
                let payload = ErrorPayload::not_found(&command);
                tokio::spawn(async move {
                    responder.complete(Err(payload)).await;
                });
            }
            Some(Resolved::Command(handler)) => {
                tokio::spawn(async move {
                    let outcome = handler(args).await.map_err(ErrorPayload::from);
                    responder.complete(outcome).await;
                });
            }
            Some(Resolved::Proxy(target, method)) => {
                tokio::spawn(async move {
                    let outcome = target.invoke(&method, args).await.map_err(ErrorPayload::from);
                    responder.complete(outcome).await;
                });
            }
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

/// Single-shot completion for one request.
///
/// Consumed by value, so exactly one response per request id is the
/// only representable behavior. A responder that observes the closed
/// flag discards its response instead of sending.
struct Responder {
    request_id: String,
    responses: mpsc::Sender<Response>,
    inner: Arc<RouterInner>,
}

impl Responder {
    async fn complete(self, outcome: Result<Value, ErrorPayload>) {
        if self.inner.closed.load(Ordering::Relaxed) {
            tracing::debug!(
                request_id = %self.request_id,
                "discarding response for closed endpoint"
            );
            return;
        }
        let response = match outcome {
            Ok(value) => Response::ok(self.request_id, value),
            Err(error) => Response::err(self.request_id, error),
        };
        if self.responses.send(response).await.is_err() {
            tracing::debug!("response channel gone before completion");
        }
    }
}
