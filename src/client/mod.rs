//! Client stub: promise-like invocation for UI code.
//!
//! Allocates a fresh request id per call, tracks pending calls keyed by
//! id, and resolves each one when the matching response arrives —
//! strictly by correlation, never by arrival order. When the endpoint
//! closes, every pending call rejects with
//! [`CallError::EndpointClosed`] instead of hanging.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::ipc::protocol::{Request, NOT_FOUND_KIND};
use crate::ipc::transport::ClientChannel;
use crate::router::error::HandlerError;

/// Why an invocation failed, as seen by UI code
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// Nothing is registered under the attempted command name
    #[error("{message}")]
    NotFound { message: String },

    /// The handler ran and failed; kind and message are preserved
    #[error("{0}")]
    Handler(HandlerError),

    /// The endpoint closed before this call completed
    #[error("endpoint closed before the call completed")]
    EndpointClosed,

    /// The request could not be handed to the transport
    #[error("transport error: {0}")]
    Transport(String),
}

type PendingCalls = HashMap<String, oneshot::Sender<Result<Value, CallError>>>;

/// Call-by-name interface over the client half of a channel.
///
/// Cheap to clone; clones share the pending-call table and the
/// underlying channel.
#[derive(Clone)]
pub struct ClientStub {
    requests: mpsc::Sender<Request>,
    pending: Arc<Mutex<PendingCalls>>,
    closed: Arc<AtomicBool>,
}

impl ClientStub {
    /// Take ownership of the client channel half and start the
    /// response pump
    pub fn new(channel: ClientChannel) -> Self {
        let ClientChannel {
            requests,
            mut responses,
        } = channel;
        let pending: Arc<Mutex<PendingCalls>> = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));

        let pump_pending = pending.clone();
        let pump_closed = closed.clone();
        tokio::spawn(async move {
            while let Some(response) = responses.recv().await {
                let (request_id, outcome) = response.into_outcome();
                let waiter = pump_pending.lock().remove(&request_id);
                match waiter {
                    Some(tx) => {
                        let _ = tx.send(outcome.map_err(|payload| {
                            if payload.kind == NOT_FOUND_KIND {
                                CallError::NotFound {
                                    message: payload.message,
                                }
                            } else {
                                CallError::Handler(HandlerError::new(payload.kind, payload.message))
                            }
                        }));
                    }
                    None => {
                        // Request ids are single-use; a second response
                        // for the same id, or one for an abandoned
                        // call, is dropped here.
                        tracing::debug!(
                            request_id = %request_id,
                            "dropping response with no pending call"
                        );
                    }
                }
            }
            // Endpoint closed: reject everything still pending. The
            // flag flips before draining so a racing `invoke` either
            // sees it or lands in the table before the drain.
            pump_closed.store(true, Ordering::SeqCst);
            let abandoned: Vec<_> = pump_pending.lock().drain().collect();
            if !abandoned.is_empty() {
                tracing::debug!(count = abandoned.len(), "rejecting pending calls on teardown");
            }
            for (_, tx) in abandoned {
                let _ = tx.send(Err(CallError::EndpointClosed));
            }
        });

        Self {
            requests,
            pending,
            closed,
        }
    }

    /// Whether endpoint teardown has been observed
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Invoke a command or proxy method by name.
    ///
    /// Resolves with the handler's result, or rejects with the remote
    /// error, with [`CallError::EndpointClosed`] if the endpoint goes
    /// away first, or with [`CallError::Transport`] if the request
    /// could not be sent at all. Concurrent calls may complete in any
    /// order.
    pub async fn invoke(&self, command: &str, args: Vec<Value>) -> Result<Value, CallError> {
        if self.is_closed() {
            return Err(CallError::EndpointClosed);
        }

        let request = Request::new(command, args);
        let request_id = request.request_id.clone();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(request_id.clone(), tx);

        if self.requests.send(request).await.is_err() {
            // The request never left the process
            self.pending.lock().remove(&request_id);
            return Err(CallError::Transport(format!(
                "request channel closed before {command} was sent"
            )));
        }

        // Teardown may have raced the insert above; if the pump already
        // drained the table, reject our own entry.
        if self.is_closed() {
            if let Some(tx) = self.pending.lock().remove(&request_id) {
                let _ = tx.send(Err(CallError::EndpointClosed));
            }
        }

        match rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(CallError::EndpointClosed),
        }
    }
}
