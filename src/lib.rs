//! taglab-ipc — cross-process command/proxy router for the TagLab
//! desktop labeling application.
//!
//! TagLab runs as two processes: a privileged **host** that owns system
//! resources and a sandboxed UI **client**. The client invokes named
//! operations (and methods of host-side capability objects) through a
//! [`Router`] bound to one ordered, bidirectional channel per window.
//! Results and structured errors travel back correlated by request id;
//! when the window closes, every registration belonging to that router
//! is torn down in bulk and no further request is serviced.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use taglab_ipc::{ipc::transport, ClientStub, LocalFileSystem, Router};
//!
//! let (host_half, client_half) = transport::pair(64);
//!
//! // Host side: one router per window.
//! let router = Router::new();
//! router.register_fn("APP_VERSION", |_args| Ok("0.4.0".into()))?;
//! router.register_proxy("LocalFileSystem", Arc::new(LocalFileSystem::new()))?;
//! router.bind(host_half, shell)?;
//!
//! // Client side: promise-like calls by name.
//! let stub = ClientStub::new(client_half);
//! let text = stub.invoke("LocalFileSystem.readText", vec!["/tmp/x".into()]).await?;
//! ```

pub mod capabilities;
pub mod client;
pub mod ipc;
pub mod router;

pub use capabilities::LocalFileSystem;
pub use client::{CallError, ClientStub};
pub use ipc::protocol::{ErrorPayload, Request, Response};
pub use router::error::{HandlerError, RegisterError};
pub use router::proxy::Capability;
pub use router::{Endpoint, Router, RouterState};
