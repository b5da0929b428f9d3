//! IPC layer for host ↔ UI-client communication
//!
//! Uses newline-delimited JSON (ndjson) envelopes over an ordered,
//! bidirectional channel. Ships a Unix-domain-socket carrier plus an
//! in-process channel pair for embedding and tests.

pub mod protocol;
pub mod transport;

pub use protocol::{ErrorPayload, Request, Response};
pub use transport::{ClientChannel, HostChannel, HostListener};
