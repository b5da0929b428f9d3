//! Error taxonomy for registration and handler execution.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ipc::protocol::ErrorPayload;

/// Registration-time failure.
///
/// Surfaced synchronously to host setup code; the failing call never
/// leaves partial entries behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegisterError {
    /// The command name is already in the effective namespace
    #[error("command already registered: {name}")]
    DuplicateCommand { name: String },

    /// The proxy name is already registered
    #[error("proxy already registered: {name}")]
    DuplicateProxy { name: String },

    /// A derived `proxy.method` name collides with an existing entry
    #[error("name collides with an existing entry: {name}")]
    NamespaceCollision { name: String },

    /// The router has closed; its namespace no longer accepts entries
    #[error("router is closed")]
    Closed,
}

/// Structured failure raised while executing a resolved handler or
/// capability method.
///
/// Crosses the process boundary verbatim as kind + message, so the UI
/// side can distinguish error categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{kind}: {message}")]
pub struct HandlerError {
    pub kind: String,
    pub message: String,
}

impl HandlerError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl From<HandlerError> for ErrorPayload {
    fn from(err: HandlerError) -> Self {
        ErrorPayload::new(err.kind, err.message)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_register_error_messages_name_the_entry() {
        let err = RegisterError::DuplicateCommand {
            name: "RELOAD_APP".into(),
        };
        assert_eq!(err.to_string(), "command already registered: RELOAD_APP");

        let err = RegisterError::NamespaceCollision {
            name: "LocalFileSystem.readText".into(),
        };
        assert!(err.to_string().contains("LocalFileSystem.readText"));
    }

    #[test]
    fn test_handler_error_converts_to_payload_verbatim() {
        let err = HandlerError::new("IoError", "/tmp/x: permission denied");
        let payload = ErrorPayload::from(err.clone());
        assert_eq!(payload.kind, err.kind);
        assert_eq!(payload.message, err.message);
    }
}
