//! Wire protocol for taglab host ↔ UI communication
//!
//! Uses newline-delimited JSON (ndjson) for bidirectional messaging.
//! Field names are camelCase on the wire to match the UI side.

use std::path::PathBuf;

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error kind reported when a command name resolves to nothing.
pub const NOT_FOUND_KIND: &str = "NotFoundError";

/// Get the base runtime directory, preferring XDG_RUNTIME_DIR for security
pub fn state_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_RUNTIME_DIR") {
        PathBuf::from(xdg).join("taglab")
    } else {
        let uid = unsafe { libc::getuid() };
        PathBuf::from(format!("/tmp/taglab-{}", uid))
    }
}

/// Get the UI channel socket path
pub fn socket_path() -> PathBuf {
    state_dir().join("ui.sock")
}

/// Request envelope sent from the UI client to the host.
///
/// `command` is either a directly registered name (`"RELOAD_APP"`) or a
/// qualified proxy method (`"LocalFileSystem.readText"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// Correlation token, unique per call, minted by the client stub
    pub request_id: String,
    /// Name in the router's effective command namespace
    pub command: String,
    /// JSON-compatible positional arguments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Value>,
}

impl Request {
    /// Build a request with a fresh UUIDv4 request id
    pub fn new(command: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            command: command.into(),
            args,
        }
    }
}

/// Structured error carried in a response envelope.
///
/// `kind` survives the process boundary verbatim so the client can
/// distinguish error categories rather than matching on message text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub kind: String,
    pub message: String,
}

impl ErrorPayload {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Payload for an unresolved command name
    pub fn not_found(command: &str) -> Self {
        Self::new(
            NOT_FOUND_KIND,
            format!("no command registered under name: {command}"),
        )
    }
}

/// Response envelope sent from the host back to the UI client.
///
/// Carries exactly one of `result` or `error`; the constructors below
/// are the only way this crate produces one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    /// Correlation token echoed from the request
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorPayload>,
}

impl Response {
    /// Successful response carrying `result`
    pub fn ok(request_id: impl Into<String>, result: Value) -> Self {
        Self {
            request_id: request_id.into(),
            result: Some(result),
            error: None,
        }
    }

    /// Failed response carrying a structured error
    pub fn err(request_id: impl Into<String>, error: ErrorPayload) -> Self {
        Self {
            request_id: request_id.into(),
            result: None,
            error: Some(error),
        }
    }

    /// Split into the correlation id and the call outcome
    pub fn into_outcome(self) -> (String, Result<Value, ErrorPayload>) {
        let outcome = match self.error {
            Some(error) => Err(error),
            None => Ok(self.result.unwrap_or(Value::Null)),
        };
        (self.request_id, outcome)
    }
}

/// Encode a message as ndjson (JSON + newline)
pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>> {
    let mut json = serde_json::to_vec(msg)?;
    json.push(b'\n');
    Ok(json)
}

/// Decode a message from a JSON line
pub fn decode<T: DeserializeOwned>(line: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(line)?)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_request_wire_shape_is_camel_case() {
        let req = Request {
            request_id: "1".into(),
            command: "RELOAD_APP".into(),
            args: vec![],
        };
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, r#"{"requestId":"1","command":"RELOAD_APP"}"#);
    }

    #[test]
    fn test_request_args_default_to_empty() {
        let req: Request = decode(br#"{"requestId":"2","command":"X"}"#).unwrap();
        assert_eq!(req.request_id, "2");
        assert!(req.args.is_empty());
    }

    #[test]
    fn test_request_new_mints_unique_ids() {
        let a = Request::new("X", vec![]);
        let b = Request::new("X", vec![]);
        assert_ne!(a.request_id, b.request_id);
    }

    #[test]
    fn test_response_carries_result_xor_error() {
        let ok = Response::ok("1", json!(true));
        assert!(ok.result.is_some() && ok.error.is_none());
        let json = serde_json::to_string(&ok).unwrap();
        assert_eq!(json, r#"{"requestId":"1","result":true}"#);

        let err = Response::err("2", ErrorPayload::not_found("Unknown.Thing"));
        assert!(err.result.is_none() && err.error.is_some());
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains(r#""kind":"NotFoundError""#));
        assert!(json.contains("Unknown.Thing"));
    }

    #[test]
    fn test_into_outcome() {
        let (id, outcome) = Response::ok("1", json!(42)).into_outcome();
        assert_eq!(id, "1");
        assert_eq!(outcome.unwrap(), json!(42));

        let (_, outcome) = Response::err("2", ErrorPayload::new("IoError", "boom")).into_outcome();
        assert_eq!(outcome.unwrap_err().kind, "IoError");
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let req = Request::new("LocalFileSystem.readText", vec![json!("/tmp/x")]);
        let encoded = encode(&req).unwrap();
        assert!(encoded.ends_with(b"\n"));
        let decoded: Request = decode(encoded.trim_ascii_end()).unwrap();
        assert_eq!(decoded, req);
    }

    #[test]
    fn test_state_dir_default() {
        // Without XDG_RUNTIME_DIR, should use /tmp/taglab-UID
        temp_env::with_var_unset("XDG_RUNTIME_DIR", || {
            let dir = state_dir();
            let uid = unsafe { libc::getuid() };
            assert_eq!(dir, PathBuf::from(format!("/tmp/taglab-{}", uid)));
        });
    }

    #[test]
    fn test_state_dir_with_xdg() {
        temp_env::with_var("XDG_RUNTIME_DIR", Some("/run/user/1000"), || {
            let dir = state_dir();
            assert_eq!(dir, PathBuf::from("/run/user/1000/taglab"));
        });
    }

    #[test]
    fn test_socket_path_contains_ui_sock() {
        let path = socket_path();
        assert!(path.ends_with("ui.sock"));
    }
}
