//! Wire types for the JSON-RPC dialect spoken between the controller and
//! agents.
//!
//! Both ends of a connection are peers: either side can send a [`Request`]
//! and expect a [`Response`] addressed back by [`RequestId`]. Params are
//! always a positional JSON array, never a named object, matching the
//! convention [`piercer-rpc`](https://docs.rs/piercer-rpc) builds its
//! dispatcher around. This crate only describes the shapes on the wire; it
//! knows nothing about transports or dispatch.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod methods;
pub mod params;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC error code for a request that could not be parsed as JSON at all.
pub const PARSE_ERROR: i64 = -32700;
/// JSON-RPC error code for a method name with no registered handler.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// JSON-RPC error code for a handler that returned a failure.
pub const INTERNAL_ERROR: i64 = -32000;

/// An identifier for a [`Request`], echoed verbatim in its [`Response`].
///
/// The caller mints these; any unique string or integer is acceptable, and
/// the receiver never inspects it beyond echoing it back. Most call sites in
/// this fleet use an incrementing per-peer counter turned into a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// A caller-provided string id.
    Str(String),
    /// A caller-provided integer id.
    Int(i64),
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestId::Str(s) => write!(f, "{s}"),
            RequestId::Int(i) => write!(f, "{i}"),
        }
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        RequestId::Str(s)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::Str(s.to_owned())
    }
}

/// A request to invoke `method` with positional `params`.
///
/// Sent by either peer; which one is "client" or "server" for a given
/// connection depends only on who dialed it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Always the literal string `"2.0"`.
    pub jsonrpc: JsonRpcVersion,
    /// Name of the method to invoke.
    pub method: String,
    /// Positional arguments, in call order.
    #[serde(default)]
    pub params: Vec<Value>,
    /// Identifier this request's response will be addressed to.
    pub id: RequestId,
}

impl Request {
    /// Build a new request with the given method, params, and id.
    pub fn new(method: impl Into<String>, params: Vec<Value>, id: RequestId) -> Self {
        Request {
            jsonrpc: JsonRpcVersion,
            method: method.into(),
            params,
            id,
        }
    }
}

/// A notification: a request with no `id`, whose sender expects no response.
///
/// Reserved for future use by the wire format this fleet speaks; a peer that
/// receives one must ignore it rather than treat it as malformed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Always the literal string `"2.0"`.
    pub jsonrpc: JsonRpcVersion,
    /// Name of the notified method.
    pub method: String,
    /// Positional arguments, in call order.
    #[serde(default)]
    pub params: Vec<Value>,
}

/// A reply to a [`Request`], carrying either a result or an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Always the literal string `"2.0"`.
    pub jsonrpc: JsonRpcVersion,
    /// Id of the request this responds to.
    pub id: RequestId,
    /// The outcome: success or failure.
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl Response {
    /// Build a successful response.
    pub fn success(id: RequestId, result: Value) -> Self {
        Response {
            jsonrpc: JsonRpcVersion,
            id,
            outcome: Outcome::Result { result },
        }
    }

    /// Build a failure response with the given code and message.
    pub fn error(id: RequestId, code: i64, message: impl Into<String>) -> Self {
        Response {
            jsonrpc: JsonRpcVersion,
            id,
            outcome: Outcome::Error {
                error: RpcError {
                    code,
                    message: message.into(),
                },
            },
        }
    }

    /// Returns the `Ok(result)` or `Err(error)` this response carries.
    pub fn into_result(self) -> Result<Value, RpcError> {
        match self.outcome {
            Outcome::Result { result } => Ok(result),
            Outcome::Error { error } => Err(error),
        }
    }
}

/// The `result` or `error` half of a [`Response`].
///
/// Untagged so that, flattened into [`Response`], it serializes as a bare
/// `result` or `error` field rather than a wrapper object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Outcome {
    /// The call succeeded; this is its return value.
    Result {
        /// The method's return value.
        result: Value,
    },
    /// The call failed.
    Error {
        /// The failure code and message.
        error: RpcError,
    },
}

/// A JSON-RPC error object: a numeric code and a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("rpc error {code}: {message}")]
pub struct RpcError {
    /// Machine-readable failure code. See [`PARSE_ERROR`], [`METHOD_NOT_FOUND`],
    /// [`INTERNAL_ERROR`] for the codes this fleet's peers generate locally;
    /// method handlers may also choose a code of their own.
    pub code: i64,
    /// Human-readable description of the failure.
    pub message: String,
}

/// A message read off the wire, before it is known whether it is a request,
/// a notification, or a response.
///
/// JSON-RPC does not tag a frame's shape explicitly, so a peer decodes
/// incoming bytes into this enum and dispatches on which variant matched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IncomingMessage {
    /// A call expecting a response.
    Request(Request),
    /// A reply to a call this peer made earlier.
    Response(Response),
    /// A call with no `id`, expecting no response.
    Notification(Notification),
}

/// A zero-sized marker that (de)serializes as the literal string `"2.0"`.
///
/// Keeps the fixed protocol tag out of every constructor while still
/// round-tripping through serde as a real field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JsonRpcVersion;

impl Serialize for JsonRpcVersion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str("2.0")
    }
}

impl<'de> Deserialize<'de> for JsonRpcVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if s == "2.0" {
            Ok(JsonRpcVersion)
        } else {
            Err(serde::de::Error::custom(format!(
                "unsupported jsonrpc version {s:?}"
            )))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn request_round_trips() {
        let req = Request::new("chat", vec![Value::String("hi".into())], "r1".into());
        let s = serde_json::to_string(&req).unwrap();
        let back: Request = serde_json::from_str(&s).unwrap();
        assert_eq!(back.method, "chat");
        assert_eq!(back.id, RequestId::Str("r1".into()));
    }

    #[test]
    fn incoming_message_distinguishes_shapes() {
        let req = r#"{"jsonrpc":"2.0","method":"status","params":[],"id":"5"}"#;
        match serde_json::from_str::<IncomingMessage>(req).unwrap() {
            IncomingMessage::Request(r) => assert_eq!(r.method, "status"),
            other => panic!("expected Request, got {other:?}"),
        }

        let resp = r#"{"jsonrpc":"2.0","result":{},"id":"5"}"#;
        match serde_json::from_str::<IncomingMessage>(resp).unwrap() {
            IncomingMessage::Response(r) => {
                assert_eq!(r.into_result().unwrap(), Value::Object(Default::default()))
            }
            other => panic!("expected Response, got {other:?}"),
        }

        let err = r#"{"jsonrpc":"2.0","error":{"code":-32601,"message":"nope"},"id":"5"}"#;
        match serde_json::from_str::<IncomingMessage>(err).unwrap() {
            IncomingMessage::Response(r) => {
                let e = r.into_result().unwrap_err();
                assert_eq!(e.code, -32601);
            }
            other => panic!("expected Response, got {other:?}"),
        }

        let notif = r#"{"jsonrpc":"2.0","method":"updateModels","params":[]}"#;
        match serde_json::from_str::<IncomingMessage>(notif).unwrap() {
            IncomingMessage::Notification(n) => assert_eq!(n.method, "updateModels"),
            other => panic!("expected Notification, got {other:?}"),
        }
    }

    #[test]
    fn rejects_other_jsonrpc_versions() {
        let bad = r#"{"jsonrpc":"1.0","method":"status","params":[],"id":"5"}"#;
        assert!(serde_json::from_str::<Request>(bad).is_err());
    }
}
