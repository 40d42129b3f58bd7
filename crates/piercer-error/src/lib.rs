//! Unified error taxonomy shared by the controller and agent.
//!
//! The fleet's failure modes fall into a small number of categories (see the
//! [`ErrorKind`] variants below); most call sites only need to know which
//! bucket an error lands in to decide whether to retry, surface it to an
//! HTTP client, or abort the process.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::missing_docs_in_private_items)]

use derive_more::Display;

mod internal;
pub use internal::*;

mod report;
pub use report::*;

mod retriable;
pub use retriable::*;

mod misc;
pub use misc::*;

/// Classification of an error arising anywhere in the fleet.
///
/// This exists so that call sites far from the origin of an error (an HTTP
/// handler translating a routing failure into a status code, a supervisor
/// deciding whether to reconnect) can act on the *kind* of failure without
/// downcasting to a concrete type. Each kind carries its own recovery
/// policy: local recovery, surfacing to the caller, or process abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Malformed JSON, or a call to a method the peer does not expose.
    ///
    /// Reported back to the caller as a JSON-RPC error; never fatal to the
    /// connection it arrived on.
    #[display("JSON-RPC protocol error")]
    RpcProtocol,

    /// The underlying transport (WebSocket) closed while a request was
    /// outstanding, or could not be written to.
    ///
    /// Every pending request on the affected peer is failed with this kind.
    #[display("transport closed")]
    TransportClosed,

    /// The router could not find an agent or model to satisfy a request.
    ///
    /// Covers unknown public model names, and the case where no connected
    /// agent currently hosts the resolved model.
    #[display("no route for request")]
    RoutingUnavailable,

    /// An agent reported a failure while running inference.
    ///
    /// Surfaced to the HTTP client as an SSE error frame.
    #[display("agent reported an inference error")]
    AgentReported,

    /// The agent's connection to the controller, or one of its model
    /// workers, is permanently unusable (bad credentials, unwritable data
    /// directory, a worker that never became ready).
    ///
    /// The process exits; there is no local recovery.
    #[display("fatal misconfiguration")]
    Fatal,

    /// A condition that is expected to clear up on its own: a dropped
    /// socket, a controller restart, a worker that is still loading.
    ///
    /// Callers should retry, typically with backoff.
    #[display("transient failure")]
    Transient,

    /// A supposedly-impossible condition was reached: a bug in this codebase.
    #[display("internal error (bug)")]
    Internal,

    /// Programmer error: a function was called with arguments that violate
    /// its documented contract.
    #[display("bad API usage (bug)")]
    BadApiUsage,

    /// Unclassified error, for use by code outside this crate that still
    /// needs to produce a [`HasKind`] implementation.
    #[display("unclassified error")]
    Other,
}

impl ErrorKind {
    /// Returns the HTTP status code most appropriate for surfacing this
    /// kind of error to an API client.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorKind::RoutingUnavailable => 503,
            ErrorKind::AgentReported => 502,
            ErrorKind::RpcProtocol | ErrorKind::BadApiUsage => 400,
            ErrorKind::Internal | ErrorKind::Fatal => 500,
            ErrorKind::TransportClosed | ErrorKind::Transient => 503,
            ErrorKind::Other => 500,
        }
    }

    /// Returns the JSON-RPC error code used to carry this kind across the
    /// wire between an agent and the controller.
    ///
    /// These occupy a private sub-range below the reserved JSON-RPC codes
    /// (`-32700`..`-32600`) and above the generic `-32000` "server error"
    /// code, so they never collide with either.
    pub fn rpc_code(&self) -> i64 {
        match self {
            ErrorKind::RpcProtocol => -32010,
            ErrorKind::TransportClosed => -32011,
            ErrorKind::RoutingUnavailable => -32012,
            ErrorKind::AgentReported => -32013,
            ErrorKind::Fatal => -32014,
            ErrorKind::Transient => -32015,
            ErrorKind::Internal => -32016,
            ErrorKind::BadApiUsage => -32017,
            ErrorKind::Other => -32018,
        }
    }

    /// Recovers an [`ErrorKind`] from a code produced by [`ErrorKind::rpc_code`].
    ///
    /// A code outside that range (including the peer's own generic
    /// `-32700`/`-32601`/`-32000` codes) falls back to [`ErrorKind::AgentReported`],
    /// since it means the peer reported an application failure without
    /// classifying it any further.
    pub fn from_rpc_code(code: i64) -> ErrorKind {
        match code {
            -32010 => ErrorKind::RpcProtocol,
            -32011 => ErrorKind::TransportClosed,
            -32012 => ErrorKind::RoutingUnavailable,
            -32013 => ErrorKind::AgentReported,
            -32014 => ErrorKind::Fatal,
            -32015 => ErrorKind::Transient,
            -32016 => ErrorKind::Internal,
            -32017 => ErrorKind::BadApiUsage,
            -32018 => ErrorKind::Other,
            _ => ErrorKind::AgentReported,
        }
    }
}

/// Errors that can be categorized as belonging to an [`ErrorKind`].
pub trait HasKind {
    /// Return the kind of this error.
    fn kind(&self) -> ErrorKind;
}

impl HasKind for futures::task::SpawnError {
    fn kind(&self) -> ErrorKind {
        if self.is_shutdown() {
            ErrorKind::Transient
        } else {
            ErrorKind::Internal
        }
    }
}

impl HasKind for void::Void {
    fn kind(&self) -> ErrorKind {
        void::unreachable(*self)
    }
}

impl HasKind for std::convert::Infallible {
    fn kind(&self) -> ErrorKind {
        unreachable!()
    }
}
