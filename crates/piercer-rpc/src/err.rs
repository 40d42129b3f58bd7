//! Errors produced by a running [`crate::Peer`].

use std::sync::Arc;

use piercer_error::{ErrorKind, HasKind};

/// A failure that ends a peer's dispatch loop.
#[derive(Clone, Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PeerError {
    /// The transport's read side returned an error or closed.
    #[error("transport read failed")]
    ReadFailed(#[source] Arc<dyn std::error::Error + Send + Sync>),
    /// The transport's write side returned an error.
    #[error("transport write failed")]
    WriteFailed(#[source] Arc<dyn std::error::Error + Send + Sync>),
    /// A frame could not be parsed as a request, response, or notification.
    #[error("malformed frame: {0}")]
    Decode(#[source] Arc<serde_json::Error>),
}

impl HasKind for PeerError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::TransportClosed
    }
}

/// A failure reported when a caller's pending request cannot be completed.
///
/// Raised when the peer's dispatch loop exits (transport closed) while a
/// [`crate::RemoteCaller`] call is still outstanding.
#[derive(Clone, Debug, thiserror::Error)]
#[error("transport closed")]
pub struct TransportClosed;

impl HasKind for TransportClosed {
    fn kind(&self) -> ErrorKind {
        ErrorKind::TransportClosed
    }
}
