//! WebSocket transport: one JSON document per frame, no length prefix.
//!
//! Two constructors mirror the two roles a connection can play:
//! [`connect`] dials out to a controller URL ([`ClientTransport`]); the
//! controller's HTTP layer instead takes an already-upgraded
//! [`axum::extract::ws::WebSocket`] and wraps it with
//! [`ServerTransport::new`]. Both sides implement the same
//! `Stream<Item = Result<Value, TransportError>> + Sink<Value, Error =
//! TransportError>` shape that [`piercer_rpc::Peer::run`] expects; this
//! crate never retries a dropped connection; that is the supervisor's job.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod client;
mod server;

pub use client::{connect, ClientTransport};
pub use server::ServerTransport;

use thiserror::Error;

/// Close code used to evict a prior connection that shared an agent id.
///
/// The evicted side must not reconnect.
pub const CLOSE_EVICTED: u16 = 1001;
/// Close code used when the agent upgrade's bearer token was rejected.
///
/// The rejected side must not reconnect.
pub const CLOSE_AUTH_FAILED: u16 = 1008;

/// A failure reading or writing a frame on the transport.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The underlying WebSocket connection failed.
    #[error("websocket error: {0}")]
    Socket(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// A frame was not a single well-formed JSON document.
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),
    /// The peer closed the connection.
    #[error("connection closed (code {0:?})")]
    Closed(Option<u16>),
}
