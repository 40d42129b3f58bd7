//! A transport-agnostic, bidirectional JSON-RPC peer.
//!
//! Both ends of one connection are symmetric: each side can register
//! methods for the other to call ([`MethodRegistry`]) and call the other's
//! methods itself ([`PeerHandle::call`]). [`Peer::run`] drives both
//! directions at once over whatever duplex stream of decoded JSON values the
//! caller hands it — this crate knows nothing about WebSockets, only about
//! [`piercer_protocol`]'s message shapes.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod err;
mod peer;
mod registry;

pub use err::{PeerError, TransportClosed};
pub use peer::{Peer, PeerHandle};
pub use registry::{Handler, MethodRegistry, MethodResult};
