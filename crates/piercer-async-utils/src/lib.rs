//! Async/futures helpers shared by the controller and agent.
//!
//! Small, focused pieces that the RPC peer and transport layers both need:
//! a fused oneshot channel for use in `select!`, and a `Sink` adapter that
//! maps items through a fallible function.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod sinkext;

pub mod oneshot;

pub use sinkext::SinkExt;
