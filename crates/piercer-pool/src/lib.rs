//! The agent's pool of per-model inference worker processes.
//!
//! Each worker is an opaque child process speaking the same one-JSON-value-
//! per-frame JSON-RPC dialect as the controller/agent link, carried over its
//! stdio instead of a WebSocket: the pool calls into it to start jobs, and
//! it calls back to report streamed output. [`Pool`] owns the worker
//! lifecycles; [`PoolSink`] is where a caller (the agent binary) plugs in
//! forwarding of that output on to the controller, with no buffering in
//! between.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod err;
mod pool;
mod sink;
mod transport;
mod worker;

pub use err::PoolError;
pub use pool::Pool;
pub use sink::PoolSink;
pub use worker::{CommandSpawner, WorkerSpawner, WorkerState};
