//! Callback surface the pool forwards a worker's streamed output to.
//!
//! The agent binary implements this to relay chunks onward to the
//! controller over its own RPC peer; the pool itself buffers nothing, per
//! the thin-agent rule.

use futures::future::BoxFuture;
use serde_json::Value;

/// Where a [`crate::Pool`] forwards a worker's streaming output.
pub trait PoolSink: Send + Sync {
    /// One chunk of an in-progress completion.
    fn on_chunk(&self, request_id: String, data: Value) -> BoxFuture<'static, ()>;
    /// The completion finished, optionally carrying one final chunk.
    fn on_complete(&self, request_id: String, data: Option<Value>) -> BoxFuture<'static, ()>;
    /// The completion failed.
    fn on_error(&self, request_id: String, error: String) -> BoxFuture<'static, ()>;
}
