//! Forwards a worker's streamed output to whichever controller connection
//! is currently live.
//!
//! The pool and its loaded workers outlive any one WebSocket connection;
//! [`ForwardingSink::set_handle`] is how the supervisor repoints output at a
//! fresh [`PeerHandle`] after each reconnect without touching the pool.

use std::sync::Mutex;

use futures::future::BoxFuture;
use piercer_protocol::{
    methods,
    params::{AsParams as _, CompletionData, ErrorContext, ErrorParams, ReceiveCompletionParams},
};
use piercer_pool::PoolSink;
use piercer_rpc::PeerHandle;
use serde_json::Value;

/// A [`PoolSink`] that relays every callback as a `receiveCompletion` or
/// `error` call on whatever controller connection is currently set.
///
/// Callbacks made while no connection is live (between a drop and the next
/// successful reconnect) are silently lost: the request that produced them
/// belongs to a worker job the pool has already committed to, and nothing
/// downstream is still listening for its mid-flight output.
pub struct ForwardingSink {
    agent_id: String,
    current: Mutex<Option<PeerHandle>>,
}

impl ForwardingSink {
    /// Build a sink with no connection set yet.
    pub fn new(agent_id: String) -> Self {
        ForwardingSink {
            agent_id,
            current: Mutex::new(None),
        }
    }

    /// Point subsequent callbacks at `handle`, or stop forwarding if `None`.
    pub fn set_handle(&self, handle: Option<PeerHandle>) {
        *self.current.lock().expect("poisoned") = handle;
    }

    fn handle(&self) -> Option<PeerHandle> {
        self.current.lock().expect("poisoned").clone()
    }
}

impl PoolSink for ForwardingSink {
    fn on_chunk(&self, request_id: String, data: Value) -> BoxFuture<'static, ()> {
        self.deliver(request_id, CompletionData::Chunk(data))
    }

    fn on_complete(&self, request_id: String, _data: Option<Value>) -> BoxFuture<'static, ()> {
        self.deliver(request_id, CompletionData::done())
    }

    fn on_error(&self, request_id: String, error: String) -> BoxFuture<'static, ()> {
        let Some(handle) = self.handle() else {
            return Box::pin(async {});
        };
        let params = ErrorParams {
            error,
            agent_id: self.agent_id.clone(),
            context: ErrorContext { request_id },
        };
        Box::pin(async move {
            let _ = handle.call(methods::ERROR, params.as_params()).await;
        })
    }
}

impl ForwardingSink {
    fn deliver(&self, request_id: String, data: CompletionData) -> BoxFuture<'static, ()> {
        let Some(handle) = self.handle() else {
            return Box::pin(async {});
        };
        let params = ReceiveCompletionParams {
            agent_id: self.agent_id.clone(),
            request_id,
            data,
        };
        Box::pin(async move {
            let _ = handle.call(methods::RECEIVE_COMPLETION, params.as_params()).await;
        })
    }
}
