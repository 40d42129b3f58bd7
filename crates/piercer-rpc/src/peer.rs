//! The bidirectional JSON-RPC peer: one per connection, serving local
//! methods to the remote side while exposing a typed way to call the
//! remote's methods back.

use std::{collections::HashMap, sync::Arc, sync::Mutex};

use futures::{
    channel::mpsc,
    stream::{FusedStream, FuturesUnordered},
    FutureExt, Sink, SinkExt as _, Stream, StreamExt as _,
};
use piercer_async_utils::oneshot;
use piercer_protocol::{IncomingMessage, Request, RequestId, Response, RpcError};
use serde_json::Value;

use crate::{err::PeerError, registry::MethodRegistry, TransportClosed};

/// How many outgoing calls or finished handler results may be queued before
/// a peer starts applying backpressure.
const CHAN_SIZE: usize = 128;

/// Build a `-32700` error frame for a frame that could not be read as JSON
/// or did not match any known message shape.
///
/// The id is unknown (that's the nature of the failure), so this is built
/// as a raw [`Value`] with `id: null` rather than through [`Response`],
/// whose `id` field requires a real [`RequestId`].
fn parse_error_frame(message: impl Into<String>) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": Value::Null,
        "error": { "code": piercer_protocol::PARSE_ERROR, "message": message.into() },
    })
}

/// A command sent from a [`PeerHandle`] into the peer's dispatch loop.
enum Command {
    /// Send `request` on the wire and deliver its eventual response through
    /// `respond`.
    Call {
        request: Request,
        respond: oneshot::Sender<Result<Value, RpcError>>,
    },
}

/// A clonable handle used to call the remote side's methods.
///
/// Obtained from [`Peer::new`] alongside the peer itself; the peer consumes
/// [`Peer::run`] in its own task while every clone of the handle can keep
/// issuing calls for as long as that task is alive.
#[derive(Clone)]
pub struct PeerHandle {
    tx_cmd: mpsc::Sender<Command>,
    next_id: Arc<std::sync::atomic::AtomicU64>,
}

impl PeerHandle {
    /// Call `method` on the remote side with positional `params`, and await
    /// its result.
    ///
    /// Resolves to [`TransportClosed`] if the peer's dispatch loop has
    /// already exited.
    pub async fn call(
        &self,
        method: impl Into<String>,
        params: Vec<Value>,
    ) -> Result<Result<Value, RpcError>, TransportClosed> {
        let id = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let request = Request::new(method, params, RequestId::Int(id as i64));
        let (respond, recv) = oneshot::channel();
        self.tx_cmd
            .clone()
            .send(Command::Call { request, respond })
            .await
            .map_err(|_| TransportClosed)?;
        recv.await.map_err(|_| TransportClosed)
    }
}

/// One endpoint of a bidirectional JSON-RPC connection.
///
/// Owns no transport of its own: [`Peer::run`] is handed a decoded message
/// stream and an encoded message sink, and drives the dispatch loop until
/// either side closes or a framing error occurs. Spawn it onto the runtime's
/// executor; use the paired [`PeerHandle`] to issue outgoing calls while it
/// runs.
pub struct Peer {
    registry: MethodRegistry,
    rx_cmd: mpsc::Receiver<Command>,
}

impl Peer {
    /// Build a new peer serving `registry`'s methods, and a handle to call
    /// the remote side's methods.
    pub fn new(registry: MethodRegistry) -> (Self, PeerHandle) {
        let (tx_cmd, rx_cmd) = mpsc::channel(CHAN_SIZE);
        let handle = PeerHandle {
            tx_cmd,
            next_id: Arc::new(std::sync::atomic::AtomicU64::new(0)),
        };
        (Peer { registry, rx_cmd }, handle)
    }

    /// Run the dispatch loop until the transport closes or errors.
    ///
    /// `input` yields one decoded JSON [`Value`] per frame; `output` accepts
    /// one JSON [`Value`] per frame to send. Both directions are driven
    /// concurrently: incoming requests are dispatched against `registry`
    /// while outgoing calls placed through the paired [`PeerHandle`] are
    /// written out and tracked until their response arrives.
    pub async fn run<IN, OUT, E>(mut self, mut input: IN, mut output: OUT) -> Result<(), PeerError>
    where
        IN: Stream<Item = Result<Value, E>> + FusedStream + Unpin + Send,
        OUT: Sink<Value, Error = E> + Unpin + Send,
        E: std::error::Error + Send + Sync + 'static,
    {
        let pending: Arc<Mutex<HashMap<RequestId, oneshot::Sender<Result<Value, RpcError>>>>> =
            Arc::new(Mutex::new(HashMap::new()));

        let (tx_finished, mut rx_finished) = mpsc::channel::<Response>(CHAN_SIZE);
        let mut running_handlers = FuturesUnordered::new();
        running_handlers.push(futures::future::pending().boxed());

        let result = loop {
            futures::select! {
                _ = running_handlers.next() => {}

                finished = rx_finished.next() => {
                    let response = finished.expect("tx_finished sender outlives the loop");
                    let value = serde_json::to_value(&response).expect("Response always serializes");
                    if let Err(e) = output.send(value).await {
                        break Err(PeerError::WriteFailed(Arc::new(e)));
                    }
                }

                cmd = self.rx_cmd.next() => {
                    match cmd {
                        None => {}
                        Some(Command::Call { request, respond }) => {
                            pending.lock().expect("poisoned").insert(request.id.clone(), respond);
                            let value = serde_json::to_value(&request).expect("Request always serializes");
                            if let Err(e) = output.send(value).await {
                                break Err(PeerError::WriteFailed(Arc::new(e)));
                            }
                        }
                    }
                }

                msg = input.next() => {
                    match msg {
                        None => break Ok(()),
                        Some(Err(e)) => {
                            // A single malformed frame is a protocol error, not a
                            // transport failure: report it and keep serving the
                            // connection rather than failing every pending call.
                            if let Err(e) = output.send(parse_error_frame(e.to_string())).await {
                                break Err(PeerError::WriteFailed(Arc::new(e)));
                            }
                        }
                        Some(Ok(value)) => {
                            match serde_json::from_value::<IncomingMessage>(value) {
                                Err(e) => {
                                    if let Err(e) = output.send(parse_error_frame(e.to_string())).await {
                                        break Err(PeerError::WriteFailed(Arc::new(e)));
                                    }
                                }
                                Ok(IncomingMessage::Notification(n)) => {
                                    tracing::debug!(method = %n.method, "ignoring notification");
                                }
                                Ok(IncomingMessage::Response(resp)) => {
                                    if let Some(tx) = pending.lock().expect("poisoned").remove(&resp.id) {
                                        let _ = tx.send(resp.into_result());
                                    } else {
                                        tracing::debug!(id = %resp.id, "response for unknown request id");
                                    }
                                }
                                Ok(IncomingMessage::Request(req)) => {
                                    let tx_finished = tx_finished.clone();
                                    let handler = self.registry.get(&req.method);
                                    running_handlers.push(Self::dispatch(req, handler, tx_finished).boxed());
                                }
                            }
                        }
                    }
                }
            }
        };

        // Every request still waiting for a reply fails with "transport closed".
        for (_, tx) in pending.lock().expect("poisoned").drain() {
            let _ = tx.send(Err(RpcError {
                code: piercer_protocol::INTERNAL_ERROR,
                message: "transport closed".into(),
            }));
        }

        result
    }

    /// Run one incoming request's handler (or a "method not found" error)
    /// and deliver its response over `tx_finished`.
    async fn dispatch(
        req: Request,
        handler: Option<crate::registry::Handler>,
        mut tx_finished: mpsc::Sender<Response>,
    ) {
        let response = match handler {
            None => Response::error(
                req.id,
                piercer_protocol::METHOD_NOT_FOUND,
                format!("no such method: {}", req.method),
            ),
            Some(handler) => match handler(req.params).await {
                Ok(result) => Response::success(req.id, result),
                Err(e) => Response::error(req.id, e.code, e.message),
            },
        };
        // The receiver only goes away if the whole peer is shutting down.
        let _ = tx_finished.send(response).await;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use futures::channel::mpsc;

    type TestIn = futures::stream::Map<mpsc::Receiver<Value>, fn(Value) -> Result<Value, mpsc::SendError>>;

    /// Wire up two peers over a pair of in-memory channels, so each one's
    /// output feeds the other's input, as if they shared a WebSocket.
    fn linked_pair() -> (
        (TestIn, mpsc::Sender<Value>),
        (TestIn, mpsc::Sender<Value>),
    ) {
        let (a_tx, a_rx) = mpsc::channel::<Value>(16);
        let (b_tx, b_rx) = mpsc::channel::<Value>(16);
        let ok: fn(Value) -> Result<Value, mpsc::SendError> = Ok;
        ((b_rx.map(ok), a_tx), (a_rx.map(ok), b_tx))
    }

    #[tokio::test]
    async fn call_round_trips_to_the_other_peer() {
        let mut registry = MethodRegistry::new();
        registry.register("echo", |params| async move {
            Ok(params.into_iter().next().unwrap_or(Value::Null))
        });

        let (side_a, side_b) = linked_pair();
        let (peer_a, handle_a) = Peer::new(MethodRegistry::new());
        let (peer_b, _handle_b) = Peer::new(registry);

        tokio::spawn(peer_a.run(side_a.0, side_a.1));
        tokio::spawn(peer_b.run(side_b.0, side_b.1));

        let result = handle_a
            .call("echo", vec![Value::String("hi".into())])
            .await
            .expect("peer a's loop is still running")
            .expect("echo does not fail");
        assert_eq!(result, Value::String("hi".into()));
    }

    #[tokio::test]
    async fn calling_unknown_method_returns_method_not_found() {
        let (side_a, side_b) = linked_pair();
        let (peer_a, handle_a) = Peer::new(MethodRegistry::new());
        let (peer_b, _handle_b) = Peer::new(MethodRegistry::new());

        tokio::spawn(peer_a.run(side_a.0, side_a.1));
        tokio::spawn(peer_b.run(side_b.0, side_b.1));

        let err = handle_a
            .call("noSuchMethod", vec![])
            .await
            .expect("peer a's loop is still running")
            .expect_err("method is not registered on peer b");
        assert_eq!(err.code, piercer_protocol::METHOD_NOT_FOUND);
    }
}
