//! The agent-facing `/ws` upgrade: one persistent WebSocket per agent,
//! carrying the bidirectional JSON-RPC peer built in `piercer-rpc`.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures::{SinkExt as _, StreamExt as _};
use piercer_protocol::{
    methods,
    params::{ErrorParams, FromParams as _, ReceiveCompletionParams, UpdateModelsParams},
};
use piercer_registry::AgentRegistry;
use piercer_router::InFlightTable;
use piercer_rpc::{MethodRegistry, Peer};
use piercer_safelog::Sensitive;
use piercer_transport::{ServerTransport, TransportError};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

/// State shared by every `/ws` connection, alongside whatever
/// [`piercer_router::AppState`] the HTTP routes already carry.
#[derive(Clone)]
pub struct WsState {
    /// The same registry the HTTP surface dispatches requests against.
    pub registry: Arc<AgentRegistry>,
    /// The same in-flight table completions and errors are delivered through.
    pub inflight: Arc<InFlightTable>,
    /// Bearer credential every agent must present to connect.
    pub agent_secret_key: Sensitive<String>,
}

/// Header an agent sends its chosen id in.
const HEADER_AGENT_ID: &str = "agent-id";
/// Header an agent sends its human-readable name in.
const HEADER_AGENT_NAME: &str = "agent-name";
/// Header an agent sends its comma-separated installed-model list in.
const HEADER_INSTALLED_MODELS: &str = "agent-installed-models";

/// `GET /ws`: upgrade, authenticate, and register one agent connection.
///
/// The bearer token and the `agent-id`/`agent-name`/`agent-installed-models`
/// headers are all read from the pre-upgrade request; a missing or
/// mismatched token is rejected with a plain HTTP 401 before the socket ever
/// opens. Everything discovered only after the handshake (there is nothing
/// else to discover here) would instead close with
/// [`piercer_transport::CLOSE_AUTH_FAILED`].
pub async fn ws_handler(
    State(state): State<WsState>,
    headers: HeaderMap,
    upgrade: WebSocketUpgrade,
) -> Response {
    let presented = bearer_token(&headers);
    if presented != Some(state.agent_secret_key.as_inner().as_str()) {
        return (StatusCode::UNAUTHORIZED, "invalid or missing agent secret key").into_response();
    }

    let agent_id = match header_str(&headers, HEADER_AGENT_ID) {
        Some(id) => id.to_owned(),
        None => return (StatusCode::BAD_REQUEST, "missing agent-id header").into_response(),
    };
    let agent_name = header_str(&headers, HEADER_AGENT_NAME)
        .unwrap_or(&agent_id)
        .to_owned();
    let installed_models = header_str(&headers, HEADER_INSTALLED_MODELS)
        .map(parse_model_list)
        .unwrap_or_default();

    upgrade.on_upgrade(move |socket| {
        run_agent_connection(socket, agent_id, agent_name, installed_models, state)
    })
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn parse_model_list(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_owned).collect()
}

/// Drive one agent's connection end to end: register it, run the JSON-RPC
/// peer over its transport, and tear everything down once the socket closes.
async fn run_agent_connection(
    socket: WebSocket,
    agent_id: String,
    agent_name: String,
    installed_models: Vec<String>,
    state: WsState,
) {
    let transport = ServerTransport::new(socket);
    let (peer, handle) = Peer::new(agent_callback_methods(state.registry.clone(), state.inflight.clone()));

    let (evict_tx, evict_rx) = oneshot::channel::<u16>();
    state.registry.register(
        agent_id.clone(),
        agent_name,
        installed_models,
        handle,
        move |code| {
            let _ = evict_tx.send(code);
        },
    );

    let (in_tx, in_rx) = mpsc::channel::<Result<Value, TransportError>>(32);
    let (out_tx, out_rx) = mpsc::channel::<Value>(32);
    let in_stream = Box::pin(
        futures::stream::unfold(in_rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) }).fuse(),
    );
    let out_sink = Box::pin(futures::sink::unfold(out_tx, |tx: mpsc::Sender<Value>, value: Value| async move {
        tx.send(value).await.map_err(|_| TransportError::Closed(None))?;
        Ok::<_, TransportError>(tx)
    }));

    let evicted = tokio::select! {
        evicted = pump_transport(transport, evict_rx, in_tx, out_rx) => evicted,
        result = peer.run(in_stream, out_sink) => {
            if let Err(e) = result {
                tracing::debug!(agent_id = %agent_id, error = %e, "agent connection ended");
            }
            false
        }
    };

    if !evicted {
        state.registry.deregister(&agent_id);
        state.inflight.abort_for_agent(&agent_id, "agent disconnected");
    }
}

/// Shuttle frames between the raw transport and the plain channels
/// [`Peer::run`] talks through, so the transport stays intact (and closeable
/// with an explicit code) until the connection actually ends.
///
/// Returns true if the connection ended because a fresh registration of the
/// same agent id evicted it; the caller must not deregister in that case, as
/// the registry already holds the replacement record.
async fn pump_transport(
    transport: ServerTransport,
    mut evict_rx: oneshot::Receiver<u16>,
    in_tx: mpsc::Sender<Result<Value, TransportError>>,
    mut out_rx: mpsc::Receiver<Value>,
) -> bool {
    let mut transport = Some(transport);
    loop {
        let mut evicted_with = None;
        tokio::select! {
            code = &mut evict_rx => { evicted_with = code.ok(); }
            incoming = transport.as_mut().expect("taken only on the way out").next() => {
                match incoming {
                    Some(item) => { if in_tx.send(item).await.is_err() { return false; } }
                    None => return false,
                }
            }
            outgoing = out_rx.recv() => {
                match outgoing {
                    Some(value) => {
                        let sent = transport.as_mut().expect("taken only on the way out").send(value).await;
                        if sent.is_err() { return false; }
                    }
                    None => return false,
                }
            }
        }
        if let Some(code) = evicted_with {
            if let Some(t) = transport.take() {
                t.close(code, "evicted by a newer connection").await;
            }
            return true;
        }
    }
}

fn invalid_params(e: serde_json::Error) -> piercer_protocol::RpcError {
    piercer_protocol::RpcError {
        code: piercer_protocol::PARSE_ERROR,
        message: e.to_string(),
    }
}

/// Methods the controller serves to an agent: the three ways an agent calls
/// back into the fleet it belongs to.
fn agent_callback_methods(registry: Arc<AgentRegistry>, inflight: Arc<InFlightTable>) -> MethodRegistry {
    let mut handlers = MethodRegistry::new();

    let inflight_for_chunk = inflight.clone();
    handlers.register(methods::RECEIVE_COMPLETION, move |params| {
        let inflight = inflight_for_chunk.clone();
        async move {
            let p = ReceiveCompletionParams::from_params(&params).map_err(invalid_params)?;
            inflight.deliver(&p.request_id, p.data);
            Ok(Value::Null)
        }
    });

    handlers.register(methods::UPDATE_MODELS, move |params| {
        let registry = registry.clone();
        async move {
            let p = UpdateModelsParams::from_params(&params).map_err(invalid_params)?;
            registry.update_models(&p.agent_id, p.models);
            Ok(Value::Null)
        }
    });

    handlers.register(methods::ERROR, move |params| {
        let inflight = inflight.clone();
        async move {
            let p = ErrorParams::from_params(&params).map_err(invalid_params)?;
            inflight.deliver_error(&p.context.request_id, p.error);
            Ok(Value::Null)
        }
    });

    handlers
}

#[cfg(test)]
mod test {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use piercer_registry::AgentRegistry;
    use piercer_router::{InFlightEvent, InFlightTable};
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn receive_completion_delivers_to_the_inflight_table() {
        let registry = Arc::new(AgentRegistry::new());
        let inflight = Arc::new(InFlightTable::new());
        let methods = agent_callback_methods(registry, inflight.clone());

        let pending = Arc::new(AtomicUsize::new(0));
        let mut rx = inflight.register("r1".into(), "a1".into(), pending);

        let handler = methods.get(methods::RECEIVE_COMPLETION).unwrap();
        handler(vec![serde_json::json!({
            "agent_id": "a1",
            "request_id": "r1",
            "data": {"choices": [{"delta": {"content": "hi"}}]},
        })])
        .await
        .unwrap();

        match rx.recv().await.unwrap() {
            InFlightEvent::Chunk(v) => assert_eq!(v["choices"][0]["delta"]["content"], "hi"),
            other => panic!("expected a chunk, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn update_models_reaches_the_registry() {
        let registry = Arc::new(AgentRegistry::new());
        let inflight = Arc::new(InFlightTable::new());
        let (_peer, handle) = Peer::new(MethodRegistry::new());
        registry.register("a1".into(), "agent".into(), vec!["m1".into()], handle, |_| {});

        let methods = agent_callback_methods(registry.clone(), inflight);
        let handler = methods.get(methods::UPDATE_MODELS).unwrap();
        handler(vec![serde_json::json!({ "agent_id": "a1", "models": ["m1", "m2"] })])
            .await
            .unwrap();

        assert_eq!(registry.get("a1").unwrap().installed_models, vec!["m1", "m2"]);
    }
}
