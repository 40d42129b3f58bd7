//! `POST /v1/chat/completions` and `POST /v1/completions`.

use std::convert::Infallible;

use axum::{
    extract::State,
    http::HeaderMap,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use piercer_protocol::{
    methods,
    params::{AsParams, InferenceParams},
};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::{
    dispatch::pick_agent,
    err::ApiError,
    inflight::InFlightEvent,
    state::AppState,
};

/// How many pending SSE frames may queue before a slow client applies
/// backpressure to the forwarding task.
const SSE_CHAN_SIZE: usize = 16;

/// `POST /v1/chat/completions`.
pub async fn chat_completions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    require_api_key(&state, &headers)?;
    run(state, methods::CHAT, body).await
}

/// `POST /v1/completions`.
pub async fn completions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    require_api_key(&state, &headers)?;
    run(state, methods::COMPLETION, body).await
}

fn require_api_key(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let presented = headers
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if state.authorized(presented) {
        Ok(())
    } else {
        Err(ApiError::unauthorized("invalid or missing API key"))
    }
}

async fn run(state: AppState, method: &'static str, mut body: Value) -> Result<Response, ApiError> {
    let public_name = body
        .get("model")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::bad_request("request body is missing \"model\""))?
        .to_owned();
    let stream = body.get("stream").and_then(Value::as_bool).unwrap_or(false);

    let internal_name = state
        .mappings
        .resolve(&public_name)
        .ok_or_else(|| ApiError::not_found(format!("no mapping for model {public_name:?}")))?;

    let candidates = state.registry.find_for_model(&internal_name);
    let agent = pick_agent(candidates, &internal_name).ok_or_else(|| {
        ApiError::from_kind(
            piercer_error::ErrorKind::RoutingUnavailable,
            format!("no connected agent hosts {internal_name:?}"),
        )
    })?;

    let request_id = Uuid::new_v4().to_string();
    let rx = state
        .inflight
        .register(request_id.clone(), agent.id.clone(), agent.pending_request_count.clone());

    if let Some(model_field) = body.as_object_mut() {
        model_field.remove("model");
    }
    let params = InferenceParams { request_id: request_id.clone(), model: internal_name, body };

    if let Err(rpc_err) = agent.peer.call(method, params.as_params()).await? {
        state.inflight.deliver_error(&request_id, rpc_err.message.clone());
        let kind = piercer_error::ErrorKind::from_rpc_code(rpc_err.code);
        return Err(ApiError::from_kind(kind, rpc_err.message));
    }

    if stream {
        Ok(stream_response(state, request_id, rx))
    } else {
        aggregate_response(rx).await
    }
}

fn stream_response(
    state: AppState,
    request_id: String,
    mut rx: mpsc::UnboundedReceiver<InFlightEvent>,
) -> Response {
    let (tx, sse_rx) = mpsc::channel::<Result<Event, Infallible>>(SSE_CHAN_SIZE);
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let (sse_event, terminal) = match event {
                InFlightEvent::Chunk(v) => (Event::default().data(v.to_string()), false),
                InFlightEvent::Done => (Event::default().data("[DONE]"), true),
                InFlightEvent::Error(message) => {
                    (Event::default().data(json!({ "error": { "message": message } }).to_string()), true)
                }
            };
            if tx.send(Ok(sse_event)).await.is_err() {
                state.inflight.mark_closed(&request_id);
                return;
            }
            if terminal {
                return;
            }
        }
    });
    Sse::new(ReceiverStream::new(sse_rx)).keep_alive(KeepAlive::default()).into_response()
}

async fn aggregate_response(mut rx: mpsc::UnboundedReceiver<InFlightEvent>) -> Result<Response, ApiError> {
    let mut content = String::new();
    loop {
        match rx.recv().await {
            Some(InFlightEvent::Chunk(v)) => {
                if let Some(delta) = v["choices"][0]["delta"]["content"].as_str() {
                    content.push_str(delta);
                }
            }
            Some(InFlightEvent::Done) | None => break,
            Some(InFlightEvent::Error(message)) => {
                return Err(ApiError::from_kind(piercer_error::ErrorKind::AgentReported, message));
            }
        }
    }
    Ok(Json(json!({
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop",
        }],
    }))
    .into_response())
}
