//! `/management/*` fleet-inspection and mutation endpoints.

use std::sync::atomic::Ordering;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use piercer_protocol::{
    methods,
    params::{AsParams, DownloadModelParams},
};
use piercer_registry::ModelMapping;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{err::ApiError, state::AppState};

/// One row of `GET /management/agents`.
#[derive(Serialize)]
pub struct AgentSummary {
    id: String,
    name: String,
    #[serde(rename = "loadedModels")]
    loaded_models: Vec<String>,
    #[serde(rename = "installedModels")]
    installed_models: Vec<String>,
    #[serde(rename = "pendingRequests")]
    pending_requests: usize,
}

/// `GET /management/agents`.
pub async fn list_agents(State(state): State<AppState>) -> Json<Vec<AgentSummary>> {
    let agents = state
        .registry
        .list()
        .into_iter()
        .map(|a| AgentSummary {
            id: a.id,
            name: a.name,
            loaded_models: a.loaded_models,
            installed_models: a.installed_models,
            pending_requests: a.pending_request_count.load(Ordering::SeqCst),
        })
        .collect();
    Json(agents)
}

/// `GET /management/mappings`.
pub async fn list_mappings(State(state): State<AppState>) -> Json<Vec<ModelMapping>> {
    Json(state.mappings.list())
}

/// Body of `POST /management/mappings`.
#[derive(Deserialize)]
pub struct PutMappingRequest {
    public_name: String,
    filename: String,
}

/// `POST /management/mappings`.
pub async fn put_mapping(
    State(state): State<AppState>,
    Json(body): Json<PutMappingRequest>,
) -> StatusCode {
    state.mappings.put(body.public_name, body.filename);
    StatusCode::NO_CONTENT
}

/// `DELETE /management/mappings/:public_name`.
pub async fn delete_mapping(
    State(state): State<AppState>,
    Path(public_name): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.mappings.remove(&public_name) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("no mapping for {public_name:?}")))
    }
}

/// Body of `POST /management/agents/:id/models/download`.
#[derive(Deserialize)]
pub struct DownloadRequest {
    model_url: String,
    filename: String,
}

/// `POST /management/agents/:id/models/download`.
pub async fn download_model(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    Json(body): Json<DownloadRequest>,
) -> Result<Json<Value>, ApiError> {
    let agent = state
        .registry
        .get(&agent_id)
        .ok_or_else(|| ApiError::not_found(format!("no connected agent {agent_id:?}")))?;

    let params = DownloadModelParams { model_url: body.model_url, filename: body.filename };
    let result = agent.peer.call(methods::DOWNLOAD_MODEL, params.as_params()).await?;
    result
        .map(Json)
        .map_err(|e| ApiError::from_kind(piercer_error::ErrorKind::AgentReported, e.message))
}
