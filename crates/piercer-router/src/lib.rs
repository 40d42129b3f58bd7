//! The controller's HTTP surface: an OpenAI-compatible completions API, the
//! `/management` endpoints used to inspect and steer the fleet, and the
//! in-flight request table that correlates an agent's asynchronous RPC
//! callbacks back to the HTTP response waiting on them.
//!
//! This crate has no opinion on how agents connect; it only reads
//! [`piercer_registry::AgentRegistry`] and calls into the
//! [`piercer_rpc::PeerHandle`] each [`piercer_registry::AgentRecord`]
//! carries. Wiring a `/ws` upgrade handler into the same
//! [`axum::Router`] this crate builds is the controller binary's job.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod dispatch;
mod err;
mod handlers;
mod inflight;
mod state;

pub use dispatch::pick_agent;
pub use err::ApiError;
pub use inflight::{InFlightEvent, InFlightTable};
pub use state::AppState;

use axum::{
    routing::{delete, get, post},
    Router,
};

/// Build the full `/health`, `/api/info`, `/management/*`, and `/v1/*`
/// route table over `state`.
///
/// The caller is responsible for nesting or merging this with whatever
/// serves the agent-facing `/ws` upgrade.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/info", get(handlers::health::info))
        .route("/management/agents", get(handlers::management::list_agents))
        .route(
            "/management/mappings",
            get(handlers::management::list_mappings).post(handlers::management::put_mapping),
        )
        .route("/management/mappings/:public_name", delete(handlers::management::delete_mapping))
        .route("/management/agents/:id/models/download", post(handlers::management::download_model))
        .route("/v1/chat/completions", post(handlers::completions::chat_completions))
        .route("/v1/completions", post(handlers::completions::completions))
        .with_state(state)
}

#[cfg(test)]
mod test {
    #![allow(clippy::unwrap_used)]
    use std::sync::Arc;

    use axum::body::Body;
    use http::{Request, StatusCode};
    use piercer_registry::{AgentRegistry, InMemoryMappingStore};
    use tower::ServiceExt as _;

    use super::*;

    fn test_state() -> AppState {
        AppState::new(Arc::new(AgentRegistry::new()), Arc::new(InMemoryMappingStore::new()), None)
    }

    #[tokio::test]
    async fn health_reports_200() {
        let app = router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_model_reports_404_before_touching_any_agent() {
        let app = router(test_state());
        let body = serde_json::json!({ "model": "ghost", "stream": false, "messages": [] });
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/chat/completions")
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::to_vec(&body).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn no_agent_for_a_mapped_model_reports_503() {
        let state = test_state();
        state.mappings.put("test-model".into(), "test-model.gguf".into());
        let app = router(state);
        let body = serde_json::json!({ "model": "test-model", "stream": false, "messages": [] });
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/chat/completions")
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::to_vec(&body).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
