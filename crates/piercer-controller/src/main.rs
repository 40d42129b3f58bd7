//! The central controller: an OpenAI-compatible HTTP API backed by a fleet
//! of remote agents connected over `/ws`.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod ws;

use std::sync::Arc;

use anyhow::Context as _;
use axum::{routing::get, Router};
use piercer_config::ControllerConfig;
use piercer_registry::{AgentRegistry, InMemoryMappingStore};
use piercer_router::AppState;
use piercer_safelog::Sensitive;

use crate::ws::WsState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ControllerConfig::from_env().context("loading controller configuration")?;

    let registry = Arc::new(AgentRegistry::new());
    let mappings = Arc::new(InMemoryMappingStore::new());
    let app_state = AppState::new(registry.clone(), mappings, config.api_key.clone());

    let ws_state = WsState {
        registry,
        inflight: app_state.inflight.clone(),
        agent_secret_key: Sensitive::new(config.agent_secret_key.clone()),
    };

    let app = Router::new()
        .route("/ws", get(ws::ws_handler))
        .with_state(ws_state)
        .merge(piercer_router::router(app_state));

    tracing::info!(addr = %config.bind_addr, "controller listening");
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("controller HTTP server")?;

    Ok(())
}

/// Resolves once the process receives SIGINT (or, on Unix, SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("installing the ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("installing the SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutting down");
}
