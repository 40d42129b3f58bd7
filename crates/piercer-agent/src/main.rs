//! The remote agent binary: connects out to a controller and serves
//! inference jobs against locally installed models.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

use std::sync::Arc;

use anyhow::Context as _;
use piercer_agent::{
    id, methods,
    methods::AgentContext,
    sink::ForwardingSink,
    supervisor::{self, Outcome},
};
use piercer_config::AgentConfig;
use piercer_pool::{CommandSpawner, Pool};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = AgentConfig::from_env().context("loading agent configuration")?;
    let agent_id = id::load_or_create(&config.agent_data_dir).context("loading agent id")?;
    tracing::info!(agent_id = %agent_id, name = %config.agent_name, "starting agent");

    let sink = Arc::new(ForwardingSink::new(agent_id.clone()));
    let pool = Arc::new(Pool::new(
        config.max_concurrent_models,
        Box::new(CommandSpawner::new("piercer-worker")),
        sink.clone(),
    ));
    let ctx = Arc::new(AgentContext {
        pool,
        models_dir: config.models_dir.clone(),
    });

    let outcome = supervisor::run(&config, &agent_id, || methods::build_registry(ctx.clone()), sink).await;

    match outcome {
        Outcome::Evicted => tracing::info!("evicted by a newer connection for this agent id, exiting"),
        Outcome::AuthRejected => tracing::error!("controller rejected this agent's credentials"),
        Outcome::GaveUp => tracing::error!("could not reach the controller after repeated attempts"),
    }

    std::process::exit(outcome.exit_code());
}
