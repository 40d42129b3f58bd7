//! Methods this agent serves to the controller.

use std::{path::PathBuf, sync::Arc};

use futures::StreamExt as _;
use piercer_error::HasKind as _;
use piercer_pool::{Pool, PoolError};
use piercer_protocol::{
    methods,
    params::{DownloadModelParams, FromParams as _, InferenceParams, StartModelParams},
    RpcError,
};
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt as _;

use crate::models::scan_installed_models;

/// Shared state every registered method reaches through.
pub struct AgentContext {
    /// The worker pool this agent's inference methods operate on.
    pub pool: Arc<Pool>,
    /// Directory model files are installed to and downloaded into.
    pub models_dir: PathBuf,
}

/// A [`methods::DOWNLOAD_MODEL`] failure.
#[derive(Debug, thiserror::Error)]
enum DownloadError {
    #[error("could not fetch model: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("could not write model file: {0}")]
    Io(#[from] std::io::Error),
}

fn invalid_params(e: serde_json::Error) -> RpcError {
    RpcError {
        code: piercer_protocol::PARSE_ERROR,
        message: e.to_string(),
    }
}

fn pool_error(e: PoolError) -> RpcError {
    RpcError {
        code: e.kind().rpc_code(),
        message: e.to_string(),
    }
}

fn download_error(e: DownloadError) -> RpcError {
    RpcError {
        code: piercer_protocol::INTERNAL_ERROR,
        message: e.to_string(),
    }
}

async fn download_model(models_dir: &std::path::Path, url: &str, filename: &str) -> Result<(), DownloadError> {
    let response = reqwest::get(url).await?.error_for_status()?;
    let mut file = tokio::fs::File::create(models_dir.join(filename)).await?;
    let mut chunks = response.bytes_stream();
    while let Some(chunk) = chunks.next().await {
        file.write_all(&chunk?).await?;
    }
    Ok(())
}

/// Build the registry of methods the controller calls on this agent.
pub fn build_registry(ctx: Arc<AgentContext>) -> piercer_rpc::MethodRegistry {
    let mut registry = piercer_rpc::MethodRegistry::new();

    let c = ctx.clone();
    registry.register(methods::COMPLETION, move |params| {
        let ctx = c.clone();
        async move {
            let p = InferenceParams::from_params(&params).map_err(invalid_params)?;
            // The controller may route here before this agent has ever
            // loaded the model; load it on first use rather than rejecting.
            let path = ctx.models_dir.join(&p.model);
            ctx.pool.load_model(&path, &p.model).await.map_err(pool_error)?;
            ctx.pool.run_completion(&p.model, &p.request_id, p.body).await.map_err(pool_error)?;
            Ok(Value::Null)
        }
    });

    let c = ctx.clone();
    registry.register(methods::CHAT, move |params| {
        let ctx = c.clone();
        async move {
            let p = InferenceParams::from_params(&params).map_err(invalid_params)?;
            let path = ctx.models_dir.join(&p.model);
            ctx.pool.load_model(&path, &p.model).await.map_err(pool_error)?;
            ctx.pool.run_chat(&p.model, &p.request_id, p.body).await.map_err(pool_error)?;
            Ok(Value::Null)
        }
    });

    let c = ctx.clone();
    registry.register(methods::LIST_MODELS, move |_params| {
        let ctx = c.clone();
        async move { Ok(json!(scan_installed_models(&ctx.models_dir))) }
    });

    let c = ctx.clone();
    registry.register(methods::CURRENT_MODELS, move |_params| {
        let ctx = c.clone();
        async move { Ok(json!(ctx.pool.loaded_models().await)) }
    });

    let c = ctx.clone();
    registry.register(methods::START_MODEL, move |params| {
        let ctx = c.clone();
        async move {
            let p = StartModelParams::from_params(&params).map_err(invalid_params)?;
            let path = ctx.models_dir.join(&p.model);
            ctx.pool.load_model(&path, &p.model).await.map_err(pool_error)?;
            Ok(Value::Null)
        }
    });

    let c = ctx.clone();
    registry.register(methods::DOWNLOAD_MODEL, move |params| {
        let ctx = c.clone();
        async move {
            let p = DownloadModelParams::from_params(&params).map_err(invalid_params)?;
            download_model(&ctx.models_dir, &p.model_url, &p.filename).await.map_err(download_error)?;
            Ok(Value::Null)
        }
    });

    registry.register(methods::STATUS, move |_params| {
        let ctx = ctx.clone();
        async move { Ok(json!({ "loaded_models": ctx.pool.loaded_models().await })) }
    });

    registry
}

#[cfg(test)]
mod test {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use piercer_pool::{CommandSpawner, PoolSink};
    use std::path::Path;

    struct NullSink;
    impl PoolSink for NullSink {
        fn on_chunk(&self, _r: String, _d: Value) -> futures::future::BoxFuture<'static, ()> {
            Box::pin(async {})
        }
        fn on_complete(&self, _r: String, _d: Option<Value>) -> futures::future::BoxFuture<'static, ()> {
            Box::pin(async {})
        }
        fn on_error(&self, _r: String, _e: String) -> futures::future::BoxFuture<'static, ()> {
            Box::pin(async {})
        }
    }

    fn test_context(models_dir: PathBuf) -> Arc<AgentContext> {
        let pool = Pool::new(1, Box::new(CommandSpawner::new("/bin/true")), Arc::new(NullSink));
        Arc::new(AgentContext { pool: Arc::new(pool), models_dir })
    }

    #[tokio::test]
    async fn current_models_reports_nothing_loaded_on_a_fresh_pool() {
        let ctx = test_context(Path::new("/nonexistent").to_owned());
        let registry = build_registry(ctx);
        let handler = registry.get(methods::CURRENT_MODELS).unwrap();
        let result = handler(vec![]).await.unwrap();
        assert_eq!(result, json!([]));
    }

    #[tokio::test]
    async fn completion_against_an_unloaded_model_tries_to_load_it_first() {
        // `/bin/true` exits immediately without ever sending a ready signal,
        // so the load this handler now attempts fails with `ReadyTimeout`
        // rather than the call being rejected outright with `NotReady`.
        let ctx = test_context(Path::new("/nonexistent").to_owned());
        let registry = build_registry(ctx);
        let handler = registry.get(methods::COMPLETION).unwrap();
        let params = InferenceParams {
            request_id: "r1".into(),
            model: "never-loaded.gguf".into(),
            body: json!({}),
        };
        let err = handler(vec![serde_json::to_value(&params).unwrap()]).await.unwrap_err();
        assert_eq!(err.code, piercer_error::ErrorKind::Transient.rpc_code());
    }
}
