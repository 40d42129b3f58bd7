//! A single model's inference worker process.

use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};

use futures::StreamExt as _;
use piercer_protocol::RpcError;
use piercer_rpc::{MethodRegistry, Peer, PeerHandle};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::{process::Child, sync::oneshot, time::timeout};

use crate::{
    err::PoolError,
    sink::PoolSink,
    transport::{reader, writer},
};

/// Method the pool calls on a worker to start one inference job.
pub(crate) const METHOD_RUN: &str = "run";
/// Method the pool calls on a worker to ask it to wind down.
pub(crate) const METHOD_SHUTDOWN: &str = "shutdown";
/// Method a worker calls on the agent once it has finished loading.
pub(crate) const METHOD_READY: &str = "ready";
/// Method a worker calls on the agent to forward one streamed chunk.
pub(crate) const METHOD_RECEIVE_CHUNK: &str = "receiveChunk";
/// Method a worker calls on the agent when a request finishes.
pub(crate) const METHOD_RECEIVE_COMPLETE: &str = "receiveComplete";
/// Method a worker calls on the agent when a request fails.
pub(crate) const METHOD_RECEIVE_ERROR: &str = "receiveError";

/// How long [`crate::Pool::load_model`] waits for a worker's ready signal
/// before giving up.
const READY_TIMEOUT: Duration = Duration::from_secs(30);
/// How long [`Worker::shutdown`] waits for a worker to drain before killing
/// it outright.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Spawns the opaque child process that implements one model worker.
///
/// The inference engine itself stays out of this crate's scope: this trait
/// is the seam between the pool's process-lifecycle bookkeeping and
/// whatever program a deployment points it at.
pub trait WorkerSpawner: Send + Sync {
    /// Spawn a worker process for the model at `path`, named `name`.
    fn spawn(&self, path: &Path, name: &str) -> std::io::Result<Child>;
}

/// A [`WorkerSpawner`] that runs a fixed executable, passing the model's
/// path and name as its two arguments.
pub struct CommandSpawner {
    program: PathBuf,
}

impl CommandSpawner {
    /// Spawn workers by running `program <path> <name>`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        CommandSpawner {
            program: program.into(),
        }
    }
}

impl WorkerSpawner for CommandSpawner {
    fn spawn(&self, path: &Path, name: &str) -> std::io::Result<Child> {
        tokio::process::Command::new(&self.program)
            .arg(path)
            .arg(name)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
    }
}

/// Lifecycle state of one worker process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Spawned; waiting for its ready signal.
    Loading,
    /// Accepting new requests.
    Ready,
    /// Refusing new requests; finishing requests already in flight.
    Draining,
    /// Process has exited or been killed.
    Dead,
}

/// One running model worker, owned exclusively by [`crate::Pool`].
pub struct Worker {
    pub(crate) model_name: String,
    handle: PeerHandle,
    state: Mutex<WorkerState>,
    child: Mutex<Child>,
}

impl Worker {
    /// Spawn `model_name` from `path`, wire up the agent-side callbacks
    /// `sink` receives, and wait for the worker's ready signal.
    pub(crate) async fn spawn(
        path: &Path,
        model_name: &str,
        spawner: &dyn WorkerSpawner,
        sink: Arc<dyn PoolSink>,
    ) -> Result<Self, PoolError> {
        let mut child = spawner.spawn(path, model_name).map_err(|e| PoolError::Spawn {
            model: model_name.to_owned(),
            source: Arc::new(e),
        })?;

        let stdin = child.stdin.take().expect("piped stdin");
        let stdout = child.stdout.take().expect("piped stdout");

        let (ready_tx, ready_rx) = oneshot::channel::<()>();
        let registry = build_registry(ready_tx, sink);
        let (peer, handle) = Peer::new(registry);

        tokio::spawn(async move {
            if let Err(e) = peer.run(reader(stdout).fuse(), writer(stdin)).await {
                tracing::warn!(error = %e, "worker IPC loop ended");
            }
        });

        let ready_timed_out = || PoolError::ReadyTimeout {
            model: model_name.to_owned(),
        };
        timeout(READY_TIMEOUT, ready_rx)
            .await
            .map_err(|_| ready_timed_out())?
            .map_err(|_| ready_timed_out())?;

        Ok(Worker {
            model_name: model_name.to_owned(),
            handle,
            state: Mutex::new(WorkerState::Ready),
            child: Mutex::new(child),
        })
    }

    pub(crate) fn state(&self) -> WorkerState {
        *self.state.lock().expect("poisoned")
    }

    fn set_state(&self, state: WorkerState) {
        *self.state.lock().expect("poisoned") = state;
    }

    /// Hand one job to the worker and return once it acknowledges receipt.
    ///
    /// The worker's actual output arrives out-of-band, through the
    /// `receiveChunk`/`receiveComplete`/`receiveError` callbacks this
    /// worker's registry already wired to the pool's [`PoolSink`].
    pub(crate) async fn run_job(
        &self,
        kind: &str,
        request_id: &str,
        body: Value,
    ) -> Result<(), PoolError> {
        if self.state() != WorkerState::Ready {
            return Err(PoolError::NotReady {
                model: self.model_name.clone(),
            });
        }
        let params = vec![json!({ "request_id": request_id, "kind": kind, "body": body })];
        let outcome = self
            .handle
            .call(METHOD_RUN, params)
            .await
            .map_err(|_| PoolError::WorkerUnreachable {
                model: self.model_name.clone(),
            })?;
        outcome.map_err(|e: RpcError| PoolError::WorkerRejected {
            model: self.model_name.clone(),
            message: e.message,
        })?;
        Ok(())
    }

    /// Ask the worker to wind down, waiting up to [`DRAIN_TIMEOUT`] before
    /// killing it outright.
    pub(crate) async fn shutdown(&self) {
        self.set_state(WorkerState::Draining);
        let drain = self.handle.call(METHOD_SHUTDOWN, vec![]);
        if timeout(DRAIN_TIMEOUT, drain).await.is_err() {
            tracing::warn!(model = %self.model_name, "worker did not drain in time; killing");
        }
        let mut child = self.child.lock().expect("poisoned");
        let _ = child.start_kill();
        drop(child);
        self.set_state(WorkerState::Dead);
    }
}

#[derive(Deserialize)]
struct ChunkParams {
    request_id: String,
    data: Value,
}

#[derive(Deserialize)]
struct CompleteParams {
    request_id: String,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Deserialize)]
struct ErrorParams {
    request_id: String,
    error: String,
}

fn invalid_params(e: serde_json::Error) -> RpcError {
    RpcError {
        code: piercer_protocol::PARSE_ERROR,
        message: e.to_string(),
    }
}

/// Build the registry of methods the agent exposes to a worker process: its
/// readiness signal, and the three streaming callbacks forwarded to `sink`.
fn build_registry(ready_tx: oneshot::Sender<()>, sink: Arc<dyn PoolSink>) -> MethodRegistry {
    let mut registry = MethodRegistry::new();
    let ready_tx = Mutex::new(Some(ready_tx));
    registry.register(METHOD_READY, move |_params| {
        if let Some(tx) = ready_tx.lock().expect("poisoned").take() {
            let _ = tx.send(());
        }
        async move { Ok(Value::Null) }
    });

    let chunk_sink = sink.clone();
    registry.register(METHOD_RECEIVE_CHUNK, move |params| {
        let sink = chunk_sink.clone();
        async move {
            let p: ChunkParams =
                piercer_protocol::params::FromParams::from_params(&params).map_err(invalid_params)?;
            sink.on_chunk(p.request_id, p.data).await;
            Ok(Value::Null)
        }
    });

    let complete_sink = sink.clone();
    registry.register(METHOD_RECEIVE_COMPLETE, move |params| {
        let sink = complete_sink.clone();
        async move {
            let p: CompleteParams =
                piercer_protocol::params::FromParams::from_params(&params).map_err(invalid_params)?;
            sink.on_complete(p.request_id, p.data).await;
            Ok(Value::Null)
        }
    });

    registry.register(METHOD_RECEIVE_ERROR, move |params| {
        let sink = sink.clone();
        async move {
            let p: ErrorParams =
                piercer_protocol::params::FromParams::from_params(&params).map_err(invalid_params)?;
            sink.on_error(p.request_id, p.error).await;
            Ok(Value::Null)
        }
    });

    registry
}

#[cfg(test)]
mod test {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct RecordingSink {
        chunks: StdMutex<Vec<(String, Value)>>,
        completions: StdMutex<Vec<(String, Option<Value>)>>,
        errors: StdMutex<Vec<(String, String)>>,
    }

    impl PoolSink for RecordingSink {
        fn on_chunk(&self, request_id: String, data: Value) -> futures::future::BoxFuture<'static, ()> {
            self.chunks.lock().unwrap().push((request_id, data));
            Box::pin(async {})
        }
        fn on_complete(
            &self,
            request_id: String,
            data: Option<Value>,
        ) -> futures::future::BoxFuture<'static, ()> {
            self.completions.lock().unwrap().push((request_id, data));
            Box::pin(async {})
        }
        fn on_error(&self, request_id: String, error: String) -> futures::future::BoxFuture<'static, ()> {
            self.errors.lock().unwrap().push((request_id, error));
            Box::pin(async {})
        }
    }

    #[tokio::test]
    async fn ready_call_fulfils_the_oneshot_exactly_once() {
        let (tx, rx) = oneshot::channel::<()>();
        let registry = build_registry(tx, Arc::new(RecordingSink::default()));
        let ready = registry.get(METHOD_READY).expect("ready is registered");
        ready(vec![]).await.expect("ready always succeeds");
        rx.await.expect("the handler fulfilled the oneshot");
    }

    #[tokio::test]
    async fn callbacks_forward_to_the_sink() {
        let (tx, _rx) = oneshot::channel::<()>();
        let sink = Arc::new(RecordingSink::default());
        let registry = build_registry(tx, sink.clone());

        let chunk = registry.get(METHOD_RECEIVE_CHUNK).unwrap();
        chunk(vec![json!({"request_id": "r1", "data": {"text": "hi"}})])
            .await
            .unwrap();
        assert_eq!(sink.chunks.lock().unwrap().len(), 1);

        let complete = registry.get(METHOD_RECEIVE_COMPLETE).unwrap();
        complete(vec![json!({"request_id": "r1", "data": null})])
            .await
            .unwrap();
        assert_eq!(sink.completions.lock().unwrap().len(), 1);

        let error = registry.get(METHOD_RECEIVE_ERROR).unwrap();
        error(vec![json!({"request_id": "r1", "error": "boom"})])
            .await
            .unwrap();
        assert_eq!(sink.errors.lock().unwrap().len(), 1);
    }
}
