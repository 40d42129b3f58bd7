//! Bounded set of per-model inference worker processes.

use std::{collections::HashMap, path::Path, sync::Arc};

use serde_json::Value;
use tokio::sync::Mutex;

use crate::{
    err::PoolError,
    sink::PoolSink,
    worker::{Worker, WorkerSpawner, WorkerState},
};

/// Owns up to `max_concurrent_models` worker processes and routes
/// completion and chat jobs to the right one.
pub struct Pool {
    max_concurrent_models: usize,
    spawner: Box<dyn WorkerSpawner>,
    sink: Arc<dyn PoolSink>,
    workers: Mutex<HashMap<String, Arc<Worker>>>,
}

impl Pool {
    /// Build an empty pool that spawns workers with `spawner` and forwards
    /// their streamed output to `sink`.
    pub fn new(max_concurrent_models: usize, spawner: Box<dyn WorkerSpawner>, sink: Arc<dyn PoolSink>) -> Self {
        Pool {
            max_concurrent_models,
            spawner,
            sink,
            workers: Mutex::new(HashMap::new()),
        }
    }

    /// Load `name` from `path` if it is not already present.
    ///
    /// A no-op if `name` is already loaded. Fails with [`PoolError::Full`]
    /// if the pool is already at `max_concurrent_models`; the caller, not
    /// this pool, decides whether to evict something to make room.
    pub async fn load_model(&self, path: &Path, name: &str) -> Result<(), PoolError> {
        let mut workers = self.workers.lock().await;
        if workers.contains_key(name) {
            return Ok(());
        }
        if workers.len() >= self.max_concurrent_models {
            return Err(PoolError::Full);
        }
        let worker = Worker::spawn(path, name, self.spawner.as_ref(), self.sink.clone()).await?;
        workers.insert(name.to_owned(), Arc::new(worker));
        Ok(())
    }

    /// Names of the models currently loaded, in no particular order.
    pub async fn loaded_models(&self) -> Vec<String> {
        self.workers.lock().await.keys().cloned().collect()
    }

    /// Current lifecycle state of `name`'s worker, if loaded.
    pub async fn worker_state(&self, name: &str) -> Option<WorkerState> {
        self.workers.lock().await.get(name).map(|w| w.state())
    }

    /// Run a text completion on `name`'s worker.
    pub async fn run_completion(&self, name: &str, request_id: &str, body: Value) -> Result<(), PoolError> {
        self.run_job("completion", name, request_id, body).await
    }

    /// Run a chat completion on `name`'s worker.
    pub async fn run_chat(&self, name: &str, request_id: &str, body: Value) -> Result<(), PoolError> {
        self.run_job("chat", name, request_id, body).await
    }

    async fn run_job(&self, kind: &str, name: &str, request_id: &str, body: Value) -> Result<(), PoolError> {
        let worker = self
            .workers
            .lock()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| PoolError::NotReady { model: name.to_owned() })?;
        worker.run_job(kind, request_id, body).await
    }

    /// Signal every loaded worker to wind down, waiting for each one
    /// (bounded) before the pool reports itself empty.
    pub async fn shutdown(&self) {
        let workers: Vec<_> = self.workers.lock().await.drain().map(|(_, w)| w).collect();
        futures::future::join_all(workers.iter().map(|w| w.shutdown())).await;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sink::PoolSink;
    use futures::future::BoxFuture;

    struct NullSink;
    impl PoolSink for NullSink {
        fn on_chunk(&self, _request_id: String, _data: Value) -> BoxFuture<'static, ()> {
            Box::pin(async {})
        }
        fn on_complete(&self, _request_id: String, _data: Option<Value>) -> BoxFuture<'static, ()> {
            Box::pin(async {})
        }
        fn on_error(&self, _request_id: String, _error: String) -> BoxFuture<'static, ()> {
            Box::pin(async {})
        }
    }

    struct UnreachableSpawner;
    impl WorkerSpawner for UnreachableSpawner {
        fn spawn(&self, _path: &Path, _name: &str) -> std::io::Result<tokio::process::Child> {
            panic!("the pool should reject this load before ever spawning")
        }
    }

    #[tokio::test]
    async fn load_model_rejects_when_pool_is_already_at_capacity() {
        let pool = Pool::new(0, Box::new(UnreachableSpawner), Arc::new(NullSink));
        let err = pool
            .load_model(Path::new("m.gguf"), "m.gguf")
            .await
            .unwrap_err();
        assert!(matches!(err, PoolError::Full));
    }

    #[tokio::test]
    async fn run_job_against_an_unloaded_model_reports_not_ready() {
        let pool = Pool::new(4, Box::new(UnreachableSpawner), Arc::new(NullSink));
        let err = pool
            .run_completion("never-loaded.gguf", "req-1", Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, PoolError::NotReady { .. }));
    }
}
