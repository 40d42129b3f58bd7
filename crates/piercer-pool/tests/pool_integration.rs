//! End-to-end test driving [`Pool`] against the `fake-worker` fixture
//! binary over real stdio pipes.

use std::{
    path::Path,
    sync::{Arc, Mutex},
    time::Duration,
};

use futures::future::BoxFuture;
use piercer_pool::{CommandSpawner, Pool, PoolSink};
use serde_json::{json, Value};

#[derive(Default)]
struct RecordingSink {
    chunks: Mutex<Vec<(String, Value)>>,
    completions: Mutex<Vec<(String, Option<Value>)>>,
}

impl PoolSink for RecordingSink {
    fn on_chunk(&self, request_id: String, data: Value) -> BoxFuture<'static, ()> {
        self.chunks.lock().expect("poisoned").push((request_id, data));
        Box::pin(async {})
    }
    fn on_complete(&self, request_id: String, data: Option<Value>) -> BoxFuture<'static, ()> {
        self.completions.lock().expect("poisoned").push((request_id, data));
        Box::pin(async {})
    }
    fn on_error(&self, _request_id: String, _error: String) -> BoxFuture<'static, ()> {
        Box::pin(async {})
    }
}

#[tokio::test]
async fn load_run_and_shutdown_round_trip_through_a_worker_process() {
    let sink = Arc::new(RecordingSink::default());
    let spawner = Box::new(CommandSpawner::new(env!("CARGO_BIN_EXE_fake-worker")));
    let pool = Pool::new(1, spawner, sink.clone());

    pool.load_model(Path::new("dummy.gguf"), "dummy.gguf")
        .await
        .expect("fake-worker always becomes ready");
    assert_eq!(pool.loaded_models().await, vec!["dummy.gguf".to_string()]);

    pool.run_completion("dummy.gguf", "req-1", json!({"prompt": "hi"}))
        .await
        .expect("fake-worker always acks a run");

    // The worker's receiveChunk/receiveComplete calls arrive on a
    // background task; give them a moment to land.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let chunks = sink.chunks.lock().unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].0, "req-1");
    drop(chunks);

    let completions = sink.completions.lock().unwrap();
    assert_eq!(completions.len(), 1);
    assert_eq!(completions[0].0, "req-1");
    drop(completions);

    pool.shutdown().await;
    assert!(pool.loaded_models().await.is_empty());
}
