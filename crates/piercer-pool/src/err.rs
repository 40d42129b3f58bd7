//! Errors produced by the worker pool.

use std::sync::Arc;

use piercer_error::{ErrorKind, HasKind};

/// A failure from one of [`crate::Pool`]'s operations.
#[derive(Clone, Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PoolError {
    /// `max_concurrent_models` workers are already loaded.
    #[error("pool full")]
    Full,
    /// The worker process could not be spawned.
    #[error("failed to spawn worker for {model}")]
    Spawn {
        /// The model that failed to load.
        model: String,
        /// The underlying OS error.
        #[source]
        source: Arc<std::io::Error>,
    },
    /// The worker did not send its ready signal within the allotted time.
    #[error("worker for {model} did not become ready in time")]
    ReadyTimeout {
        /// The model whose worker timed out.
        model: String,
    },
    /// An operation was attempted against a model that is not loaded or not
    /// yet ready.
    #[error("model {model} is not ready")]
    NotReady {
        /// The model that is not ready.
        model: String,
    },
    /// The worker's IPC connection closed before it acknowledged a call.
    #[error("worker for {model} is unreachable")]
    WorkerUnreachable {
        /// The model whose worker is unreachable.
        model: String,
    },
    /// The worker rejected a call.
    #[error("worker for {model} rejected the call: {message}")]
    WorkerRejected {
        /// The model whose worker rejected the call.
        model: String,
        /// The worker's error message.
        message: String,
    },
}

impl HasKind for PoolError {
    fn kind(&self) -> ErrorKind {
        match self {
            PoolError::Full => ErrorKind::RoutingUnavailable,
            PoolError::Spawn { .. } => ErrorKind::Fatal,
            PoolError::ReadyTimeout { .. } => ErrorKind::Transient,
            PoolError::NotReady { .. } => ErrorKind::Transient,
            PoolError::WorkerUnreachable { .. } => ErrorKind::Transient,
            PoolError::WorkerRejected { .. } => ErrorKind::AgentReported,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn full_is_a_routing_failure_not_a_fatal_one() {
        assert_eq!(PoolError::Full.kind(), ErrorKind::RoutingUnavailable);
    }

    #[test]
    fn spawn_failure_is_fatal() {
        let err = PoolError::Spawn {
            model: "m".into(),
            source: Arc::new(std::io::Error::other("no such file")),
        };
        assert_eq!(err.kind(), ErrorKind::Fatal);
    }
}
