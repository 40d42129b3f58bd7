//! Registration of the local methods a [`crate::Peer`] exposes to its remote
//! side.

use std::{collections::HashMap, future::Future, pin::Pin, sync::Arc};

use piercer_protocol::RpcError;
use serde_json::Value;

/// The result a registered method handler returns.
pub type MethodResult = Result<Value, RpcError>;

/// A boxed, type-erased future returned by a method handler.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A handler for one registered method.
///
/// Takes the request's positional params and returns its eventual result or
/// error; handlers are free to run for as long as they need to, since the
/// dispatch loop drives many of them concurrently.
pub type Handler = Arc<dyn Fn(Vec<Value>) -> BoxFuture<'static, MethodResult> + Send + Sync>;

/// The set of methods a peer will serve to its remote side.
///
/// Built once (typically alongside the controller's or agent's other shared
/// state) and handed to [`crate::Peer::new`]; lookups happen by method name
/// on each incoming request.
#[derive(Clone, Default)]
pub struct MethodRegistry {
    handlers: HashMap<String, Handler>,
}

impl MethodRegistry {
    /// Returns a registry with no methods registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` to be served by `handler`.
    ///
    /// Replaces any handler previously registered under the same name.
    pub fn register<F, Fut>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = MethodResult> + Send + 'static,
    {
        self.handlers
            .insert(name.into(), Arc::new(move |params| Box::pin(handler(params))));
    }

    /// Look up the handler registered under `name`, if any.
    pub fn get(&self, name: &str) -> Option<Handler> {
        self.handlers.get(name).cloned()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn registered_method_dispatches() {
        let mut reg = MethodRegistry::new();
        reg.register("status", |_params| async move { Ok(Value::String("ok".into())) });

        let handler = reg.get("status").expect("status should be registered");
        assert_eq!(handler(vec![]).await.unwrap(), Value::String("ok".into()));
        assert!(reg.get("missing").is_none());
    }
}
