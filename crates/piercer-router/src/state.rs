//! Shared state handed to every HTTP handler.

use std::sync::Arc;

use piercer_registry::AgentRegistry;
use piercer_registry::MappingStore;
use piercer_safelog::Sensitive;

use crate::inflight::InFlightTable;

/// Everything a router handler needs: the fleet's connected agents, the
/// public-name mapping table, the in-flight request table, and an optional
/// bearer key gating `/v1/*`.
#[derive(Clone)]
pub struct AppState {
    /// The controller's connected-agent registry.
    pub registry: Arc<AgentRegistry>,
    /// The public-name to internal-filename mapping table.
    pub mappings: Arc<dyn MappingStore>,
    /// Requests currently awaiting agent callbacks.
    pub inflight: Arc<InFlightTable>,
    /// Bearer key required on `/v1/*`, if auth is enabled.
    pub api_key: Option<Sensitive<String>>,
}

impl AppState {
    /// Build state with an empty in-flight table.
    pub fn new(
        registry: Arc<AgentRegistry>,
        mappings: Arc<dyn MappingStore>,
        api_key: Option<String>,
    ) -> Self {
        AppState {
            registry,
            mappings,
            inflight: Arc::new(InFlightTable::new()),
            api_key: api_key.map(Sensitive::new),
        }
    }

    /// Returns true if no key is configured, or `presented` matches it.
    pub fn authorized(&self, presented: Option<&str>) -> bool {
        match &self.api_key {
            None => true,
            Some(expected) => presented.is_some_and(|p| p == expected.as_inner()),
        }
    }
}
