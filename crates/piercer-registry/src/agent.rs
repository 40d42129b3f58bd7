//! The set of connected agents and their advertised models.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use piercer_rpc::PeerHandle;
use tokio::sync::broadcast;

/// How many past registry-change events a late subscriber can miss before
/// [`broadcast::Receiver::recv`] starts reporting lag.
const EVENT_CHAN_SIZE: usize = 256;

/// A snapshot of one connected agent's state.
///
/// Cloned out of the registry for callers (the router, the `/management`
/// handlers) to read; mutating it has no effect on the registry itself.
#[derive(Clone)]
pub struct AgentRecord {
    /// Opaque, agent-chosen identifier; unique within the registry.
    pub id: String,
    /// Human-readable name the agent reported at connect time.
    pub name: String,
    /// Handle used to call this agent's exposed RPC methods.
    pub peer: PeerHandle,
    /// Filenames of models this agent has on disk, in the order it last
    /// reported them.
    pub installed_models: Vec<String>,
    /// Filenames of models this agent currently has loaded into a worker.
    pub loaded_models: Vec<String>,
    /// Number of inference requests currently dispatched to this agent.
    ///
    /// Advisory: the source this fleet is modeled on never decrements it on
    /// every path, so the router reconciles it on disconnect rather than
    /// trusting it as an exact count.
    pub pending_request_count: Arc<AtomicUsize>,
}

/// An event fired whenever the set of connected agents changes.
#[derive(Clone, Debug)]
pub enum RegistryEvent {
    /// An agent registered, possibly evicting a prior connection with the
    /// same id.
    Connected {
        /// The newly registered agent's id.
        agent_id: String,
    },
    /// An agent's transport closed and its record was removed.
    Disconnected {
        /// The id of the agent that disconnected.
        agent_id: String,
    },
}

struct Entry {
    record: AgentRecord,
    evict: Box<dyn FnOnce(u16) + Send>,
}

struct Inner {
    by_id: HashMap<String, Entry>,
    /// Registration order, oldest first; used to break dispatch ties and to
    /// give `list()` a stable, documented order.
    order: Vec<String>,
}

/// The controller's table of connected agents.
///
/// A mapping from `agent_id` to [`AgentRecord`], plus a broadcast of
/// [`RegistryEvent`]s for anything that needs to react to connects and
/// disconnects (the router aborts in-flight requests bound to a
/// disconnecting agent; the rest of the controller mostly just polls
/// [`AgentRegistry::list`]).
pub struct AgentRegistry {
    inner: Mutex<Inner>,
    events: broadcast::Sender<RegistryEvent>,
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentRegistry {
    /// Returns an empty registry.
    pub fn new() -> Self {
        let (events, _rx) = broadcast::channel(EVENT_CHAN_SIZE);
        AgentRegistry {
            inner: Mutex::new(Inner {
                by_id: HashMap::new(),
                order: Vec::new(),
            }),
            events,
        }
    }

    /// Subscribe to registry-change events.
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    /// Register a newly connected agent.
    ///
    /// If `agent_id` is already registered, the prior connection's `evict`
    /// callback runs with close code 1001 before the new record replaces it,
    /// and the new record starts at the end of the registration order.
    pub fn register(
        &self,
        agent_id: String,
        name: String,
        installed_models: Vec<String>,
        peer: PeerHandle,
        evict: impl FnOnce(u16) + Send + 'static,
    ) {
        let record = AgentRecord {
            id: agent_id.clone(),
            name,
            peer,
            installed_models,
            loaded_models: Vec::new(),
            pending_request_count: Arc::new(AtomicUsize::new(0)),
        };
        let mut inner = self.inner.lock().expect("poisoned");
        if let Some(prev) = inner.by_id.remove(&agent_id) {
            inner.order.retain(|id| id != &agent_id);
            (prev.evict)(CLOSE_EVICTED);
        }
        inner.order.push(agent_id.clone());
        inner.by_id.insert(
            agent_id.clone(),
            Entry {
                record,
                evict: Box::new(evict),
            },
        );
        drop(inner);
        let _ = self.events.send(RegistryEvent::Connected { agent_id });
    }

    /// Replace `agent_id`'s installed-model set, dropping any loaded models
    /// that are no longer installed.
    pub fn update_models(&self, agent_id: &str, installed_models: Vec<String>) {
        let mut inner = self.inner.lock().expect("poisoned");
        if let Some(entry) = inner.by_id.get_mut(agent_id) {
            entry
                .record
                .loaded_models
                .retain(|m| installed_models.contains(m));
            entry.record.installed_models = installed_models;
        }
    }

    /// Replace `agent_id`'s loaded-model set.
    pub fn update_loaded(&self, agent_id: &str, loaded_models: Vec<String>) {
        let mut inner = self.inner.lock().expect("poisoned");
        if let Some(entry) = inner.by_id.get_mut(agent_id) {
            entry.record.loaded_models = loaded_models;
        }
    }

    /// Remove `agent_id`'s record, e.g. because its transport closed.
    ///
    /// No-op, and fires no event, if the id was not registered (it may have
    /// already been evicted by a later registration of the same id).
    pub fn deregister(&self, agent_id: &str) {
        let mut inner = self.inner.lock().expect("poisoned");
        if inner.by_id.remove(agent_id).is_some() {
            inner.order.retain(|id| id != agent_id);
            drop(inner);
            let _ = self.events.send(RegistryEvent::Disconnected {
                agent_id: agent_id.to_owned(),
            });
        }
    }

    /// All currently registered agents, oldest registration first.
    pub fn list(&self) -> Vec<AgentRecord> {
        let inner = self.inner.lock().expect("poisoned");
        inner
            .order
            .iter()
            .filter_map(|id| inner.by_id.get(id).map(|e| e.record.clone()))
            .collect()
    }

    /// Agents whose installed models include `internal_name`, oldest
    /// registration first.
    pub fn find_for_model(&self, internal_name: &str) -> Vec<AgentRecord> {
        self.list()
            .into_iter()
            .filter(|a| a.installed_models.iter().any(|m| m == internal_name))
            .collect()
    }

    /// Look up a single agent's current record.
    pub fn get(&self, agent_id: &str) -> Option<AgentRecord> {
        let inner = self.inner.lock().expect("poisoned");
        inner.by_id.get(agent_id).map(|e| e.record.clone())
    }
}

/// Close code used to evict a connection displaced by a fresh registration
/// under the same agent id. Must stay in sync with
/// `piercer_transport::CLOSE_EVICTED`.
const CLOSE_EVICTED: u16 = 1001;

#[cfg(test)]
mod test {
    use super::*;
    use piercer_rpc::{MethodRegistry, Peer};

    fn dummy_peer() -> PeerHandle {
        let (_peer, handle) = Peer::new(MethodRegistry::new());
        handle
    }

    #[test]
    fn duplicate_registration_evicts_prior_holder() {
        let registry = AgentRegistry::new();
        let evicted = Arc::new(AtomicUsize::new(0));

        let evicted1 = evicted.clone();
        registry.register(
            "a1".into(),
            "first".into(),
            vec!["m1".into()],
            dummy_peer(),
            move |code| {
                assert_eq!(code, 1001);
                evicted1.fetch_add(1, Ordering::SeqCst);
            },
        );
        registry.register(
            "a1".into(),
            "second".into(),
            vec!["m1".into()],
            dummy_peer(),
            |_code| {},
        );

        assert_eq!(evicted.load(Ordering::SeqCst), 1);
        let agents = registry.list();
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].name, "second");
    }

    #[test]
    fn update_models_drops_unloaded_models_no_longer_installed() {
        let registry = AgentRegistry::new();
        registry.register(
            "a1".into(),
            "agent".into(),
            vec!["m1".into(), "m2".into()],
            dummy_peer(),
            |_| {},
        );
        registry.update_loaded("a1", vec!["m1".into(), "m2".into()]);
        registry.update_models("a1", vec!["m2".into()]);

        let agent = registry.get("a1").unwrap();
        assert_eq!(agent.installed_models, vec!["m2".to_string()]);
        assert_eq!(agent.loaded_models, vec!["m2".to_string()]);
    }

    #[test]
    fn find_for_model_preserves_registration_order() {
        let registry = AgentRegistry::new();
        registry.register("a1".into(), "1".into(), vec!["shared".into()], dummy_peer(), |_| {});
        registry.register("a2".into(), "2".into(), vec!["shared".into()], dummy_peer(), |_| {});

        let found = registry.find_for_model("shared");
        assert_eq!(found.iter().map(|a| a.id.clone()).collect::<Vec<_>>(), vec!["a1", "a2"]);
    }

    #[tokio::test]
    async fn deregister_fires_disconnected_event() {
        let registry = AgentRegistry::new();
        let mut events = registry.subscribe();
        registry.register("a1".into(), "1".into(), vec![], dummy_peer(), |_| {});
        assert!(matches!(events.recv().await.unwrap(), RegistryEvent::Connected { agent_id } if agent_id == "a1"));

        registry.deregister("a1");
        assert!(matches!(events.recv().await.unwrap(), RegistryEvent::Disconnected { agent_id } if agent_id == "a1"));
        assert!(registry.get("a1").is_none());
    }
}
