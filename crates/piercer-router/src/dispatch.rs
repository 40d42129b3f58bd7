//! Which agent gets a completion/chat request.

use std::sync::atomic::Ordering;

use piercer_registry::AgentRecord;

/// Pick one agent to run `internal_name` from `candidates`.
///
/// `candidates` must already be every agent with `internal_name` installed,
/// in registration order (as [`piercer_registry::AgentRegistry::find_for_model`]
/// returns them). Agents that already have the model loaded are preferred,
/// tie-broken by the least `pending_request_count`; a stable sort then
/// leaves registration order as the final tiebreak. If none have it loaded,
/// any agent with it installed is returned so it can load on first use.
pub fn pick_agent(candidates: Vec<AgentRecord>, internal_name: &str) -> Option<AgentRecord> {
    let mut loaded: Vec<AgentRecord> = candidates
        .iter()
        .filter(|a| a.loaded_models.iter().any(|m| m == internal_name))
        .cloned()
        .collect();
    if !loaded.is_empty() {
        loaded.sort_by_key(|a| a.pending_request_count.load(Ordering::SeqCst));
        return loaded.into_iter().next();
    }
    candidates.into_iter().next()
}
