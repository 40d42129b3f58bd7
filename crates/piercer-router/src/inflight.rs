//! The table correlating a minted `request_id` back to the HTTP response
//! that is waiting on it.
//!
//! One entry lives here for as long as a completion/chat request is
//! outstanding: from the moment the router calls out to an agent until a
//! `[DONE]` or `error` callback retires it. The agent's callbacks only ever
//! carry a `request_id`; this table is how the router turns that back into
//! "which SSE connection gets this chunk."

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use piercer_protocol::params::CompletionData;
use serde_json::Value;
use tokio::sync::mpsc;

/// One item delivered to a request's SSE receiver.
#[derive(Debug, Clone)]
pub enum InFlightEvent {
    /// An opaque chunk, forwarded to the client unexamined.
    Chunk(Value),
    /// The stream ended normally.
    Done,
    /// The agent reported an inference failure; the stream ends here too.
    Error(String),
}

struct Entry {
    agent_id: String,
    pending: Arc<AtomicUsize>,
    tx: mpsc::UnboundedSender<InFlightEvent>,
    closed: AtomicBool,
}

/// Tracks every completion/chat request currently awaiting callbacks from
/// an agent.
#[derive(Default)]
pub struct InFlightTable {
    by_id: Mutex<HashMap<String, Entry>>,
}

impl InFlightTable {
    /// Returns an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new in-flight request, returning the receiver its events
    /// arrive on.
    ///
    /// `pending` is the agent's `pending_request_count` counter; this table
    /// increments it now and decrements it exactly once, whenever this
    /// request's entry is later retired (by [`InFlightTable::deliver`]
    /// reaching a terminal event, by [`InFlightTable::deliver_error`], or by
    /// [`InFlightTable::abort_for_agent`]).
    pub fn register(
        &self,
        request_id: String,
        agent_id: String,
        pending: Arc<AtomicUsize>,
    ) -> mpsc::UnboundedReceiver<InFlightEvent> {
        pending.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        self.by_id.lock().expect("poisoned").insert(
            request_id,
            Entry { agent_id, pending, tx, closed: AtomicBool::new(false) },
        );
        rx
    }

    /// Mark `request_id`'s HTTP side as gone (the client disconnected or
    /// the SSE write failed).
    ///
    /// The entry stays in the table: the agent's outstanding call is not
    /// canceled, so a later callback for this id must still be accepted and
    /// must still retire the entry. Only chunk delivery is suppressed.
    pub fn mark_closed(&self, request_id: &str) {
        if let Some(entry) = self.by_id.lock().expect("poisoned").get(request_id) {
            entry.closed.store(true, Ordering::SeqCst);
        }
    }

    /// Deliver one `receiveCompletion` payload. A `"[DONE]"` sentinel
    /// retires the entry; anything else is forwarded as a chunk.
    ///
    /// Silently a no-op for an unknown `request_id` (already retired, or
    /// never registered on this controller) or a closed one.
    pub fn deliver(&self, request_id: &str, data: CompletionData) {
        let done = data.is_done();
        let event = match data {
            CompletionData::Done(_) => InFlightEvent::Done,
            CompletionData::Chunk(v) => InFlightEvent::Chunk(v),
        };
        if done {
            if let Some(entry) = self.remove(request_id) {
                let _ = entry.tx.send(event);
            }
        } else {
            self.send_if_open(request_id, event);
        }
    }

    /// Deliver an `error(...)` callback; always retires the entry.
    pub fn deliver_error(&self, request_id: &str, message: String) {
        if let Some(entry) = self.remove(request_id) {
            let _ = entry.tx.send(InFlightEvent::Error(message));
        }
    }

    /// Retire every entry belonging to `agent_id`, delivering an error to
    /// each first.
    ///
    /// Called when the registry reports that agent's connection gone, so a
    /// disconnect mid-stream still reaches the HTTP client instead of
    /// hanging forever.
    pub fn abort_for_agent(&self, agent_id: &str, message: &str) {
        let ids: Vec<String> = self
            .by_id
            .lock()
            .expect("poisoned")
            .iter()
            .filter(|(_, e)| e.agent_id == agent_id)
            .map(|(id, _)| id.clone())
            .collect();
        for id in ids {
            self.deliver_error(&id, message.to_owned());
        }
    }

    /// Number of requests currently outstanding. Exposed for tests.
    pub fn len(&self) -> usize {
        self.by_id.lock().expect("poisoned").len()
    }

    fn remove(&self, request_id: &str) -> Option<Entry> {
        let entry = self.by_id.lock().expect("poisoned").remove(request_id)?;
        entry.pending.fetch_sub(1, Ordering::SeqCst);
        Some(entry)
    }

    fn send_if_open(&self, request_id: &str, event: InFlightEvent) {
        let by_id = self.by_id.lock().expect("poisoned");
        if let Some(entry) = by_id.get(request_id) {
            if !entry.closed.load(Ordering::SeqCst) {
                let _ = entry.tx.send(event);
            }
        }
    }
}

#[cfg(test)]
mod test {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn done_retires_the_entry_and_decrements_pending() {
        let table = InFlightTable::new();
        let pending = Arc::new(AtomicUsize::new(0));
        let mut rx = table.register("r1".into(), "a1".into(), pending.clone());
        assert_eq!(pending.load(Ordering::SeqCst), 1);

        table.deliver("r1", CompletionData::done());
        assert!(matches!(rx.try_recv().unwrap(), InFlightEvent::Done));
        assert_eq!(pending.load(Ordering::SeqCst), 0);
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn chunks_after_mark_closed_are_dropped_silently() {
        let table = InFlightTable::new();
        let pending = Arc::new(AtomicUsize::new(0));
        let mut rx = table.register("r1".into(), "a1".into(), pending.clone());
        table.mark_closed("r1");
        table.deliver("r1", CompletionData::Chunk(serde_json::json!({"x": 1})));
        assert!(rx.try_recv().is_err());
        // The entry is still there: a later terminal event must still land.
        assert_eq!(table.len(), 1);
        table.deliver("r1", CompletionData::done());
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn abort_for_agent_retires_only_that_agents_entries() {
        let table = InFlightTable::new();
        let pending_a = Arc::new(AtomicUsize::new(0));
        let pending_b = Arc::new(AtomicUsize::new(0));
        let mut rx_a = table.register("r1".into(), "a1".into(), pending_a.clone());
        let _rx_b = table.register("r2".into(), "a2".into(), pending_b.clone());

        table.abort_for_agent("a1", "agent disconnected");

        assert!(matches!(rx_a.try_recv().unwrap(), InFlightEvent::Error(_)));
        assert_eq!(table.len(), 1);
        assert_eq!(pending_a.load(Ordering::SeqCst), 0);
        assert_eq!(pending_b.load(Ordering::SeqCst), 1);
    }
}
