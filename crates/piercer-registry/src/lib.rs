//! The controller's view of its fleet: which agents are connected, which
//! models each hosts, and the public-name mapping clients address models by.
//!
//! [`AgentRegistry`] is the single source of truth for agent connections;
//! the router consults it on every request and never keeps its own copy of
//! agent state.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod agent;
mod mappings;

pub use agent::{AgentRecord, AgentRegistry, RegistryEvent};
pub use mappings::{InMemoryMappingStore, MappingStore, ModelMapping};
