//! Remote agent: hosts model weights, runs inference jobs dispatched by a
//! controller, and maintains the outbound connection that carries them.

pub mod id;
pub mod methods;
pub mod models;
pub mod sink;
pub mod supervisor;
