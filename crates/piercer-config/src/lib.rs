//! Configuration for the controller and agent binaries.
//!
//! Both processes are configured entirely from the environment. Reading
//! happens through [`figment`], the same layered-sources approach used
//! elsewhere in the fleet's configuration surface, so a file-backed
//! provider can be added later without touching call sites. Field
//! defaults are supplied by a [`derive_builder`] builder rather than
//! `#[derive(Default)]`, so that non-trivial defaults (a bind address, a
//! poll interval) live next to the field they belong to.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod agent;
mod controller;
mod err;

pub use agent::{AgentConfig, AgentConfigBuilder};
pub use controller::{ControllerConfig, ControllerConfigBuilder};
pub use err::ConfigBuildError;

use figment::{providers::Env, Figment};
use piercer_error::{ErrorKind, HasKind};
use serde::de::DeserializeOwned;

/// Errors that can occur while resolving configuration from the process
/// environment.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A required variable was missing, or a present one failed validation.
    #[error("invalid configuration: {0}")]
    Invalid(#[from] ConfigBuildError),

    /// `figment` could not extract the raw fields from the environment
    /// (usually a type mismatch, like a non-numeric value for a numeric field).
    #[error("could not read environment: {0}")]
    Source(#[source] Box<figment::Error>),
}

impl HasKind for ConfigError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Fatal
    }
}

/// Extract a raw, builder-shaped `T` from the process environment.
///
/// `T` is expected to be a `*Builder` type generated by `derive_builder`,
/// whose fields are all `Option<_>` and therefore tolerate missing
/// variables; [`ConfigBuildError::MissingField`] is raised later, when the
/// builder itself is built.
fn from_env<T: DeserializeOwned>() -> Result<T, ConfigError> {
    Figment::new()
        .merge(Env::raw())
        .extract()
        .map_err(|e| ConfigError::Source(Box::new(e)))
}
