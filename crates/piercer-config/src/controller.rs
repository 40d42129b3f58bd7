//! Configuration for the controller binary.

use std::net::SocketAddr;

use derive_builder::Builder;
use serde::Deserialize;

use crate::{from_env, ConfigBuildError, ConfigError};

/// Configuration for a running controller process.
///
/// Loaded entirely from the environment; see [`ControllerConfig::from_env`].
#[derive(Debug, Clone, Builder)]
#[builder(build_fn(error = "ConfigBuildError"))]
#[builder(derive(Debug, Deserialize))]
pub struct ControllerConfig {
    /// Address the HTTP server listens on.
    ///
    /// Set via `BIND_ADDR`; defaults to `0.0.0.0:8080`.
    #[builder(default = "([0, 0, 0, 0], 8080).into()")]
    pub bind_addr: SocketAddr,

    /// Bearer credential required of agents connecting to `/ws`.
    ///
    /// Set via `AGENT_SECRET_KEY`.
    pub agent_secret_key: String,

    /// Optional bearer credential required of HTTP clients calling
    /// `/v1/*`. When unset, those routes are unauthenticated.
    ///
    /// Set via `API_KEY`.
    #[builder(default)]
    pub api_key: Option<String>,
}

impl ControllerConfig {
    /// Returns a fresh, empty builder.
    pub fn builder() -> ControllerConfigBuilder {
        ControllerConfigBuilder::default()
    }

    /// Load configuration from the process environment.
    ///
    /// Reads `BIND_ADDR`, `AGENT_SECRET_KEY`, and `API_KEY`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw: ControllerConfigEnv = from_env()?;
        Ok(raw.into_builder().build()?)
    }

    /// Returns true if HTTP clients calling `/v1/*` must present `key` as
    /// a bearer token.
    pub fn accepts_api_key(&self, key: &str) -> bool {
        match &self.api_key {
            Some(expected) => expected == key,
            None => true,
        }
    }
}

/// Shadow struct matching the shape of the environment variables.
#[derive(Debug, Deserialize)]
struct ControllerConfigEnv {
    bind_addr: Option<SocketAddr>,
    agent_secret_key: Option<String>,
    api_key: Option<String>,
}

impl ControllerConfigEnv {
    /// Convert into a builder, leaving fields with no matching variable at
    /// their builder default (or unset, for mandatory fields).
    fn into_builder(self) -> ControllerConfigBuilder {
        let mut b = ControllerConfigBuilder::default();
        if let Some(v) = self.bind_addr {
            b.bind_addr(v);
        }
        if let Some(v) = self.agent_secret_key {
            b.agent_secret_key(v);
        }
        if self.api_key.is_some() {
            b.api_key(self.api_key);
        }
        b
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_fill_in_when_mandatory_fields_set() {
        let cfg = ControllerConfig::builder()
            .agent_secret_key("s3cr3t".into())
            .build()
            .unwrap();
        assert_eq!(cfg.bind_addr, ([0, 0, 0, 0], 8080).into());
        assert!(cfg.api_key.is_none());
        assert!(cfg.accepts_api_key("anything"));
    }

    #[test]
    fn api_key_is_checked_when_set() {
        let cfg = ControllerConfig::builder()
            .agent_secret_key("s3cr3t".into())
            .api_key(Some("topsecret".into()))
            .build()
            .unwrap();
        assert!(cfg.accepts_api_key("topsecret"));
        assert!(!cfg.accepts_api_key("wrong"));
    }

    #[test]
    fn missing_mandatory_field_is_reported() {
        let err = ControllerConfig::builder().build().unwrap_err();
        assert!(matches!(err, ConfigBuildError::MissingField(f) if f == "agent_secret_key"));
    }
}
