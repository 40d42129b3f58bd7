//! Configuration for the agent binary.

use std::path::PathBuf;
use std::time::Duration;

use derive_builder::Builder;
use serde::Deserialize;

use crate::{from_env, ConfigBuildError, ConfigError};

/// Configuration for a running agent process.
///
/// Loaded entirely from the environment; see [`AgentConfig::from_env`].
#[derive(Debug, Clone, Builder)]
#[builder(build_fn(error = "ConfigBuildError"))]
#[builder(derive(Debug, Deserialize))]
pub struct AgentConfig {
    /// WebSocket URL of the controller to connect to, e.g.
    /// `wss://controller.example.com/ws`.
    ///
    /// Set via `CONTROLLER_URL`.
    pub controller_url: String,

    /// Bearer credential presented to the controller on connect.
    ///
    /// Set via `AGENT_SECRET_KEY`.
    pub agent_secret_key: String,

    /// Human-readable name reported to the controller alongside the
    /// agent's persistent id.
    ///
    /// Set via `AGENT_NAME`.
    pub agent_name: String,

    /// Directory scanned for installed model files (`*.gguf`, `*.ggml`).
    ///
    /// Set via `MODELS_DIR`; defaults to `./models`.
    #[builder(default = "PathBuf::from(\"./models\")")]
    pub models_dir: PathBuf,

    /// Directory holding this agent's persistent state, notably
    /// `agent-id.txt`.
    ///
    /// Set via `AGENT_DATA_DIR`; defaults to `./data`.
    #[builder(default = "PathBuf::from(\"./data\")")]
    pub agent_data_dir: PathBuf,

    /// Maximum number of model worker processes running at once.
    ///
    /// Set via `MAX_CONCURRENT_MODELS`; defaults to `1`.
    #[builder(default = "1")]
    pub max_concurrent_models: usize,

    /// How often to sample and report hardware metrics to the controller.
    ///
    /// Set via `HARDWARE_POLL_INTERVAL_MS`; defaults to 5 seconds.
    #[builder(default = "Duration::from_millis(5_000)")]
    pub hardware_poll_interval: Duration,
}

impl AgentConfig {
    /// Returns a fresh, empty builder.
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder::default()
    }

    /// Load configuration from the process environment.
    ///
    /// Reads `CONTROLLER_URL`, `AGENT_SECRET_KEY`, `AGENT_NAME`,
    /// `MODELS_DIR`, `AGENT_DATA_DIR`, `MAX_CONCURRENT_MODELS`, and
    /// `HARDWARE_POLL_INTERVAL_MS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw: AgentConfigEnv = from_env()?;
        Ok(raw.into_builder().build()?)
    }
}

/// Shadow struct matching the shape of the environment variables; only
/// `hardware_poll_interval_ms` differs in name from its `AgentConfig` field,
/// since the unit belongs in the variable name but not the struct field.
#[derive(Debug, Deserialize)]
struct AgentConfigEnv {
    controller_url: Option<String>,
    agent_secret_key: Option<String>,
    agent_name: Option<String>,
    models_dir: Option<PathBuf>,
    agent_data_dir: Option<PathBuf>,
    max_concurrent_models: Option<usize>,
    hardware_poll_interval_ms: Option<u64>,
}

impl AgentConfigEnv {
    /// Convert into a builder, leaving fields with no matching variable at
    /// their builder default (or unset, for mandatory fields).
    fn into_builder(self) -> AgentConfigBuilder {
        let mut b = AgentConfigBuilder::default();
        if let Some(v) = self.controller_url {
            b.controller_url(v);
        }
        if let Some(v) = self.agent_secret_key {
            b.agent_secret_key(v);
        }
        if let Some(v) = self.agent_name {
            b.agent_name(v);
        }
        if let Some(v) = self.models_dir {
            b.models_dir(v);
        }
        if let Some(v) = self.agent_data_dir {
            b.agent_data_dir(v);
        }
        if let Some(v) = self.max_concurrent_models {
            b.max_concurrent_models(v);
        }
        if let Some(ms) = self.hardware_poll_interval_ms {
            b.hardware_poll_interval(Duration::from_millis(ms));
        }
        b
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_fill_in_when_mandatory_fields_set() {
        let cfg = AgentConfig::builder()
            .controller_url("wss://controller.example/ws".into())
            .agent_secret_key("s3cr3t".into())
            .agent_name("agent-1".into())
            .build()
            .unwrap();
        assert_eq!(cfg.max_concurrent_models, 1);
        assert_eq!(cfg.models_dir, PathBuf::from("./models"));
        assert_eq!(cfg.hardware_poll_interval, Duration::from_millis(5_000));
    }

    #[test]
    fn missing_mandatory_field_is_reported() {
        let err = AgentConfig::builder()
            .agent_secret_key("s3cr3t".into())
            .agent_name("agent-1".into())
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigBuildError::MissingField(f) if f == "controller_url"));
    }
}
