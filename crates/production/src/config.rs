//! Node configuration loaded from TOML.
//!
//! ```toml
//! [node]
//! replica_id = 1
//! replica_count = 4
//!
//! [ordering]
//! strategy = "natural_order"   # or "anchor_front"
//!
//! [runner]
//! channel_capacity = 10000
//! command_poll_interval_ms = 50
//!
//! [telemetry]
//! log_filter = "info,phalanx_ordering=debug"
//! ```

use crate::telemetry::TelemetryConfig;
use phalanx_ordering::{OrderingConfig, SelectionStrategy};
use phalanx_types::{ParamsError, QuorumParams, ReplicaId};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid replica parameters: {0}")]
    Params(#[from] ParamsError),

    #[error("replica_id {replica_id} is outside 1..={replica_count}")]
    ReplicaOutOfRange { replica_id: u64, replica_count: usize },

    #[error("channel_capacity must be greater than zero")]
    ZeroChannelCapacity,
}

/// Top-level node configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// Replica identity and cluster size
    pub node: NodeSection,

    /// Ordering engine configuration
    #[serde(default)]
    pub ordering: OrderingSection,

    /// Runner configuration
    #[serde(default)]
    pub runner: RunnerSection,

    /// Log output configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Replica identity.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeSection {
    /// This replica's id, 1-based
    pub replica_id: u64,

    /// Number of replicas in the cluster
    pub replica_count: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderingSection {
    #[serde(default)]
    pub strategy: SelectionStrategy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunnerSection {
    /// Capacity of the bounded evidence channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// How often blocks waiting for their command body re-poll the store
    #[serde(default = "default_command_poll_interval_ms")]
    pub command_poll_interval_ms: u64,
}

impl Default for RunnerSection {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            command_poll_interval_ms: default_command_poll_interval_ms(),
        }
    }
}

fn default_channel_capacity() -> usize {
    10_000
}

fn default_command_poll_interval_ms() -> u64 {
    50
}

impl NodeConfig {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: NodeConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let params = self.quorum_params()?;
        if !params.contains(self.replica_id()) {
            return Err(ConfigError::ReplicaOutOfRange {
                replica_id: self.node.replica_id,
                replica_count: self.node.replica_count,
            });
        }
        if self.runner.channel_capacity == 0 {
            return Err(ConfigError::ZeroChannelCapacity);
        }
        Ok(())
    }

    pub fn quorum_params(&self) -> Result<QuorumParams, ConfigError> {
        Ok(QuorumParams::new(self.node.replica_count)?)
    }

    pub fn replica_id(&self) -> ReplicaId {
        ReplicaId(self.node.replica_id)
    }

    pub fn ordering_config(&self) -> OrderingConfig {
        OrderingConfig::with_strategy(self.ordering.strategy)
    }

    pub fn command_poll_interval(&self) -> Duration {
        Duration::from_millis(self.runner.command_poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = NodeConfig::from_toml_str(
            r#"
            [node]
            replica_id = 2
            replica_count = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.replica_id(), ReplicaId(2));
        assert_eq!(config.quorum_params().unwrap().quorum(), 3);
        assert_eq!(config.ordering.strategy, SelectionStrategy::NaturalOrder);
        assert_eq!(config.runner.channel_capacity, 10_000);
        assert_eq!(config.command_poll_interval(), Duration::from_millis(50));
        assert_eq!(config.telemetry.log_filter, "info");
    }

    #[test]
    fn test_full_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            [node]
            replica_id = 7
            replica_count = 7

            [ordering]
            strategy = "anchor_front"

            [runner]
            channel_capacity = 64
            command_poll_interval_ms = 5

            [telemetry]
            log_filter = "debug"
            "#
        )
        .unwrap();

        let config = NodeConfig::load(file.path()).unwrap();
        assert_eq!(config.ordering_config().strategy, SelectionStrategy::AnchorFront);
        assert_eq!(config.runner.channel_capacity, 64);
        assert_eq!(config.command_poll_interval(), Duration::from_millis(5));
        assert_eq!(config.telemetry.log_filter, "debug");
    }

    #[test]
    fn test_validation_errors() {
        let out_of_range = NodeConfig::from_toml_str(
            r#"
            [node]
            replica_id = 5
            replica_count = 4
            "#,
        );
        assert!(matches!(
            out_of_range,
            Err(ConfigError::ReplicaOutOfRange { replica_id: 5, .. })
        ));

        let empty = NodeConfig::from_toml_str(
            r#"
            [node]
            replica_id = 1
            replica_count = 0
            "#,
        );
        assert!(matches!(empty, Err(ConfigError::Params(ParamsError::NoReplicas))));

        let zero_capacity = NodeConfig::from_toml_str(
            r#"
            [node]
            replica_id = 1
            replica_count = 1

            [runner]
            channel_capacity = 0
            "#,
        );
        assert!(matches!(zero_capacity, Err(ConfigError::ZeroChannelCapacity)));

        assert!(matches!(
            NodeConfig::from_toml_str("[node]\nreplica_id = 1"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            NodeConfig::load("/nonexistent/phalanx.toml"),
            Err(ConfigError::Io { .. })
        ));
    }
}
