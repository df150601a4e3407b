//! FileHive Configuration
//!
//! This module provides configuration structures for a FileHive
//! storage node and its cluster settings.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main FileHive configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileHiveConfig {
    /// Node-specific configuration
    pub node: NodeConfig,

    /// Cluster configuration
    pub cluster: ClusterConfig,

    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// API configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Node-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Unique node identifier (must appear in cluster.members)
    pub id: String,

    /// Address to bind the HTTP server
    pub bind_address: String,

    /// Directory for stored files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

/// Cluster configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// All node identifiers participating in the cluster, including self
    pub members: Vec<String>,

    /// Base URLs of peer nodes (excluding self)
    #[serde(default)]
    pub peers: Vec<String>,

    /// Leader rotation interval in seconds
    #[serde(default = "default_election_interval_secs")]
    pub election_interval_secs: u64,

    /// Heartbeat cycle interval in seconds
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,

    /// Per-probe timeout for heartbeat checks in seconds
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,

    /// Delay before each replication transfer in milliseconds
    #[serde(default = "default_replication_delay_ms")]
    pub replication_delay_ms: u64,

    /// Per-transfer timeout for replication uploads in seconds
    #[serde(default = "default_replication_timeout_secs")]
    pub replication_timeout_secs: u64,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Maximum total bytes of stored files
    #[serde(default = "default_quota_bytes")]
    pub quota_bytes: u64,
}

/// API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Enable permissive CORS on all endpoints
    #[serde(default = "default_true")]
    pub cors_enabled: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions

fn default_data_dir() -> PathBuf {
    PathBuf::from("./storage_data")
}

fn default_election_interval_secs() -> u64 {
    10
}

fn default_heartbeat_interval_secs() -> u64 {
    5
}

fn default_probe_timeout_secs() -> u64 {
    2
}

fn default_replication_delay_ms() -> u64 {
    500
}

fn default_replication_timeout_secs() -> u64 {
    30
}

fn default_quota_bytes() -> u64 {
    100 * 1024 * 1024
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            quota_bytes: default_quota_bytes(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { cors_enabled: true }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl FileHiveConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: FileHiveConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML string
    pub fn from_str(content: &str) -> crate::Result<Self> {
        let config: FileHiveConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.node.id.is_empty() {
            return Err(crate::Error::Config("node.id cannot be empty".into()));
        }

        if self.node.bind_address.is_empty() {
            return Err(crate::Error::Config("node.bind_address cannot be empty".into()));
        }

        if self.cluster.members.is_empty() {
            return Err(crate::Error::Config("cluster.members cannot be empty".into()));
        }

        if !self.cluster.members.contains(&self.node.id) {
            return Err(crate::Error::Config(format!(
                "node.id '{}' must appear in cluster.members",
                self.node.id
            )));
        }

        if self.cluster.election_interval_secs == 0 {
            return Err(crate::Error::Config(
                "cluster.election_interval_secs must be greater than zero".into(),
            ));
        }

        if self.cluster.heartbeat_interval_secs == 0 {
            return Err(crate::Error::Config(
                "cluster.heartbeat_interval_secs must be greater than zero".into(),
            ));
        }

        Ok(())
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &PathBuf {
        &self.node.data_dir
    }

    /// Get election interval as Duration
    pub fn election_interval(&self) -> Duration {
        Duration::from_secs(self.cluster.election_interval_secs)
    }

    /// Get heartbeat interval as Duration
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.cluster.heartbeat_interval_secs)
    }

    /// Get heartbeat probe timeout as Duration
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.cluster.probe_timeout_secs)
    }

    /// Get replication dispatch delay as Duration
    pub fn replication_delay(&self) -> Duration {
        Duration::from_millis(self.cluster.replication_delay_ms)
    }

    /// Get replication transfer timeout as Duration
    pub fn replication_timeout(&self) -> Duration {
        Duration::from_secs(self.cluster.replication_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml = r#"
[node]
id = "8000"
bind_address = "0.0.0.0:8000"
data_dir = "/var/lib/filehive"

[cluster]
members = ["8000", "8001", "8002"]
peers = ["http://localhost:8001", "http://localhost:8002"]
election_interval_secs = 10
heartbeat_interval_secs = 5
"#;

        let config = FileHiveConfig::from_str(toml).unwrap();
        assert_eq!(config.node.id, "8000");
        assert_eq!(config.cluster.members.len(), 3);
        assert_eq!(config.cluster.peers.len(), 2);
        assert_eq!(config.election_interval(), Duration::from_secs(10));
        assert_eq!(config.probe_timeout(), Duration::from_secs(2));
        assert_eq!(config.storage.quota_bytes, 100 * 1024 * 1024);
        assert!(config.api.cors_enabled);
    }

    #[test]
    fn test_self_must_be_member() {
        let toml = r#"
[node]
id = "9999"
bind_address = "0.0.0.0:9999"

[cluster]
members = ["8000", "8001"]
"#;

        let err = FileHiveConfig::from_str(toml).unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let toml = r#"
[node]
id = "8000"
bind_address = "0.0.0.0:8000"

[cluster]
members = ["8000"]
election_interval_secs = 0
"#;

        assert!(FileHiveConfig::from_str(toml).is_err());
    }
}
