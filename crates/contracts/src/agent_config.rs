//! AgentsConfig - operator configuration surface
//!
//! ```toml
//! [agents.blobs]
//! port = 35001
//! max_blob_size_in_kb = 512
//!
//! [agents.blobs.dispatchers.file]
//! base_path = "/var/lib/blobs"
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{DispatcherConfig, DispatcherParams};

/// Name of the blob agent's configuration section
pub const BLOB_AGENT_NAME: &str = "blobs";

/// Root configuration: one section per agent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentsConfig {
    /// Agent name -> agent configuration
    #[serde(default)]
    pub agents: BTreeMap<String, BlobAgentConfig>,
}

impl AgentsConfig {
    /// Look up an agent section by name
    pub fn agent(&self, name: &str) -> Option<&BlobAgentConfig> {
        self.agents.get(name)
    }

    /// Mutable lookup (used for CLI overrides)
    pub fn agent_mut(&mut self, name: &str) -> Option<&mut BlobAgentConfig> {
        self.agents.get_mut(name)
    }

    /// The `blobs` agent section
    pub fn blobs(&self) -> Option<&BlobAgentConfig> {
        self.agent(BLOB_AGENT_NAME)
    }
}

/// Configuration of the blob ingestion agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobAgentConfig {
    /// Whether the agent should be started at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// Listening port
    pub port: u16,

    /// Maximum accepted blob size in KiB
    #[serde(alias = "maxBlobSizeInKB")]
    pub max_blob_size_in_kb: u32,

    /// Upper bound for a single dispatcher's `accept` call
    #[serde(default = "default_dispatch_timeout_ms")]
    pub dispatch_timeout_ms: u64,

    /// How long shutdown waits for in-flight requests to drain
    #[serde(default = "default_shutdown_grace_period_ms")]
    pub shutdown_grace_period_ms: u64,

    /// Dispatcher name -> dispatcher configuration block
    #[serde(default)]
    pub dispatchers: BTreeMap<String, DispatcherParams>,
}

fn default_enabled() -> bool {
    true
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_dispatch_timeout_ms() -> u64 {
    5_000
}

fn default_shutdown_grace_period_ms() -> u64 {
    30_000
}

impl BlobAgentConfig {
    /// Minimal configuration with defaults for every optional field
    pub fn new(port: u16, max_blob_size_in_kb: u32) -> Self {
        Self {
            enabled: default_enabled(),
            host: default_host(),
            port,
            max_blob_size_in_kb,
            dispatch_timeout_ms: default_dispatch_timeout_ms(),
            shutdown_grace_period_ms: default_shutdown_grace_period_ms(),
            dispatchers: BTreeMap::new(),
        }
    }

    /// Add a dispatcher block (builder style)
    pub fn with_dispatcher(mut self, name: impl Into<String>, params: DispatcherParams) -> Self {
        self.dispatchers.insert(name.into(), params);
        self
    }

    /// Size limit in bytes (`max_blob_size_in_kb * 1024`)
    pub fn max_blob_size_in_bytes(&self) -> usize {
        self.max_blob_size_in_kb as usize * 1024
    }

    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch_timeout_ms)
    }

    pub fn shutdown_grace_period(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_period_ms)
    }

    /// `host:port` string for binding
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Dispatcher blocks in key order
    pub fn dispatcher_configs(&self) -> Vec<DispatcherConfig> {
        self.dispatchers
            .iter()
            .map(|(name, params)| DispatcherConfig::new(name, params.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_alias() {
        let content = r#"
[agents.blobs]
port = 35001
maxBlobSizeInKB = 1

[agents.blobs.dispatchers.file]
base_path = "/tmp/blobs"
"#;
        let config: AgentsConfig = toml::from_str(content).unwrap();
        let blobs = config.blobs().unwrap();
        assert!(blobs.enabled);
        assert_eq!(blobs.host, "0.0.0.0");
        assert_eq!(blobs.max_blob_size_in_bytes(), 1024);
        assert_eq!(blobs.dispatch_timeout(), Duration::from_secs(5));
        assert_eq!(blobs.dispatcher_configs().len(), 1);
        assert_eq!(blobs.dispatcher_configs()[0].name(), "file");
    }

    #[test]
    fn test_port_is_required() {
        let content = r#"
[agents.blobs]
max_blob_size_in_kb = 1
"#;
        assert!(toml::from_str::<AgentsConfig>(content).is_err());
    }
}
