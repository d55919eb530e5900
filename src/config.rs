//! Configuration file loading.
//!
//! ```toml
//! [client]
//! request_timeout_ms = 250
//! read_from = "primary"          # or "prefer_replica"
//! max_fanout_concurrency = 64
//! refresh_interval_ms = 0
//!
//! [logging]
//! level = "warn"
//! format = "text"                # or "json"
//!
//! [[nodes]]
//! address = "127.0.0.1:7000"
//! slots = ["0-5460"]
//!
//! [[nodes]]
//! address = "127.0.0.1:7003"
//! role = "replica"
//! replica_of = "127.0.0.1:7000"
//! ```

use crate::cluster::{ClientConfig, NodeAddress, NodeInfo, NodeRole, SlotRange};
use crate::error::{AikvError, Result};
use crate::observability::{LogConfig, LogFormat};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

/// Logging section of the configuration file
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Text,
        }
    }
}

impl LoggingSection {
    pub fn to_log_config(&self) -> Result<LogConfig> {
        let level = LogConfig::parse_level(&self.level)
            .ok_or_else(|| AikvError::Config(format!("Invalid log level '{}'", self.level)))?;
        Ok(LogConfig {
            level,
            format: self.format,
        })
    }
}

fn default_role() -> NodeRole {
    NodeRole::Primary
}

/// One `[[nodes]]` entry
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    pub address: NodeAddress,
    #[serde(default = "default_role")]
    pub role: NodeRole,
    /// Inclusive slot ranges such as `"0-5460"` or a single `"42"`
    #[serde(default)]
    pub slots: Vec<String>,
    #[serde(default)]
    pub replica_of: Option<NodeAddress>,
}

impl NodeConfig {
    pub fn to_node_info(&self) -> Result<NodeInfo> {
        let slots = self
            .slots
            .iter()
            .map(|s| parse_slot_range(s))
            .collect::<Result<Vec<_>>>()?;
        Ok(NodeInfo {
            address: self.address.clone(),
            role: self.role,
            slots,
            replica_of: self.replica_of.clone(),
        })
    }
}

fn parse_slot_range(s: &str) -> Result<SlotRange> {
    let parse = |v: &str| {
        v.trim()
            .parse::<u16>()
            .map_err(|_| AikvError::Config(format!("Invalid slot range '{}'", s)))
    };
    match s.split_once('-') {
        Some((first, last)) => SlotRange::inclusive(parse(first)?, parse(last)?),
        None => {
            let slot = parse(s)?;
            SlotRange::inclusive(slot, slot)
        }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub client: ClientConfig,
    pub logging: LoggingSection,
    pub nodes: Vec<NodeConfig>,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AikvError::Config(format!("Failed to read '{}': {}", path.display(), e))
        })?;
        content.parse()
    }

    /// Topology seed described by the `[[nodes]]` entries
    pub fn node_infos(&self) -> Result<Vec<NodeInfo>> {
        self.nodes.iter().map(NodeConfig::to_node_info).collect()
    }
}

impl FromStr for Config {
    type Err = AikvError;

    fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| AikvError::Config(e.to_string()))
    }
}
