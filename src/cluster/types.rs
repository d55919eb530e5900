//! Cluster type definitions: node identities, roles and slot ranges.

use crate::cluster::slot::SLOT_COUNT;
use crate::error::{AikvError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Network identity of a cluster node. Two nodes are the same node when
/// their host and port are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeAddress {
    host: String,
    port: u16,
}

impl NodeAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for NodeAddress {
    type Err = AikvError;

    /// Parses `host:port`, or `[v6-host]:port`
    fn from_str(s: &str) -> Result<Self> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| AikvError::InvalidArgument(format!("Expected HOST:PORT, got '{}'", s)))?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(AikvError::InvalidArgument(format!(
                "Empty host in address '{}'",
                s
            )));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| AikvError::InvalidArgument(format!("Invalid port in address '{}'", s)))?;
        Ok(Self::new(host, port))
    }
}

impl TryFrom<String> for NodeAddress {
    type Error = AikvError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<NodeAddress> for String {
    fn from(addr: NodeAddress) -> Self {
        addr.to_string()
    }
}

/// Node role in the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    /// Owns slots and accepts writes
    Primary,
    /// Copies one primary and may serve reads
    Replica,
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Replica => write!(f, "replica"),
        }
    }
}

/// A half-open range of slots `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotRange {
    /// Start slot (inclusive)
    pub start: u16,
    /// End slot (exclusive)
    pub end: u16,
}

impl SlotRange {
    /// Create a new slot range, rejecting empty or out-of-space ranges
    pub fn new(start: u16, end: u16) -> Result<Self> {
        if start >= end {
            return Err(AikvError::Topology(format!(
                "Slot range start {} must be less than end {}",
                start, end
            )));
        }
        if end > SLOT_COUNT {
            return Err(AikvError::Topology(format!(
                "Slot range end {} exceeds slot count {}",
                end, SLOT_COUNT
            )));
        }
        Ok(Self { start, end })
    }

    /// Range from an inclusive pair, as `CLUSTER SLOTS` reports them
    pub fn inclusive(first: u16, last: u16) -> Result<Self> {
        Self::new(first, last.saturating_add(1))
    }

    /// Check if a slot is within this range
    pub fn contains(&self, slot: u16) -> bool {
        slot >= self.start && slot < self.end
    }

    /// Get the number of slots in this range
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start) as usize
    }

    /// Check if the range is empty
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

impl fmt::Display for SlotRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}-{})", self.start, self.end)
    }
}

/// Read preference for slot-routed read-only commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadFrom {
    /// Always read from the owning primary
    #[default]
    Primary,
    /// Read from a replica of the owning primary when one exists
    PreferReplica,
}

impl FromStr for ReadFrom {
    type Err = AikvError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "primary" => Ok(Self::Primary),
            "prefer_replica" | "replica" => Ok(Self::PreferReplica),
            other => Err(AikvError::Config(format!("Unknown read preference '{}'", other))),
        }
    }
}
