//! Client-side routing configuration.

use crate::cluster::types::ReadFrom;
use serde::{Deserialize, Deserializer};
use std::time::Duration;

/// Tunables of the routing core
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Per-node request timeout (milliseconds in config files)
    #[serde(rename = "request_timeout_ms", deserialize_with = "millis")]
    pub request_timeout: Duration,

    /// Read preference for read-only keyed commands
    pub read_from: ReadFrom,

    /// Upper bound on concurrent sends within one fan-out
    pub max_fanout_concurrency: usize,

    /// Periodic topology refresh; zero disables it
    #[serde(rename = "refresh_interval_ms", deserialize_with = "millis")]
    pub refresh_interval: Duration,
}

fn millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_millis)
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_millis(250),
            read_from: ReadFrom::Primary,
            max_fanout_concurrency: 64,
            refresh_interval: Duration::ZERO,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-node request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the read preference
    pub fn with_read_from(mut self, read_from: ReadFrom) -> Self {
        self.read_from = read_from;
        self
    }

    /// Set the fan-out concurrency bound (at least 1)
    pub fn with_max_fanout_concurrency(mut self, max: usize) -> Self {
        self.max_fanout_concurrency = max.max(1);
        self
    }

    /// Set the periodic refresh interval
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }
}
