//! Routing statistics
//!
//! Lock-free counters updated on the dispatch path, plus a serializable
//! snapshot for reporting.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// Atomic counter for metrics
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    /// Create a new counter
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    /// Increment the counter by 1
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the counter by a specific amount
    pub fn inc_by(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    /// Get the current value
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Counters for the routing core
#[derive(Debug, Default)]
pub struct RouterMetrics {
    /// Logical commands executed
    pub commands: Counter,
    /// Commands per command name
    commands_by_type: RwLock<BTreeMap<String, u64>>,
    /// Individual node sends, including redirect retries
    pub node_requests: Counter,
    /// Node sends that ended in a transport or server error
    pub node_errors: Counter,
    /// Node sends that hit the request timeout
    pub timeouts: Counter,
    pub moved_redirects: Counter,
    pub ask_redirects: Counter,
    /// Topology snapshots swapped in
    pub topology_refreshes: Counter,
    /// Topology refresh attempts that failed
    pub refresh_errors: Counter,
    /// Aggregations that returned an error
    pub aggregate_failures: Counter,
}

/// Point-in-time copy of `RouterMetrics`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub commands: u64,
    pub commands_by_type: BTreeMap<String, u64>,
    pub node_requests: u64,
    pub node_errors: u64,
    pub timeouts: u64,
    pub moved_redirects: u64,
    pub ask_redirects: u64,
    pub topology_refreshes: u64,
    pub refresh_errors: u64,
    pub aggregate_failures: u64,
}

impl RouterMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one logical command
    pub fn record_command(&self, command: &str) {
        self.commands.inc();
        if let Ok(mut by_type) = self.commands_by_type.write() {
            *by_type.entry(command.to_uppercase()).or_insert(0) += 1;
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            commands: self.commands.get(),
            commands_by_type: self
                .commands_by_type
                .read()
                .map(|m| m.clone())
                .unwrap_or_default(),
            node_requests: self.node_requests.get(),
            node_errors: self.node_errors.get(),
            timeouts: self.timeouts.get(),
            moved_redirects: self.moved_redirects.get(),
            ask_redirects: self.ask_redirects.get(),
            topology_refreshes: self.topology_refreshes.get(),
            refresh_errors: self.refresh_errors.get(),
            aggregate_failures: self.aggregate_failures.get(),
        }
    }
}
