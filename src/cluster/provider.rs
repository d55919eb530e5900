//! Topology sources.
//!
//! The router never discovers the cluster itself; it asks a
//! `TopologyProvider` for a fresh snapshot on connect, on `MOVED` and on the
//! periodic refresh timer.

use crate::cluster::topology::{NodeInfo, Topology};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::{Arc, RwLock};

/// Source of cluster topology snapshots
#[async_trait]
pub trait TopologyProvider: Send + Sync {
    /// Build a new snapshot of the cluster shape
    async fn refresh(&self) -> Result<Topology>;
}

/// Provider backed by a fixed node list, e.g. from the config file.
///
/// The list can be replaced with `set_nodes`, which is how tests and
/// operators simulate a resharding or failover.
#[derive(Debug, Clone)]
pub struct StaticTopology {
    nodes: Arc<RwLock<Vec<NodeInfo>>>,
}

impl StaticTopology {
    pub fn new(nodes: Vec<NodeInfo>) -> Self {
        Self {
            nodes: Arc::new(RwLock::new(nodes)),
        }
    }

    /// Replace the node list returned by future refreshes
    pub fn set_nodes(&self, nodes: Vec<NodeInfo>) {
        *self.nodes.write().unwrap_or_else(|e| e.into_inner()) = nodes;
    }
}

#[async_trait]
impl TopologyProvider for StaticTopology {
    async fn refresh(&self) -> Result<Topology> {
        let nodes = self
            .nodes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if nodes.is_empty() {
            return Ok(Topology::empty());
        }
        Topology::new(nodes)
    }
}
