//! Shared fixtures for the integration tests: a scripted in-memory
//! transport and a six node topology.

#![allow(dead_code)]

use aikv_router::cluster::{Command, NodeAddress, NodeInfo, SlotRange, Topology, Transport};
use aikv_router::protocol::RespValue;
use aikv_router::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

pub type Handler = Box<dyn Fn(&NodeAddress, &Command, bool) -> Result<RespValue> + Send + Sync>;

/// One recorded call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub node: NodeAddress,
    pub command: String,
    pub asking: bool,
}

/// Transport answering from a closure, with optional per-node delays
pub struct MockTransport {
    handler: Handler,
    delays: HashMap<NodeAddress, Duration>,
    calls: Mutex<Vec<Call>>,
}

impl MockTransport {
    pub fn new(
        handler: impl Fn(&NodeAddress, &Command, bool) -> Result<RespValue> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            delays: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, node: NodeAddress, delay: Duration) -> Self {
        self.delays.insert(node, delay);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    async fn answer(&self, node: &NodeAddress, command: &Command, asking: bool) -> Result<RespValue> {
        self.calls.lock().unwrap().push(Call {
            node: node.clone(),
            command: command.name().to_string(),
            asking,
        });
        if let Some(delay) = self.delays.get(node) {
            tokio::time::sleep(*delay).await;
        }
        (self.handler)(node, command, asking)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, node: &NodeAddress, command: &Command) -> Result<RespValue> {
        self.answer(node, command, false).await
    }

    async fn send_asking(&self, node: &NodeAddress, command: &Command) -> Result<RespValue> {
        self.answer(node, command, true).await
    }
}

pub fn addr(port: u16) -> NodeAddress {
    NodeAddress::new("127.0.0.1", port)
}

/// Primaries 7000-7002 splitting the slots in three, replicas 7003-7005
pub fn six_nodes() -> Vec<NodeInfo> {
    vec![
        NodeInfo::primary(addr(7000), vec![SlotRange::new(0, 5461).unwrap()]),
        NodeInfo::primary(addr(7001), vec![SlotRange::new(5461, 10923).unwrap()]),
        NodeInfo::primary(addr(7002), vec![SlotRange::new(10923, 16384).unwrap()]),
        NodeInfo::replica(addr(7003), addr(7000)),
        NodeInfo::replica(addr(7004), addr(7001)),
        NodeInfo::replica(addr(7005), addr(7002)),
    ]
}

pub fn six_node_topology() -> Topology {
    Topology::new(six_nodes()).unwrap()
}

/// Bulk string argument `idx` of `command`, as text
pub fn arg(command: &Command, idx: usize) -> String {
    command
        .args()
        .get(idx)
        .map(|a| String::from_utf8_lossy(a).to_string())
        .unwrap_or_default()
}
