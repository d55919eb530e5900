//! Immutable cluster topology snapshots.
//!
//! A `Topology` is never mutated after construction. A refresh builds a new
//! value and swaps it into the `TopologyHandle`, so a routing decision that
//! took a snapshot keeps working against one consistent view of the cluster.

use crate::cluster::slot::SLOT_COUNT;
use crate::cluster::types::{NodeAddress, NodeRole, SlotRange};
use crate::error::{AikvError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// One node as described by the topology source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub address: NodeAddress,
    pub role: NodeRole,
    /// Slots owned by a primary; always empty for replicas
    #[serde(default)]
    pub slots: Vec<SlotRange>,
    /// Primary this replica copies; `None` for primaries
    #[serde(default)]
    pub replica_of: Option<NodeAddress>,
}

impl NodeInfo {
    pub fn primary(address: NodeAddress, slots: Vec<SlotRange>) -> Self {
        Self {
            address,
            role: NodeRole::Primary,
            slots,
            replica_of: None,
        }
    }

    pub fn replica(address: NodeAddress, primary: NodeAddress) -> Self {
        Self {
            address,
            role: NodeRole::Replica,
            slots: Vec::new(),
            replica_of: Some(primary),
        }
    }
}

/// Serialized form: just the node list; the slot index is derived.
#[derive(Serialize, Deserialize)]
struct TopologyRepr {
    nodes: Vec<NodeInfo>,
}

/// Snapshot of the cluster shape: nodes in a stable order plus the
/// slot-to-primary index derived from them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "TopologyRepr", into = "TopologyRepr")]
pub struct Topology {
    nodes: Vec<NodeInfo>,
    /// Primary slot ranges sorted by start, with the owner's index in `nodes`
    slot_index: Vec<(SlotRange, usize)>,
}

impl Topology {
    /// A topology with no known nodes
    pub fn empty() -> Self {
        Self {
            nodes: Vec::new(),
            slot_index: Vec::new(),
        }
    }

    /// Build a topology, validating that primaries partition the slot space
    /// and that every replica follows exactly one known primary.
    pub fn new(nodes: Vec<NodeInfo>) -> Result<Self> {
        if nodes.is_empty() {
            return Err(AikvError::Topology(
                "No nodes supplied; use Topology::empty() for an unknown cluster".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(nodes.len());
        for node in &nodes {
            if !seen.insert(&node.address) {
                return Err(AikvError::Topology(format!(
                    "Duplicate node address {}",
                    node.address
                )));
            }
        }

        let mut slot_index = Vec::new();
        for (idx, node) in nodes.iter().enumerate() {
            match node.role {
                NodeRole::Primary => {
                    if let Some(ref primary) = node.replica_of {
                        return Err(AikvError::Topology(format!(
                            "Primary {} cannot be a replica of {}",
                            node.address, primary
                        )));
                    }
                    slot_index.extend(node.slots.iter().map(|range| (*range, idx)));
                }
                NodeRole::Replica => {
                    if !node.slots.is_empty() {
                        return Err(AikvError::Topology(format!(
                            "Replica {} cannot own slots",
                            node.address
                        )));
                    }
                    let primary = node.replica_of.as_ref().ok_or_else(|| {
                        AikvError::Topology(format!("Replica {} has no primary", node.address))
                    })?;
                    let follows_primary = nodes
                        .iter()
                        .any(|n| &n.address == primary && n.role == NodeRole::Primary);
                    if !follows_primary {
                        return Err(AikvError::Topology(format!(
                            "Replica {} follows unknown primary {}",
                            node.address, primary
                        )));
                    }
                }
            }
        }

        slot_index.sort_by_key(|(range, _)| range.start);
        let mut next = 0u16;
        for (range, idx) in &slot_index {
            if range.is_empty() || range.end > SLOT_COUNT {
                return Err(AikvError::Topology(format!(
                    "Invalid slot range {} on {}",
                    range, nodes[*idx].address
                )));
            }
            if range.start != next {
                return Err(AikvError::Topology(if range.start < next {
                    format!(
                        "Slot {} assigned twice (overlap at {} on {})",
                        range.start, range, nodes[*idx].address
                    )
                } else {
                    format!("Slots [{}-{}) are not assigned", next, range.start)
                }));
            }
            next = range.end;
        }
        if next != SLOT_COUNT {
            return Err(AikvError::Topology(format!(
                "Slots [{}-{}) are not assigned",
                next, SLOT_COUNT
            )));
        }

        Ok(Self { nodes, slot_index })
    }

    /// Number of known nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when no nodes are known yet
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in their stable topology order
    pub fn nodes(&self) -> &[NodeInfo] {
        &self.nodes
    }

    /// Addresses of every node, in topology order
    pub fn all_nodes(&self) -> impl Iterator<Item = &NodeAddress> {
        self.nodes.iter().map(|n| &n.address)
    }

    /// Addresses of the nodes with `role`, in topology order
    pub fn nodes_for_role(&self, role: NodeRole) -> impl Iterator<Item = &NodeAddress> {
        self.nodes
            .iter()
            .filter(move |n| n.role == role)
            .map(|n| &n.address)
    }

    pub fn contains(&self, address: &NodeAddress) -> bool {
        self.nodes.iter().any(|n| &n.address == address)
    }

    /// Role and served slots of a node. Replicas report their primary's slots.
    pub fn resolve_node(&self, address: &NodeAddress) -> Option<(NodeRole, &[SlotRange])> {
        let node = self.nodes.iter().find(|n| &n.address == address)?;
        match node.role {
            NodeRole::Primary => Some((NodeRole::Primary, node.slots.as_slice())),
            NodeRole::Replica => {
                let primary = node.replica_of.as_ref()?;
                let slots = self
                    .nodes
                    .iter()
                    .find(|n| &n.address == primary)
                    .map(|n| n.slots.as_slice())
                    .unwrap_or(&[]);
                Some((NodeRole::Replica, slots))
            }
        }
    }

    /// The primary owning `slot`
    pub fn primary_for_slot(&self, slot: u16) -> Result<&NodeAddress> {
        if self.is_empty() {
            return Err(AikvError::NoNodesAvailable);
        }
        if slot >= SLOT_COUNT {
            return Err(AikvError::InvalidArgument(format!(
                "Slot {} out of range [0, {})",
                slot, SLOT_COUNT
            )));
        }
        let pos = self.slot_index.partition_point(|(range, _)| range.end <= slot);
        match self.slot_index.get(pos) {
            Some((range, idx)) if range.contains(slot) => Ok(&self.nodes[*idx].address),
            _ => Err(AikvError::Topology(format!("Slot {} has no owner", slot))),
        }
    }

    /// Replicas following `primary`, in topology order
    pub fn replicas_of<'a>(
        &'a self,
        primary: &'a NodeAddress,
    ) -> impl Iterator<Item = &'a NodeAddress> + 'a {
        self.nodes
            .iter()
            .filter(move |n| n.replica_of.as_ref() == Some(primary))
            .map(|n| &n.address)
    }

    /// Encode the snapshot for caching
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| AikvError::Serialization(e.to_string()))
    }

    /// Decode a snapshot produced by `to_bytes`, re-validating it
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data).map_err(|e| AikvError::Serialization(e.to_string()))
    }
}

impl PartialEq for Topology {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes
    }
}

impl Eq for Topology {}

impl TryFrom<TopologyRepr> for Topology {
    type Error = AikvError;

    fn try_from(repr: TopologyRepr) -> Result<Self> {
        if repr.nodes.is_empty() {
            Ok(Self::empty())
        } else {
            Self::new(repr.nodes)
        }
    }
}

impl From<Topology> for TopologyRepr {
    fn from(topology: Topology) -> Self {
        Self {
            nodes: topology.nodes,
        }
    }
}

/// Shared, atomically swappable reference to the current topology.
///
/// Readers clone the inner `Arc`, so a concurrent `replace` never exposes a
/// mix of old and new node or slot data.
#[derive(Debug, Clone)]
pub struct TopologyHandle {
    current: Arc<RwLock<Arc<Topology>>>,
    version: Arc<AtomicU64>,
}

impl TopologyHandle {
    pub fn new(topology: Topology) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(topology))),
            version: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The snapshot to use for one routing decision
    pub fn snapshot(&self) -> Arc<Topology> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Swap in a new snapshot, returning the new version number
    pub fn replace(&self, topology: Topology) -> u64 {
        let topology = Arc::new(topology);
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current = topology;
        self.version.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Number of swaps performed since creation
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }
}

impl Default for TopologyHandle {
    fn default() -> Self {
        Self::new(Topology::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> NodeAddress {
        NodeAddress::new("127.0.0.1", port)
    }

    fn range(start: u16, end: u16) -> SlotRange {
        SlotRange::new(start, end).unwrap()
    }

    fn three_shards() -> Vec<NodeInfo> {
        vec![
            NodeInfo::primary(addr(7000), vec![range(0, 5461)]),
            NodeInfo::primary(addr(7001), vec![range(5461, 10923)]),
            NodeInfo::primary(addr(7002), vec![range(10923, 16384)]),
            NodeInfo::replica(addr(7003), addr(7000)),
        ]
    }

    #[test]
    fn test_valid_topology() {
        let topology = Topology::new(three_shards()).unwrap();
        assert_eq!(topology.len(), 4);
        assert_eq!(topology.nodes_for_role(NodeRole::Primary).count(), 3);
        assert_eq!(topology.primary_for_slot(0).unwrap(), &addr(7000));
        assert_eq!(topology.primary_for_slot(5461).unwrap(), &addr(7001));
        assert_eq!(topology.primary_for_slot(16383).unwrap(), &addr(7002));
        assert!(topology.primary_for_slot(16384).is_err());
    }

    #[test]
    fn test_replica_reports_primary_slots() {
        let topology = Topology::new(three_shards()).unwrap();
        let (role, slots) = topology.resolve_node(&addr(7003)).unwrap();
        assert_eq!(role, NodeRole::Replica);
        assert_eq!(slots, &[range(0, 5461)]);
        assert_eq!(
            topology.replicas_of(&addr(7000)).collect::<Vec<_>>(),
            vec![&addr(7003)]
        );
        assert!(topology.resolve_node(&addr(9999)).is_none());
    }

    #[test]
    fn test_gap_rejected() {
        let nodes = vec![
            NodeInfo::primary(addr(7000), vec![range(0, 100)]),
            NodeInfo::primary(addr(7001), vec![range(200, 16384)]),
        ];
        let err = Topology::new(nodes).unwrap_err();
        assert!(err.to_string().contains("[100-200)"));
    }

    #[test]
    fn test_overlap_rejected() {
        let nodes = vec![
            NodeInfo::primary(addr(7000), vec![range(0, 9000)]),
            NodeInfo::primary(addr(7001), vec![range(8000, 16384)]),
        ];
        assert!(matches!(Topology::new(nodes), Err(AikvError::Topology(_))));
    }

    #[test]
    fn test_incomplete_coverage_rejected() {
        let nodes = vec![NodeInfo::primary(addr(7000), vec![range(0, 16000)])];
        assert!(Topology::new(nodes).is_err());
    }

    #[test]
    fn test_orphan_replica_rejected() {
        let mut nodes = three_shards();
        nodes.push(NodeInfo::replica(addr(7004), addr(8000)));
        assert!(Topology::new(nodes).is_err());
    }

    #[test]
    fn test_duplicate_address_rejected() {
        let mut nodes = three_shards();
        nodes.push(NodeInfo::replica(addr(7000), addr(7001)));
        assert!(Topology::new(nodes).is_err());
    }

    #[test]
    fn test_empty_topology() {
        let topology = Topology::empty();
        assert!(topology.is_empty());
        assert!(matches!(
            topology.primary_for_slot(0),
            Err(AikvError::NoNodesAvailable)
        ));
        assert!(Topology::new(Vec::new()).is_err());
    }

    #[test]
    fn test_bincode_round_trip() {
        let topology = Topology::new(three_shards()).unwrap();
        let bytes = topology.to_bytes().unwrap();
        let decoded = Topology::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, topology);
        assert_eq!(decoded.primary_for_slot(6000).unwrap(), &addr(7001));
    }

    #[test]
    fn test_handle_swap() {
        let handle = TopologyHandle::default();
        let before = handle.snapshot();
        assert!(before.is_empty());

        let version = handle.replace(Topology::new(three_shards()).unwrap());
        assert_eq!(version, 1);
        assert_eq!(handle.snapshot().len(), 4);
        // old snapshot is untouched
        assert!(before.is_empty());
    }
}
