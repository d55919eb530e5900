//! Route resolution: directive + topology snapshot -> target nodes.

use crate::cluster::slot::key_slot;
use crate::cluster::topology::Topology;
use crate::cluster::types::{NodeAddress, NodeRole, ReadFrom};
use crate::error::{AikvError, Result};
use bytes::Bytes;
use rand::seq::SliceRandom;
use std::fmt;
use std::str::FromStr;

/// How a slot-routed command identifies its slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotTarget {
    /// Explicit slot id
    Slot(u16),
    /// Key whose hash determines the slot
    Key(Bytes),
}

impl SlotTarget {
    pub fn slot(&self) -> u16 {
        match self {
            SlotTarget::Slot(slot) => *slot,
            SlotTarget::Key(key) => key_slot(key),
        }
    }
}

/// Which node of the owning shard may serve a slot-routed command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotType {
    /// Writes, and reads when replica reads are off
    #[default]
    Primary,
    /// Reads that may go to a replica of the owner
    ReplicaPreferred,
}

/// Where a command should be sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingDirective {
    /// Every node regardless of role
    AllNodes,
    /// Every primary
    AllPrimaries,
    /// One node of any role, chosen per call
    RandomNode,
    /// One explicit node, which must be in the topology
    ByAddress(NodeAddress),
    /// The shard owning a slot
    BySlot { target: SlotTarget, slot_type: SlotType },
}

impl RoutingDirective {
    /// Route to the primary owning `slot`
    pub fn slot(slot: u16) -> Self {
        RoutingDirective::BySlot {
            target: SlotTarget::Slot(slot),
            slot_type: SlotType::Primary,
        }
    }

    /// Route to the primary owning the slot of `key`
    pub fn key(key: impl Into<Bytes>) -> Self {
        RoutingDirective::BySlot {
            target: SlotTarget::Key(key.into()),
            slot_type: SlotType::Primary,
        }
    }
}

impl fmt::Display for RoutingDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllNodes => write!(f, "all-nodes"),
            Self::AllPrimaries => write!(f, "all-primaries"),
            Self::RandomNode => write!(f, "random"),
            Self::ByAddress(addr) => write!(f, "{}", addr),
            Self::BySlot { target, slot_type } => {
                let prefix = match slot_type {
                    SlotType::Primary => "slot",
                    SlotType::ReplicaPreferred => "replica-slot",
                };
                write!(f, "{}:{}", prefix, target.slot())
            }
        }
    }
}

impl FromStr for RoutingDirective {
    type Err = AikvError;

    /// Parses `all-nodes`, `all-primaries`, `random`, `slot:<n>`,
    /// `replica-slot:<n>`, `key:<key>` or `host:port`
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "all-nodes" | "allnodes" | "all" => return Ok(Self::AllNodes),
            "all-primaries" | "allprimaries" | "primaries" => return Ok(Self::AllPrimaries),
            "random" | "random-node" => return Ok(Self::RandomNode),
            _ => {}
        }

        let parse_slot = |v: &str| {
            v.parse::<u16>()
                .map_err(|_| AikvError::InvalidArgument(format!("Invalid slot '{}'", v)))
        };
        if let Some(key) = s.strip_prefix("key:") {
            return Ok(Self::key(Bytes::copy_from_slice(key.as_bytes())));
        }
        if let Some(slot) = s.strip_prefix("slot:") {
            return Ok(Self::slot(parse_slot(slot)?));
        }
        if let Some(slot) = s.strip_prefix("replica-slot:") {
            return Ok(Self::BySlot {
                target: SlotTarget::Slot(parse_slot(slot)?),
                slot_type: SlotType::ReplicaPreferred,
            });
        }
        s.parse::<NodeAddress>().map(Self::ByAddress)
    }
}

/// Resolve a directive against one topology snapshot.
///
/// Returns a non-empty list of targets. Multi-node directives keep the
/// topology's own node order, so repeated calls against the same snapshot
/// yield the same list.
pub fn resolve(
    directive: &RoutingDirective,
    topology: &Topology,
    read_from: ReadFrom,
) -> Result<Vec<NodeAddress>> {
    if topology.is_empty() {
        return Err(AikvError::NoNodesAvailable);
    }

    let targets: Vec<NodeAddress> = match directive {
        RoutingDirective::AllNodes => topology.all_nodes().cloned().collect(),
        RoutingDirective::AllPrimaries => topology
            .nodes_for_role(NodeRole::Primary)
            .cloned()
            .collect(),
        RoutingDirective::RandomNode => {
            let nodes: Vec<&NodeAddress> = topology.all_nodes().collect();
            nodes
                .choose(&mut rand::thread_rng())
                .map(|addr| vec![(*addr).clone()])
                .unwrap_or_default()
        }
        RoutingDirective::ByAddress(addr) => {
            if !topology.contains(addr) {
                return Err(AikvError::NodeNotFound(addr.clone()));
            }
            vec![addr.clone()]
        }
        RoutingDirective::BySlot { target, slot_type } => {
            let primary = topology.primary_for_slot(target.slot())?;
            let use_replica =
                *slot_type == SlotType::ReplicaPreferred && read_from == ReadFrom::PreferReplica;
            let replica = if use_replica {
                let replicas: Vec<&NodeAddress> = topology.replicas_of(primary).collect();
                replicas.choose(&mut rand::thread_rng()).map(|r| (*r).clone())
            } else {
                None
            };
            vec![replica.unwrap_or_else(|| primary.clone())]
        }
    };

    if targets.is_empty() {
        return Err(AikvError::NoNodesAvailable);
    }
    Ok(targets)
}
