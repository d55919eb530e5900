//! Cluster routing core.
//!
//! Decides which node(s) receive a command, fans the command out and folds
//! the per-node replies into one `ClusterValue`.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │   ClusterClient::execute(name, args, route) │
//! └─────────────────────────────────────────────┘
//!          │ plan                  │ snapshot
//!          ▼                       ▼
//! ┌──────────────────┐   ┌──────────────────────┐
//! │   RoutingTable   │   │    TopologyHandle    │
//! │ route + policy   │   │ Arc<Topology> swap   │
//! └──────────────────┘   └──────────────────────┘
//!                      │ resolve
//!                      ▼
//! ┌─────────────────────────────────────────────┐
//! │  NodeDispatcher: concurrent fan-out,        │
//! │  per-node timeout, MOVED/ASK detection      │
//! └─────────────────────────────────────────────┘
//!                      │ outcomes, resolver order
//!                      ▼
//! ┌─────────────────────────────────────────────┐
//! │  aggregate(policy) -> ClusterValue          │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Key Components
//!
//! - `Topology` / `TopologyHandle`: immutable snapshots and their atomic swap
//! - `route::resolve`: directive + snapshot -> ordered target nodes
//! - `RoutingTable`: per-command default route and aggregation policy
//! - `NodeDispatcher` + `Transport`: sending and reply classification
//! - `aggregate` + `ClusterValue`: folding replies into one result

pub mod aggregate;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod provider;
pub mod route;
pub mod slot;
pub mod table;
pub mod topology;
pub mod types;
pub mod value;

pub use aggregate::aggregate;
pub use client::ClusterClient;
pub use config::ClientConfig;
pub use dispatcher::{
    parse_redirect, Command, NodeDispatcher, NodeResult, PerNodeOutcome, Transport,
};
pub use provider::{StaticTopology, TopologyProvider};
pub use route::{resolve, RoutingDirective, SlotTarget, SlotType};
pub use slot::{key_slot, SLOT_COUNT};
pub use table::{
    AggregationPolicy, CombineFn, Combinator, CommandRouteSpec, DefaultRoute, RoutingTable,
};
pub use topology::{NodeInfo, Topology, TopologyHandle};
pub use types::{NodeAddress, NodeRole, ReadFrom, SlotRange};
pub use value::ClusterValue;
