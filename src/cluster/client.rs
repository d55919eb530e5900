//! Cluster client: the orchestration layer tying the routing core together.
//!
//! ```text
//! execute(name, args, route?)
//!   -> RoutingTable::plan      (directive + aggregation policy)
//!   -> TopologyHandle::snapshot
//!   -> route::resolve          (ordered target nodes)
//!   -> NodeDispatcher::fan_out (concurrent, per-node timeout)
//!   -> redirect handling       (one refresh, one retry per node)
//!   -> aggregate               (ClusterValue or AggregateError)
//! ```

use crate::cluster::aggregate::aggregate;
use crate::cluster::config::ClientConfig;
use crate::cluster::dispatcher::{Command, NodeDispatcher, PerNodeOutcome, Transport};
use crate::cluster::provider::TopologyProvider;
use crate::cluster::route::{resolve, RoutingDirective};
use crate::cluster::table::RoutingTable;
use crate::cluster::topology::{Topology, TopologyHandle};
use crate::cluster::types::NodeAddress;
use crate::cluster::value::ClusterValue;
use crate::error::{AikvError, RedirectKind, Result};
use crate::observability::RouterMetrics;
use bytes::Bytes;
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Cluster-aware client core
pub struct ClusterClient {
    topology: TopologyHandle,
    provider: Arc<dyn TopologyProvider>,
    dispatcher: NodeDispatcher,
    table: Arc<RoutingTable>,
    config: ClientConfig,
    metrics: Arc<RouterMetrics>,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl ClusterClient {
    /// Create a client and load the initial topology from `provider`
    pub async fn new(
        config: ClientConfig,
        provider: Arc<dyn TopologyProvider>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let client = Self::with_topology(config, Topology::empty(), provider, transport);
        client.refresh_topology().await?;
        Ok(client)
    }

    /// Create a client from an already known topology snapshot
    pub fn with_topology(
        config: ClientConfig,
        topology: Topology,
        provider: Arc<dyn TopologyProvider>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let metrics = Arc::new(RouterMetrics::new());
        let dispatcher = NodeDispatcher::new(
            transport,
            config.request_timeout,
            config.max_fanout_concurrency,
            metrics.clone(),
        );
        Self {
            topology: TopologyHandle::new(topology),
            provider,
            dispatcher,
            table: Arc::new(RoutingTable::builtin()),
            config,
            metrics,
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Use a custom routing table instead of the built-in one
    pub fn with_routing_table(mut self, table: RoutingTable) -> Self {
        self.table = Arc::new(table);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn routing_table(&self) -> &RoutingTable {
        &self.table
    }

    pub fn metrics(&self) -> &Arc<RouterMetrics> {
        &self.metrics
    }

    /// The current topology snapshot
    pub fn topology(&self) -> Arc<Topology> {
        self.topology.snapshot()
    }

    /// Swap in a snapshot obtained elsewhere
    pub fn replace_topology(&self, topology: Topology) -> u64 {
        let version = self.topology.replace(topology);
        self.metrics.topology_refreshes.inc();
        version
    }

    /// Fetch a new topology from the provider and swap it in
    pub async fn refresh_topology(&self) -> Result<u64> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    /// Refresh unless another task already swapped in a newer snapshot
    /// since `seen_version` was read.
    async fn refresh_if_stale(&self, seen_version: u64) -> Result<u64> {
        let _guard = self.refresh_lock.lock().await;
        let current = self.topology.version();
        if current != seen_version {
            debug!(seen_version, current, "topology already refreshed");
            return Ok(current);
        }
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> Result<u64> {
        match self.provider.refresh().await {
            Ok(topology) => {
                let nodes = topology.len();
                let version = self.replace_topology(topology);
                info!(version, nodes, "topology refreshed");
                Ok(version)
            }
            Err(e) => {
                self.metrics.refresh_errors.inc();
                warn!("topology refresh failed: {}", e);
                Err(e)
            }
        }
    }

    /// Start refreshing the topology every `refresh_interval`.
    ///
    /// Returns `None` when the interval is zero. The task stops once the
    /// client is dropped.
    pub fn spawn_periodic_refresh(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let interval = self.config.refresh_interval;
        if interval.is_zero() {
            return None;
        }
        let client: Weak<Self> = Arc::downgrade(self);
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(client) = client.upgrade() else {
                    break;
                };
                // failures are logged and counted by the refresh itself
                let _ = client.refresh_topology().await;
            }
        }))
    }

    /// Route, dispatch and aggregate one command.
    ///
    /// `directive` overrides the command's default route; the aggregation
    /// policy always comes from the routing table.
    pub async fn execute(
        &self,
        name: &str,
        args: Vec<Bytes>,
        directive: Option<RoutingDirective>,
    ) -> Result<ClusterValue> {
        self.metrics.record_command(name);
        let (directive, policy) = self.table.plan(name, &args, directive);
        let command = Command::new(name, args);

        let seen_version = self.topology.version();
        let snapshot = self.topology.snapshot();
        let targets = resolve(&directive, &snapshot, self.config.read_from)?;
        debug!(
            command = name,
            route = %directive,
            targets = targets.len(),
            "routing command"
        );

        let mut outcomes = self.dispatcher.fan_out(&targets, &command).await;
        if outcomes.iter().any(|o| o.redirect().is_some()) {
            outcomes = self
                .follow_redirects(&directive, &command, outcomes, seen_version)
                .await?;
        }

        let result = aggregate(&policy, outcomes);
        if let Err(ref e) = result {
            self.metrics.aggregate_failures.inc();
            debug!(command = name, "aggregation failed: {}", e);
        }
        result
    }

    /// Convenience wrapper taking the command as string parts
    pub async fn execute_parts<S: AsRef<str>>(
        &self,
        parts: &[S],
        directive: Option<RoutingDirective>,
    ) -> Result<ClusterValue> {
        let command = Command::from_parts(parts)
            .ok_or_else(|| AikvError::InvalidArgument("Empty command".to_string()))?;
        self.execute(command.name(), command.args().to_vec(), directive)
            .await
    }

    /// Retry every redirected node once.
    ///
    /// `MOVED` refreshes the topology first; slot directives are re-resolved
    /// against the new snapshot, anything else follows the redirect target.
    /// `ASK` goes to the target with `ASKING` and leaves the topology alone.
    /// Nodes that already replied are not re-sent. A second redirect is an
    /// error.
    async fn follow_redirects(
        &self,
        directive: &RoutingDirective,
        command: &Command,
        mut outcomes: Vec<PerNodeOutcome>,
        seen_version: u64,
    ) -> Result<Vec<PerNodeOutcome>> {
        let moved = outcomes
            .iter()
            .any(|o| matches!(o.redirect(), Some(r) if r.kind == RedirectKind::Moved));
        if moved {
            // a failed refresh still leaves the redirect target to try
            let _ = self.refresh_if_stale(seen_version).await;
        }
        let snapshot = self.topology.snapshot();

        let mut positions = Vec::new();
        let mut targets: Vec<(NodeAddress, bool)> = Vec::new();
        for (idx, outcome) in outcomes.iter().enumerate() {
            let Some(redirect) = outcome.redirect() else {
                continue;
            };
            warn!(
                command = command.name(),
                node = %outcome.address,
                %redirect,
                "following redirection"
            );
            let target = match redirect.kind {
                RedirectKind::Ask => (redirect.target.clone(), true),
                RedirectKind::Moved => {
                    let resolved = match directive {
                        RoutingDirective::BySlot { .. } => {
                            resolve(directive, &snapshot, self.config.read_from)
                                .ok()
                                .and_then(|nodes| nodes.into_iter().next())
                                .filter(|node| node != &outcome.address)
                        }
                        _ => None,
                    };
                    (resolved.unwrap_or_else(|| redirect.target.clone()), false)
                }
            };
            positions.push(idx);
            targets.push(target);
        }

        let retried = self.dispatcher.send_batch(targets, command).await;
        for (idx, outcome) in positions.into_iter().zip(retried) {
            if outcome.redirect().is_some() {
                return Err(AikvError::RedirectLoop {
                    command: command.name().to_string(),
                    address: outcome.address,
                });
            }
            // the reply stays attributed to the node that was originally asked
            outcomes[idx].result = outcome.result;
        }
        Ok(outcomes)
    }
}
