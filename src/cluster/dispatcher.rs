//! Node dispatch: one command to one node, or fanned out to many.
//!
//! Every failure is captured as data in a `PerNodeOutcome`. Nothing here
//! returns `Err`; the aggregator decides what a failure means.

use crate::cluster::types::NodeAddress;
use crate::error::{NodeError, Redirect, RedirectKind, Result};
use crate::observability::RouterMetrics;
use crate::protocol::RespValue;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// A command as sent to a node: name plus arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    name: String,
    args: Vec<Bytes>,
}

impl Command {
    pub fn new(name: impl Into<String>, args: Vec<Bytes>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// Build from string parts, the first being the command name
    pub fn from_parts<S: AsRef<str>>(parts: &[S]) -> Option<Self> {
        let (name, rest) = parts.split_first()?;
        Some(Self::new(
            name.as_ref(),
            rest.iter()
                .map(|a| Bytes::copy_from_slice(a.as_ref().as_bytes()))
                .collect(),
        ))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[Bytes] {
        &self.args
    }

    /// RESP array encoding of the full command line
    pub fn to_resp(&self) -> RespValue {
        let name = Bytes::copy_from_slice(self.name.as_bytes());
        RespValue::command(std::iter::once(&name).chain(self.args.iter()))
    }
}

/// Transport collaborator: sends one command to one node and returns the
/// raw reply. Error replies from the server come back as
/// `Ok(RespValue::Error(..))`; `Err` means the exchange itself failed.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, node: &NodeAddress, command: &Command) -> Result<RespValue>;

    /// Send `ASKING` followed by `command`, as required after an `ASK`
    /// redirection.
    async fn send_asking(&self, node: &NodeAddress, command: &Command) -> Result<RespValue> {
        let reply = self.send(node, &Command::new("ASKING", Vec::new())).await?;
        if let RespValue::Error(_) = reply {
            return Ok(reply);
        }
        self.send(node, command).await
    }
}

/// Parse a `MOVED <slot> <host:port>` or `ASK <slot> <host:port>` error
/// reply. An empty host means "same host as the node that replied".
pub fn parse_redirect(message: &str, from: &NodeAddress) -> Option<Redirect> {
    let mut parts = message.split_whitespace();
    let kind = match parts.next()? {
        "MOVED" => RedirectKind::Moved,
        "ASK" => RedirectKind::Ask,
        _ => return None,
    };
    let slot = parts.next()?.parse::<u16>().ok()?;
    let endpoint = parts.next()?;
    let target = match endpoint.strip_prefix(':') {
        Some(port) => NodeAddress::new(from.host(), port.parse().ok()?),
        None => endpoint.parse().ok()?,
    };
    Some(Redirect { kind, slot, target })
}

/// Result of sending to one node
#[derive(Debug, Clone, PartialEq)]
pub enum NodeResult {
    Value(RespValue),
    Error(NodeError),
    Redirect(Redirect),
}

/// One node's outcome in a fan-out
#[derive(Debug, Clone, PartialEq)]
pub struct PerNodeOutcome {
    pub address: NodeAddress,
    pub result: NodeResult,
}

impl PerNodeOutcome {
    pub fn value(address: NodeAddress, value: RespValue) -> Self {
        Self {
            address,
            result: NodeResult::Value(value),
        }
    }

    pub fn error(address: NodeAddress, error: NodeError) -> Self {
        Self {
            address,
            result: NodeResult::Error(error),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.result, NodeResult::Value(_))
    }

    pub fn redirect(&self) -> Option<&Redirect> {
        match &self.result {
            NodeResult::Redirect(redirect) => Some(redirect),
            _ => None,
        }
    }
}

/// Sends commands through the transport with a per-node timeout and a bound
/// on concurrent sends per fan-out.
#[derive(Clone)]
pub struct NodeDispatcher {
    transport: Arc<dyn Transport>,
    timeout: Duration,
    max_concurrency: usize,
    metrics: Arc<RouterMetrics>,
}

impl NodeDispatcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        timeout: Duration,
        max_concurrency: usize,
        metrics: Arc<RouterMetrics>,
    ) -> Self {
        Self {
            transport,
            timeout,
            max_concurrency: max_concurrency.max(1),
            metrics,
        }
    }

    /// Send `command` to `node` and classify the reply
    pub async fn dispatch(&self, node: &NodeAddress, command: &Command) -> PerNodeOutcome {
        self.send_classified(node, command, false).await
    }

    /// Like `dispatch`, preceded by `ASKING`
    pub async fn dispatch_asking(&self, node: &NodeAddress, command: &Command) -> PerNodeOutcome {
        self.send_classified(node, command, true).await
    }

    async fn send_classified(
        &self,
        node: &NodeAddress,
        command: &Command,
        asking: bool,
    ) -> PerNodeOutcome {
        self.metrics.node_requests.inc();
        debug!(node = %node, command = command.name(), asking, "dispatching");

        let send = async {
            if asking {
                self.transport.send_asking(node, command).await
            } else {
                self.transport.send(node, command).await
            }
        };

        let result = match tokio::time::timeout(self.timeout, send).await {
            Ok(Ok(RespValue::Error(message))) => match parse_redirect(&message, node) {
                Some(redirect) => {
                    match redirect.kind {
                        RedirectKind::Moved => self.metrics.moved_redirects.inc(),
                        RedirectKind::Ask => self.metrics.ask_redirects.inc(),
                    }
                    debug!(node = %node, %redirect, "redirection reply");
                    NodeResult::Redirect(redirect)
                }
                None => {
                    self.metrics.node_errors.inc();
                    NodeResult::Error(NodeError::Server(message))
                }
            },
            Ok(Ok(value)) => NodeResult::Value(value),
            Ok(Err(e)) => {
                self.metrics.node_errors.inc();
                warn!(node = %node, command = command.name(), "transport error: {}", e);
                NodeResult::Error(NodeError::Transport(e.to_string()))
            }
            Err(_) => {
                self.metrics.timeouts.inc();
                warn!(node = %node, command = command.name(), timeout = ?self.timeout, "request timed out");
                NodeResult::Error(NodeError::Timeout(self.timeout))
            }
        };

        PerNodeOutcome {
            address: node.clone(),
            result,
        }
    }

    /// Send `command` to every node concurrently and wait for all of them.
    ///
    /// Outcomes are returned in the order of `nodes`, whatever order the
    /// replies arrived in.
    pub async fn fan_out(&self, nodes: &[NodeAddress], command: &Command) -> Vec<PerNodeOutcome> {
        let targets = nodes.iter().map(|n| (n.clone(), false)).collect();
        self.send_batch(targets, command).await
    }

    /// Concurrently send to `(node, asking)` targets, keeping their order.
    /// Used for redirect retries, where some targets need `ASKING`.
    pub async fn send_batch(
        &self,
        targets: Vec<(NodeAddress, bool)>,
        command: &Command,
    ) -> Vec<PerNodeOutcome> {
        if let [(node, asking)] = targets.as_slice() {
            let outcome = if *asking {
                self.dispatch_asking(node, command).await
            } else {
                self.dispatch(node, command).await
            };
            return vec![outcome];
        }

        let limiter = Arc::new(Semaphore::new(self.max_concurrency));
        let command = Arc::new(command.clone());
        let handles: Vec<_> = targets
            .iter()
            .map(|(node, asking)| {
                let dispatcher = self.clone();
                let limiter = limiter.clone();
                let command = command.clone();
                let node = node.clone();
                let asking = *asking;
                tokio::spawn(async move {
                    let _permit = limiter.acquire_owned().await.ok();
                    dispatcher.send_classified(&node, &command, asking).await
                })
            })
            .collect();

        let mut outcomes = Vec::with_capacity(targets.len());
        for ((node, _), handle) in targets.into_iter().zip(handles) {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => PerNodeOutcome::error(
                    node,
                    NodeError::Transport(format!("dispatch task failed: {}", e)),
                ),
            };
            outcomes.push(outcome);
        }
        outcomes
    }
}
