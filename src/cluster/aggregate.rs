//! Response aggregation: N per-node outcomes -> one `ClusterValue`.
//!
//! Outcomes must be passed in resolver order. "First success" and the
//! per-node map are defined by that order, never by reply arrival.

use crate::cluster::dispatcher::{NodeResult, PerNodeOutcome};
use crate::cluster::table::AggregationPolicy;
use crate::cluster::types::NodeAddress;
use crate::cluster::value::ClusterValue;
use crate::error::{AggregateErrorKind, AikvError, NodeError, NodeFailure, Result};
use crate::protocol::RespValue;
use std::collections::BTreeMap;

/// Combine per-node outcomes according to `policy`.
///
/// A single targeted node always collapses to `Single` (or its error).
/// Redirections still present here count as failures.
pub fn aggregate(policy: &AggregationPolicy, outcomes: Vec<PerNodeOutcome>) -> Result<ClusterValue> {
    if outcomes.is_empty() {
        return Ok(ClusterValue::Empty);
    }

    let targeted = outcomes.len();
    let mut successes: Vec<(NodeAddress, RespValue)> = Vec::with_capacity(targeted);
    let mut failures: Vec<NodeFailure> = Vec::new();
    for outcome in outcomes {
        match outcome.result {
            NodeResult::Value(value) => successes.push((outcome.address, value)),
            NodeResult::Error(error) => failures.push(NodeFailure {
                address: outcome.address,
                error,
            }),
            NodeResult::Redirect(redirect) => failures.push(NodeFailure {
                address: outcome.address,
                error: NodeError::Redirected(redirect),
            }),
        }
    }

    if targeted == 1 {
        return match successes.pop() {
            Some((_, value)) => Ok(ClusterValue::Single(value)),
            None => Err(failed(0, failures)),
        };
    }

    match policy {
        AggregationPolicy::OneSucceeded => match successes.into_iter().next() {
            Some((_, value)) => Ok(ClusterValue::Single(value)),
            None => Err(failed(0, failures)),
        },
        AggregationPolicy::AllSucceeded => {
            if !failures.is_empty() {
                return Err(failed(successes.len(), failures));
            }
            let mut replies = successes.into_iter();
            let Some((reference, first)) = replies.next() else {
                return Ok(ClusterValue::Empty);
            };
            // every node whose reply differs from the first node's
            let diverged: Vec<NodeFailure> = replies
                .filter(|(_, reply)| reply != &first)
                .map(|(address, reply)| NodeFailure {
                    address,
                    error: NodeError::Diverged {
                        reference: reference.clone(),
                        reply,
                    },
                })
                .collect();
            if diverged.is_empty() {
                Ok(ClusterValue::Single(first))
            } else {
                Err(AikvError::Aggregate {
                    kind: AggregateErrorKind::InconsistentReplies,
                    failures: diverged,
                })
            }
        }
        AggregationPolicy::AllSucceededKeepMap | AggregationPolicy::NoAggregation => {
            if !failures.is_empty() {
                return Err(failed(successes.len(), failures));
            }
            Ok(per_node(successes))
        }
        AggregationPolicy::Special {
            combine,
            tolerate_partial,
        } => {
            if !failures.is_empty() && (!tolerate_partial || successes.is_empty()) {
                return Err(failed(successes.len(), failures));
            }
            let values = successes.into_iter().map(|(_, v)| v).collect();
            combine.combine(values).map(ClusterValue::Single)
        }
    }
}

fn failed(succeeded: usize, failures: Vec<NodeFailure>) -> AikvError {
    let kind = if succeeded == 0 {
        AggregateErrorKind::AllFailed
    } else {
        AggregateErrorKind::PartialFailure
    };
    AikvError::Aggregate { kind, failures }
}

fn per_node(successes: Vec<(NodeAddress, RespValue)>) -> ClusterValue {
    let mut map: BTreeMap<String, RespValue> = successes
        .into_iter()
        .map(|(address, value)| (address.to_string(), value))
        .collect();
    if map.len() == 1 {
        if let Some((_, value)) = map.pop_first() {
            return ClusterValue::Single(value);
        }
    }
    ClusterValue::Multi(map)
}
