use crate::cluster::types::NodeAddress;
use crate::protocol::RespValue;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AikvError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Topology error: {0}")]
    Topology(String),

    #[error("Node not found in current topology: {0}")]
    NodeNotFound(NodeAddress),

    #[error("No nodes available for routing")]
    NoNodesAvailable,

    #[error("Aggregation failed ({kind}): {}", format_failures(.failures))]
    Aggregate {
        kind: AggregateErrorKind,
        failures: Vec<NodeFailure>,
    },

    #[error("Wrong cluster value variant: expected {expected}, found {found}")]
    WrongVariant {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Redirected twice for '{command}' (last: {address})")]
    RedirectLoop { command: String, address: NodeAddress },

    #[error("Invalid reply: {0}")]
    InvalidReply(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, AikvError>;

/// Why an aggregation could not produce a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateErrorKind {
    /// No targeted node succeeded
    AllFailed,
    /// Every node succeeded but with differing replies
    InconsistentReplies,
    /// Some nodes succeeded and some failed
    PartialFailure,
}

impl fmt::Display for AggregateErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllFailed => write!(f, "all nodes failed"),
            Self::InconsistentReplies => write!(f, "inconsistent replies"),
            Self::PartialFailure => write!(f, "partial failure"),
        }
    }
}

/// Redirection kind carried by a `-MOVED` or `-ASK` reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    Moved,
    Ask,
}

impl fmt::Display for RedirectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Moved => write!(f, "MOVED"),
            Self::Ask => write!(f, "ASK"),
        }
    }
}

/// A cluster redirection reply: the slot now lives on `target`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub kind: RedirectKind,
    pub slot: u16,
    pub target: NodeAddress,
}

impl fmt::Display for Redirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.kind, self.slot, self.target)
    }
}

/// Failure of a single node dispatch.
///
/// These never escape the dispatcher as `Err`; they travel as data inside a
/// `PerNodeOutcome` until the aggregator decides the overall result.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NodeError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("server error: {0}")]
    Server(String),

    #[error("redirected: {0}")]
    Redirected(Redirect),

    /// Succeeded, but with a reply different from `reference`'s
    #[error("reply {reply} differs from {reference}")]
    Diverged {
        reference: NodeAddress,
        reply: RespValue,
    },
}

/// A node address paired with the error it produced
#[derive(Debug, Clone, PartialEq)]
pub struct NodeFailure {
    pub address: NodeAddress,
    pub error: NodeError,
}

impl fmt::Display for NodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.address, self.error)
    }
}

fn format_failures(failures: &[NodeFailure]) -> String {
    if failures.is_empty() {
        return "no node errors".to_string();
    }
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl AikvError {
    /// Returns true when retrying after a topology refresh may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AikvError::NodeNotFound(_) | AikvError::NoNodesAvailable | AikvError::RedirectLoop { .. }
        )
    }
}
