//! Command routing table.
//!
//! A static, reviewable map from command name to its default route and its
//! reply aggregation policy. The table is only consulted for the route when
//! the caller gives no explicit directive; the policy always comes from here.

use crate::cluster::route::{RoutingDirective, SlotTarget, SlotType};
use crate::error::{AikvError, Result};
use crate::protocol::RespValue;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::OnceLock;

/// User supplied reply combinator
pub type CombineFn = fn(Vec<RespValue>) -> Result<RespValue>;

/// Typed combination of successful per-node replies
#[derive(Debug, Clone, Copy)]
pub enum Combinator {
    /// Sum of integer replies (DBSIZE)
    Sum,
    /// Minimum of integer replies (WAIT)
    Min,
    /// Element-wise AND of boolean-ish replies (SCRIPT EXISTS)
    LogicalAnd,
    /// Element-wise OR of boolean-ish replies
    LogicalOr,
    /// Concatenation of array replies (KEYS)
    CombineArrays,
    Custom(CombineFn),
}

impl Combinator {
    /// Combine replies given in node order
    pub fn combine(&self, values: Vec<RespValue>) -> Result<RespValue> {
        match self {
            Combinator::Sum => Ok(RespValue::Integer(
                integers(&values)?.into_iter().fold(0i64, |acc, v| acc.saturating_add(v)),
            )),
            Combinator::Min => integers(&values)?
                .into_iter()
                .min()
                .map(RespValue::Integer)
                .ok_or_else(|| AikvError::InvalidReply("No replies to combine".to_string())),
            Combinator::LogicalAnd => logical(values, |a, b| a && b),
            Combinator::LogicalOr => logical(values, |a, b| a || b),
            Combinator::CombineArrays => {
                let mut combined = Vec::new();
                for value in values {
                    match value {
                        RespValue::Array(Some(items)) => combined.extend(items),
                        RespValue::Array(None) | RespValue::Null => {}
                        other => {
                            return Err(AikvError::InvalidReply(format!(
                                "Expected array reply, got {}",
                                other.type_name()
                            )))
                        }
                    }
                }
                Ok(RespValue::Array(Some(combined)))
            }
            Combinator::Custom(f) => f(values),
        }
    }
}

fn integers(values: &[RespValue]) -> Result<Vec<i64>> {
    values
        .iter()
        .map(|v| {
            v.as_integer().ok_or_else(|| {
                AikvError::InvalidReply(format!("Expected integer reply, got {}", v.type_name()))
            })
        })
        .collect()
}

fn truthy(value: &RespValue) -> Result<bool> {
    match value {
        RespValue::Boolean(b) => Ok(*b),
        RespValue::Integer(i) => Ok(*i != 0),
        other => Err(AikvError::InvalidReply(format!(
            "Expected boolean reply, got {}",
            other.type_name()
        ))),
    }
}

/// Replies are either all scalars or all arrays of equal length. Integer
/// inputs produce 0/1 integers, RESP3 booleans produce booleans.
fn logical(values: Vec<RespValue>, op: fn(bool, bool) -> bool) -> Result<RespValue> {
    let as_integer = !matches!(values.first(), Some(RespValue::Boolean(_)))
        && !matches!(
            values.first(),
            Some(RespValue::Array(Some(items))) if matches!(items.first(), Some(RespValue::Boolean(_)))
        );
    let encode = |b: bool| {
        if as_integer {
            RespValue::Integer(b as i64)
        } else {
            RespValue::Boolean(b)
        }
    };

    let mut iter = values.into_iter();
    let first = iter
        .next()
        .ok_or_else(|| AikvError::InvalidReply("No replies to combine".to_string()))?;

    match first {
        RespValue::Array(Some(items)) => {
            let mut acc = items.iter().map(truthy).collect::<Result<Vec<_>>>()?;
            for value in iter {
                let RespValue::Array(Some(items)) = value else {
                    return Err(AikvError::InvalidReply(
                        "Mixed array and scalar replies".to_string(),
                    ));
                };
                if items.len() != acc.len() {
                    return Err(AikvError::InvalidReply(format!(
                        "Array replies differ in length ({} vs {})",
                        acc.len(),
                        items.len()
                    )));
                }
                for (slot, item) in acc.iter_mut().zip(items.iter()) {
                    *slot = op(*slot, truthy(item)?);
                }
            }
            Ok(RespValue::Array(Some(acc.into_iter().map(encode).collect())))
        }
        scalar => {
            let mut acc = truthy(&scalar)?;
            for value in iter {
                acc = op(acc, truthy(&value)?);
            }
            Ok(encode(acc))
        }
    }
}

/// How N per-node outcomes collapse into one value
#[derive(Debug, Clone, Copy)]
pub enum AggregationPolicy {
    /// First success in node order wins
    OneSucceeded,
    /// Every node must succeed with an equal reply
    AllSucceeded,
    /// Every node must succeed; replies are kept per node
    AllSucceededKeepMap,
    /// Command-specific combination of the successful replies
    Special {
        combine: Combinator,
        /// Combine whatever succeeded instead of failing on partial errors
        tolerate_partial: bool,
    },
    /// Replies are returned per node
    NoAggregation,
}

impl AggregationPolicy {
    pub const fn special(combine: Combinator) -> Self {
        AggregationPolicy::Special {
            combine,
            tolerate_partial: false,
        }
    }
}

/// Default route of a command
#[derive(Debug, Clone)]
pub enum DefaultRoute {
    Directive(RoutingDirective),
    /// Slot of the key at `index` in the argument list (name excluded)
    FirstKey { index: usize, readonly: bool },
}

impl DefaultRoute {
    /// Concrete directive for a call with `args`. A keyed command called
    /// without its key goes to a random node, which reports the arity error.
    pub fn directive(&self, args: &[Bytes]) -> RoutingDirective {
        match self {
            DefaultRoute::Directive(directive) => directive.clone(),
            DefaultRoute::FirstKey { index, readonly } => match args.get(*index) {
                Some(key) => RoutingDirective::BySlot {
                    target: SlotTarget::Key(key.clone()),
                    slot_type: if *readonly {
                        SlotType::ReplicaPreferred
                    } else {
                        SlotType::Primary
                    },
                },
                None => RoutingDirective::RandomNode,
            },
        }
    }
}

/// Default route and aggregation policy of one command
#[derive(Debug, Clone)]
pub struct CommandRouteSpec {
    pub route: DefaultRoute,
    pub policy: AggregationPolicy,
}

impl CommandRouteSpec {
    pub fn new(directive: RoutingDirective, policy: AggregationPolicy) -> Self {
        Self {
            route: DefaultRoute::Directive(directive),
            policy,
        }
    }

    fn keyed(readonly: bool) -> Self {
        Self {
            route: DefaultRoute::FirstKey { index: 0, readonly },
            policy: AggregationPolicy::OneSucceeded,
        }
    }
}

const READONLY_KEY_COMMANDS: &[&str] = &[
    "GET", "MGET", "GETRANGE", "STRLEN", "EXISTS", "TTL", "PTTL", "TYPE", "HGET", "HMGET",
    "HGETALL", "HEXISTS", "HKEYS", "HVALS", "HLEN", "LRANGE", "LLEN", "LINDEX", "SMEMBERS",
    "SISMEMBER", "SCARD", "ZRANGE", "ZSCORE", "ZCARD", "ZRANK", "ZCOUNT", "JSON.GET",
    "JSON.TYPE", "JSON.STRLEN", "JSON.ARRLEN", "JSON.OBJLEN",
];

const WRITE_KEY_COMMANDS: &[&str] = &[
    "SET", "SETNX", "SETEX", "PSETEX", "GETSET", "GETDEL", "MSET", "APPEND", "DEL", "UNLINK",
    "INCR", "INCRBY", "DECR", "DECRBY", "EXPIRE", "PEXPIRE", "PERSIST", "HSET", "HSETNX",
    "HDEL", "HINCRBY", "LPUSH", "RPUSH", "LPOP", "RPOP", "LSET", "LREM", "SADD", "SREM",
    "SPOP", "ZADD", "ZREM", "ZINCRBY", "JSON.SET", "JSON.DEL",
];

/// Lookup table from command name to `CommandRouteSpec`
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    entries: HashMap<String, CommandRouteSpec>,
}

impl RoutingTable {
    /// An empty table: every command falls back to the defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in table for the commands whose routing is not "one random
    /// node, first success"
    pub fn builtin() -> Self {
        use AggregationPolicy::*;
        use RoutingDirective::*;

        let mut table = Self::new();

        table.register("INFO", CommandRouteSpec::new(AllPrimaries, NoAggregation));
        table.register("PING", CommandRouteSpec::new(AllNodes, AllSucceeded));
        table.register("TIME", CommandRouteSpec::new(RandomNode, NoAggregation));
        table.register("ECHO", CommandRouteSpec::new(RandomNode, OneSucceeded));
        table.register(
            "DBSIZE",
            CommandRouteSpec::new(AllPrimaries, AggregationPolicy::special(Combinator::Sum)),
        );
        table.register(
            "KEYS",
            CommandRouteSpec::new(
                AllPrimaries,
                AggregationPolicy::special(Combinator::CombineArrays),
            ),
        );
        table.register(
            "WAIT",
            CommandRouteSpec::new(AllPrimaries, AggregationPolicy::special(Combinator::Min)),
        );
        table.register(
            "SCRIPT EXISTS",
            CommandRouteSpec::new(
                AllPrimaries,
                AggregationPolicy::special(Combinator::LogicalAnd),
            ),
        );
        for name in ["FLUSHALL", "FLUSHDB", "FUNCTION FLUSH", "FUNCTION DELETE", "FUNCTION LOAD"] {
            table.register(name, CommandRouteSpec::new(AllPrimaries, AllSucceeded));
        }
        for name in ["SCRIPT FLUSH", "SCRIPT LOAD", "CONFIG SET", "CONFIG RESETSTAT"] {
            table.register(name, CommandRouteSpec::new(AllNodes, AllSucceeded));
        }
        for name in ["CLIENT LIST", "LASTSAVE", "FUNCTION STATS"] {
            table.register(name, CommandRouteSpec::new(AllNodes, AllSucceededKeepMap));
        }
        for name in READONLY_KEY_COMMANDS {
            table.register(name, CommandRouteSpec::keyed(true));
        }
        for name in WRITE_KEY_COMMANDS {
            table.register(name, CommandRouteSpec::keyed(false));
        }

        table
    }

    /// Shared instance of the built-in table
    pub fn default_table() -> &'static RoutingTable {
        static TABLE: OnceLock<RoutingTable> = OnceLock::new();
        TABLE.get_or_init(RoutingTable::builtin)
    }

    /// Add or replace an entry. Names are case-insensitive; two-word names
    /// such as `CONFIG SET` match a command plus its first argument.
    pub fn register(&mut self, name: &str, spec: CommandRouteSpec) {
        self.entries.insert(name.to_uppercase(), spec);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry for `name`, trying `name sub` before the bare name
    pub fn lookup(&self, name: &str, args: &[Bytes]) -> Option<&CommandRouteSpec> {
        let name = name.to_uppercase();
        if let Some(sub) = args.first() {
            let compound = format!("{} {}", name, String::from_utf8_lossy(sub).to_uppercase());
            if let Some(spec) = self.entries.get(&compound) {
                return Some(spec);
            }
        }
        self.entries.get(&name)
    }

    /// Routing decision for one call.
    ///
    /// Without an explicit directive the table entry applies, or
    /// `(RandomNode, OneSucceeded)` for unknown commands. An explicit
    /// directive replaces only the route; unknown commands then fall back to
    /// `NoAggregation` so a multi-node route returns a per-node map.
    pub fn plan(
        &self,
        name: &str,
        args: &[Bytes],
        explicit: Option<RoutingDirective>,
    ) -> (RoutingDirective, AggregationPolicy) {
        let spec = self.lookup(name, args);
        match (explicit, spec) {
            (Some(directive), Some(spec)) => (directive, spec.policy),
            (Some(directive), None) => (directive, AggregationPolicy::NoAggregation),
            (None, Some(spec)) => (spec.route.directive(args), spec.policy),
            (None, None) => (
                RoutingDirective::RandomNode,
                AggregationPolicy::OneSucceeded,
            ),
        }
    }
}
