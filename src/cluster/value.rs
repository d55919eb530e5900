//! The caller-visible result of a routed command.

use crate::error::{AikvError, Result};
use crate::protocol::RespValue;
use std::collections::BTreeMap;

/// Result of a routed command: nothing, one logical value, or one value per
/// node keyed by `host:port`.
///
/// Built by the aggregator only. `Multi` always holds at least two entries.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ClusterValue {
    #[default]
    Empty,
    Single(RespValue),
    Multi(BTreeMap<String, RespValue>),
}

impl ClusterValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, ClusterValue::Empty)
    }

    pub fn is_single(&self) -> bool {
        matches!(self, ClusterValue::Single(_))
    }

    pub fn is_multi(&self) -> bool {
        matches!(self, ClusterValue::Multi(_))
    }

    fn variant_name(&self) -> &'static str {
        match self {
            ClusterValue::Empty => "empty",
            ClusterValue::Single(_) => "single",
            ClusterValue::Multi(_) => "multi",
        }
    }

    /// The value of a `Single`
    pub fn single_value(&self) -> Result<&RespValue> {
        match self {
            ClusterValue::Single(value) => Ok(value),
            other => Err(AikvError::WrongVariant {
                expected: "single",
                found: other.variant_name(),
            }),
        }
    }

    /// The per-node map of a `Multi`
    pub fn multi_value(&self) -> Result<&BTreeMap<String, RespValue>> {
        match self {
            ClusterValue::Multi(map) => Ok(map),
            other => Err(AikvError::WrongVariant {
                expected: "multi",
                found: other.variant_name(),
            }),
        }
    }

    pub fn into_single(self) -> Result<RespValue> {
        match self {
            ClusterValue::Single(value) => Ok(value),
            other => Err(AikvError::WrongVariant {
                expected: "single",
                found: other.variant_name(),
            }),
        }
    }

    pub fn into_multi(self) -> Result<BTreeMap<String, RespValue>> {
        match self {
            ClusterValue::Multi(map) => Ok(map),
            other => Err(AikvError::WrongVariant {
                expected: "multi",
                found: other.variant_name(),
            }),
        }
    }
}

impl std::fmt::Display for ClusterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClusterValue::Empty => write!(f, "(empty)"),
            ClusterValue::Single(value) => write!(f, "{}", value),
            ClusterValue::Multi(map) => {
                for (i, (node, value)) in map.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}:\n{}", node, value)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_accessors_fail() {
        let value = ClusterValue::Empty;
        assert!(value.is_empty());
        assert!(matches!(
            value.single_value(),
            Err(AikvError::WrongVariant { expected: "single", found: "empty" })
        ));
        assert!(matches!(
            value.multi_value(),
            Err(AikvError::WrongVariant { expected: "multi", found: "empty" })
        ));
    }

    #[test]
    fn test_single() {
        let value = ClusterValue::Single(RespValue::simple_string("PONG"));
        assert!(value.is_single() && !value.is_multi());
        assert_eq!(value.single_value().unwrap().as_str(), Some("PONG"));
        assert!(value.multi_value().is_err());
        assert_eq!(value.into_single().unwrap(), RespValue::simple_string("PONG"));
    }

    #[test]
    fn test_multi() {
        let mut map = BTreeMap::new();
        map.insert("127.0.0.1:7000".to_string(), RespValue::integer(1));
        map.insert("127.0.0.1:7001".to_string(), RespValue::integer(2));
        let value = ClusterValue::Multi(map);
        assert!(value.is_multi());
        assert_eq!(value.multi_value().unwrap().len(), 2);
        assert!(value.single_value().is_err());
    }
}
