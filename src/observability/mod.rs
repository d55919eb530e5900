//! Observability module
//!
//! This module provides:
//! - Logging setup on top of `tracing_subscriber`
//! - Routing counters (commands, node sends, redirects, refreshes)

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogConfig, LogFormat};
pub use metrics::{Counter, MetricsSnapshot, RouterMetrics};
