pub mod cluster;
pub mod config;
pub mod error;
pub mod observability;
pub mod protocol;
pub mod transport;

pub use cluster::{ClusterClient, ClusterValue, RoutingDirective};
pub use config::Config;
pub use error::{AikvError, Result};
