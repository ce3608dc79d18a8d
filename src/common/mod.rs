//! Common utilities and types shared by the client and replica sides

pub mod config;
pub mod error;
pub mod hash;
pub mod metrics;
pub mod tracing_middleware;
pub mod utils;

pub use config::{ClientConfig, ReplicaConfig, ServerMode, Settings};
pub use error::{Error, Result};
pub use hash::QueryHasher;
pub use metrics::ReplicaMetrics;
pub use tracing_middleware::{CANCEL_HEADER, CORRELATION_ID_HEADER};
pub use utils::{load_replica_addresses, parse_duration, parse_replica_list};
