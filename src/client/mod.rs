//! Client side: answer one query from a cluster of interchangeable replicas
//!
//! - `LatencyTracker`: last observed latency per replica
//! - `ReplicaOrdering`: which replicas to try and in what order
//! - `RequestExecutor`: one bounded HTTP attempt, plus fire-and-forget cancels
//! - strategies: five ways of racing replicas against a deadline
//! - `ClusterClient`: ties them together behind `process(query, timeout)`

pub mod cluster;
pub mod dispatch;
pub mod executor;
pub mod latency;
pub mod policy;
pub mod strategy;
pub mod types;

pub use cluster::ClusterClient;
pub use dispatch::{DispatchContext, DispatchStrategy};
pub use executor::{AttemptOutcome, AttemptStatus, RequestExecutor, TransportError};
pub use latency::LatencyTracker;
pub use policy::ReplicaOrdering;
pub use strategy::StrategyKind;
pub use types::{CorrelationId, ReplicaAddress};
