//! # hedgerpc
//!
//! Fault-tolerant RPC dispatch over a cluster of interchangeable replicas:
//! - One logical query, one hard deadline, as many replicas as it takes
//! - Five dispatch strategies, from a single random pick to full broadcast
//! - Per-replica latency tracking that steers later queries
//! - Best-effort cancellation: losing replicas are told to drop their work
//!
//! ## Architecture
//!
//! ```text
//!            process(query, timeout)
//!                     │
//!           ┌─────────▼──────────┐
//!           │   ClusterClient    │  strategy + latency stats
//!           └─────────┬──────────┘
//!                     │ GET {replica}?query=...   (X-Request-ID)
//!   ┌─────────────────┼─────────────────┐
//!   │                 │                 │
//! ┌─▼──────────┐  ┌───▼────────┐  ┌─────▼──────┐
//! │ Replica 1  │  │ Replica 2  │  │ Replica 3  │
//! │ + registry │  │ + registry │  │ + registry │
//! └────────────┘  └────────────┘  └────────────┘
//!        ▲  cancel: same id + X-Cancel: true, sent to the losers
//! ```
//!
//! ## Usage
//!
//! ### Start replicas
//! ```bash
//! hedgerpc-replica --port 8080 --duration 100ms
//! hedgerpc-replica --port 8081 --duration 1s
//! hedgerpc-replica --port 8082 --duration 10s
//! ```
//!
//! ### Query them
//! ```bash
//! hedgerpc --strategy smart --timeout 6s \
//!   --replica http://127.0.0.1:8080/some_method/ \
//!   --replica http://127.0.0.1:8081/some_method/ \
//!   --replica http://127.0.0.1:8082/some_method/ \
//!   lorem ipsum dolor
//! ```
//!
//! ### From code
//! ```no_run
//! use hedgerpc::{client::StrategyKind, ClusterClient};
//! use std::time::Duration;
//!
//! # async fn run() -> hedgerpc::Result<()> {
//! let client = ClusterClient::with_strategy(
//!     ["http://127.0.0.1:8080/some_method/", "http://127.0.0.1:8081/some_method/"],
//!     StrategyKind::Smart,
//! )?;
//! let digest = client.process("lorem", Duration::from_secs(6)).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod common;
pub mod replica;

// Re-export commonly used types
pub use client::ClusterClient;
pub use common::{Error, Result, Settings};
pub use replica::ReplicaServer;

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
