//! Dispatch strategies.
//!
//! The five strategies differ only in which replicas they pick, in what order,
//! and how many attempts they keep in flight:
//!
//! - **Random**: one random replica, whole deadline
//! - **RoundRobin**: sequential, worst-measured first, equal deadline slices
//! - **Smart**: staggered concurrent, best-measured first, slice-paced
//! - **Broadcast**: every replica at once
//! - **BoundedFanout**: staggered concurrent over a capped subset

pub mod bounded_fanout;
pub mod broadcast;
pub mod random;
pub mod round_robin;
pub mod smart;

pub use bounded_fanout::BoundedFanoutStrategy;
pub use broadcast::BroadcastStrategy;
pub use random::RandomStrategy;
pub use round_robin::RoundRobinStrategy;
pub use smart::SmartStrategy;

use crate::client::dispatch::DispatchStrategy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Strategy selector for config files and the command line
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    Random,
    RoundRobin,
    #[default]
    Smart,
    Broadcast,
    BoundedFanout,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 5] = [
        StrategyKind::Random,
        StrategyKind::RoundRobin,
        StrategyKind::Smart,
        StrategyKind::Broadcast,
        StrategyKind::BoundedFanout,
    ];

    /// Build the strategy; the fanout settings only matter for bounded fan-out.
    pub fn build(self, fanout_cap: usize, fanout_pacing: Duration) -> Box<dyn DispatchStrategy> {
        match self {
            StrategyKind::Random => Box::new(RandomStrategy),
            StrategyKind::RoundRobin => Box::new(RoundRobinStrategy),
            StrategyKind::Smart => Box::new(SmartStrategy),
            StrategyKind::Broadcast => Box::new(BroadcastStrategy),
            StrategyKind::BoundedFanout => {
                Box::new(BoundedFanoutStrategy::new(fanout_cap, fanout_pacing))
            }
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyKind::Random => write!(f, "random"),
            StrategyKind::RoundRobin => write!(f, "round-robin"),
            StrategyKind::Smart => write!(f, "smart"),
            StrategyKind::Broadcast => write!(f, "broadcast"),
            StrategyKind::BoundedFanout => write!(f, "bounded-fanout"),
        }
    }
}
