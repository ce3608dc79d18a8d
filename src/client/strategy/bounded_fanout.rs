//! Staggered fan-out over a capped, statistics-informed subset

use crate::client::dispatch::{staggered, DispatchContext, DispatchStrategy};
use crate::client::policy::ReplicaOrdering;
use async_trait::async_trait;
use std::time::Duration;

pub const DEFAULT_FANOUT_CAP: usize = 10;
pub const DEFAULT_FANOUT_PACING: Duration = Duration::from_millis(20);

/// Contacts at most `cap` replicas, launched `pacing` apart. Every launched
/// attempt stays outstanding until one succeeds, then the rest are cancelled.
#[derive(Debug, Clone, Copy)]
pub struct BoundedFanoutStrategy {
    cap: usize,
    pacing: Duration,
}

impl BoundedFanoutStrategy {
    pub fn new(cap: usize, pacing: Duration) -> Self {
        Self {
            cap: cap.max(1),
            pacing,
        }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }
}

impl Default for BoundedFanoutStrategy {
    fn default() -> Self {
        Self::new(DEFAULT_FANOUT_CAP, DEFAULT_FANOUT_PACING)
    }
}

#[async_trait]
impl DispatchStrategy for BoundedFanoutStrategy {
    fn name(&self) -> &'static str {
        "bounded-fanout"
    }

    async fn select_and_execute(&self, ctx: &DispatchContext<'_>) -> Option<String> {
        let order = {
            let mut rng = rand::thread_rng();
            ReplicaOrdering::Bounded { cap: self.cap }.arrange(ctx.replicas, ctx.stats, &mut rng)
        };

        // Never pace so slowly that the tail of the list misses the deadline
        let pacing = self.pacing;
        staggered(ctx, &order, move |remaining, left| {
            pacing.min(remaining / left.max(1) as u32)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cap_is_at_least_one() {
        assert_eq!(BoundedFanoutStrategy::new(0, DEFAULT_FANOUT_PACING).cap(), 1);
        assert_eq!(BoundedFanoutStrategy::default().cap(), DEFAULT_FANOUT_CAP);
    }
}
