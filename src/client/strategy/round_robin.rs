//! Sequential attempts, each with an equal slice of the remaining deadline

use crate::client::dispatch::{record_outcome, slice, DispatchContext, DispatchStrategy};
use crate::client::policy::ReplicaOrdering;
use async_trait::async_trait;

/// Tries replicas one after another, never-measured and slowest-measured
/// first, so a replica that was slow once is re-measured before being
/// trusted again.
#[derive(Debug, Default, Clone, Copy)]
pub struct RoundRobinStrategy;

#[async_trait]
impl DispatchStrategy for RoundRobinStrategy {
    fn name(&self) -> &'static str {
        "round-robin"
    }

    async fn select_and_execute(&self, ctx: &DispatchContext<'_>) -> Option<String> {
        let order = {
            let mut rng = rand::thread_rng();
            ReplicaOrdering::WorstFirst.arrange(ctx.replicas, ctx.stats, &mut rng)
        };

        let mut attempts = ctx.attempts();
        for (i, replica) in order.iter().enumerate() {
            let remaining = ctx.remaining();
            if remaining.is_zero() {
                break;
            }

            let done = attempts
                .run_inline(replica, slice(remaining, order.len() - i))
                .await;
            record_outcome(ctx.stats, &done.replica, &done.outcome, done.budget);
            if done.outcome.succeeded() {
                attempts.cancel_outstanding();
                return Some(done.outcome.value);
            }
        }

        attempts.cancel_outstanding();
        None
    }
}
