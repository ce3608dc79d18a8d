//! Single attempt at a uniformly random replica

use crate::client::dispatch::{record_outcome, DispatchContext, DispatchStrategy};
use crate::client::policy::ReplicaOrdering;
use async_trait::async_trait;

/// One replica, the whole deadline, no retry
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomStrategy;

#[async_trait]
impl DispatchStrategy for RandomStrategy {
    fn name(&self) -> &'static str {
        "random"
    }

    async fn select_and_execute(&self, ctx: &DispatchContext<'_>) -> Option<String> {
        let picked = {
            let mut rng = rand::thread_rng();
            ReplicaOrdering::Random.arrange(ctx.replicas, ctx.stats, &mut rng)
        };
        let replica = picked.first()?;

        let mut attempts = ctx.attempts();
        let done = attempts.run_inline(replica, ctx.remaining()).await;
        record_outcome(ctx.stats, &done.replica, &done.outcome, done.budget);
        attempts.cancel_outstanding();

        done.outcome.succeeded().then_some(done.outcome.value)
    }
}
