//! Fan out to every replica at once

use crate::client::dispatch::{DispatchContext, DispatchStrategy};
use crate::client::policy::ReplicaOrdering;
use async_trait::async_trait;

#[derive(Debug, Default, Clone, Copy)]
pub struct BroadcastStrategy;

#[async_trait]
impl DispatchStrategy for BroadcastStrategy {
    fn name(&self) -> &'static str {
        "broadcast"
    }

    async fn select_and_execute(&self, ctx: &DispatchContext<'_>) -> Option<String> {
        let order = {
            let mut rng = rand::thread_rng();
            ReplicaOrdering::All.arrange(ctx.replicas, ctx.stats, &mut rng)
        };

        let mut attempts = ctx.attempts();
        let budget = ctx.remaining();
        for replica in &order {
            attempts.launch(replica, budget);
        }

        let answer = attempts.first_success(ctx.stats, ctx.deadline).await;
        attempts.cancel_outstanding();
        answer
    }
}
