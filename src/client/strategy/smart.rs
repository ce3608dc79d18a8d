//! Staggered concurrent attempts paced by deadline slices

use crate::client::dispatch::{slice, staggered, DispatchContext, DispatchStrategy};
use crate::client::policy::ReplicaOrdering;
use async_trait::async_trait;

/// Launches the best-measured replica first; whenever the current slice
/// elapses without an answer the next replica joins the race, while the
/// earlier attempts keep running until the deadline. The first success wins
/// and the rest are cancelled.
#[derive(Debug, Default, Clone, Copy)]
pub struct SmartStrategy;

#[async_trait]
impl DispatchStrategy for SmartStrategy {
    fn name(&self) -> &'static str {
        "smart"
    }

    async fn select_and_execute(&self, ctx: &DispatchContext<'_>) -> Option<String> {
        let order = {
            let mut rng = rand::thread_rng();
            ReplicaOrdering::BestFirst.arrange(ctx.replicas, ctx.stats, &mut rng)
        };

        staggered(ctx, &order, slice).await
    }
}
