//! The cluster client: one logical query, one deadline, many replicas

use crate::client::dispatch::{DispatchContext, DispatchStrategy};
use crate::client::executor::RequestExecutor;
use crate::client::latency::LatencyTracker;
use crate::client::strategy::StrategyKind;
use crate::client::types::ReplicaAddress;
use crate::common::{ClientConfig, Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub struct ClusterClient {
    replicas: Vec<ReplicaAddress>,
    stats: Arc<LatencyTracker>,
    executor: RequestExecutor,
    strategy: Box<dyn DispatchStrategy>,
}

impl ClusterClient {
    pub fn new(
        replicas: Vec<ReplicaAddress>,
        strategy: Box<dyn DispatchStrategy>,
        executor: RequestExecutor,
    ) -> Self {
        Self {
            replicas,
            stats: Arc::new(LatencyTracker::new()),
            executor,
            strategy,
        }
    }

    /// Client for `replicas` using the strategy and transport settings in `config`
    pub fn from_config<I, S>(replicas: I, config: &ClientConfig) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<ReplicaAddress>,
    {
        let strategy = config
            .strategy
            .build(config.fanout_cap, config.fanout_pacing());
        let executor = RequestExecutor::new(config.cancel_timeout())?;
        Ok(Self::new(
            replicas.into_iter().map(Into::into).collect(),
            strategy,
            executor,
        ))
    }

    /// Client with default transport settings
    pub fn with_strategy<I, S>(replicas: I, kind: StrategyKind) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<ReplicaAddress>,
    {
        let config = ClientConfig {
            strategy: kind,
            ..Default::default()
        };
        Self::from_config(replicas, &config)
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn replicas(&self) -> &[ReplicaAddress] {
        &self.replicas
    }

    /// Latency observations, shared for the client's whole lifetime
    pub fn stats(&self) -> &Arc<LatencyTracker> {
        &self.stats
    }

    /// Answer `query` from some replica before `timeout` elapses.
    ///
    /// Fails with [`Error::Deadline`] when no replica answers in time, whatever
    /// the individual attempts ran into.
    pub async fn process(&self, query: &str, timeout: Duration) -> Result<String> {
        let started = Instant::now();
        let deadline = started + timeout;

        if self.replicas.is_empty() {
            tracing::warn!("No replicas configured");
            return Err(Error::Deadline { timeout });
        }

        let ctx = DispatchContext {
            query,
            replicas: &self.replicas,
            stats: &self.stats,
            executor: &self.executor,
            deadline,
        };

        // The strategy already honours the deadline; this guard only keeps a
        // misbehaving wait from outliving it.
        let answer = tokio::time::timeout_at(deadline, self.strategy.select_and_execute(&ctx))
            .await
            .ok()
            .flatten();

        match answer {
            Some(value) => {
                tracing::info!(
                    strategy = self.strategy.name(),
                    query,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Query answered"
                );
                Ok(value)
            }
            None => {
                tracing::warn!(
                    strategy = self.strategy.name(),
                    query,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Query deadline exceeded"
                );
                Err(Error::Deadline { timeout })
            }
        }
    }
}

impl std::fmt::Debug for ClusterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterClient")
            .field("strategy", &self.strategy.name())
            .field("replicas", &self.replicas.len())
            .field("measured", &self.stats.measured_count())
            .finish()
    }
}
