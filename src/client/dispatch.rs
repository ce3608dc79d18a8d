//! Shared machinery for dispatch strategies
//!
//! A strategy receives a [`DispatchContext`] and answers with the first
//! successful value, or `None` once its replicas or the deadline run out.
//! [`AttemptSet`] tracks every attempt a strategy launched so the losers get
//! a cancel call when the query finishes, however it finishes.

use crate::client::executor::{AttemptOutcome, AttemptStatus, RequestExecutor};
use crate::client::latency::LatencyTracker;
use crate::client::types::{CorrelationId, ReplicaAddress};
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use futures_util::stream::{FuturesUnordered, StreamExt};
use futures_util::FutureExt;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Everything one `process` call hands to its strategy
pub struct DispatchContext<'a> {
    pub query: &'a str,
    pub replicas: &'a [ReplicaAddress],
    pub stats: &'a LatencyTracker,
    pub executor: &'a RequestExecutor,
    pub deadline: Instant,
}

impl DispatchContext<'_> {
    /// Time left until the deadline, zero once it has passed
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn attempts(&self) -> AttemptSet {
        AttemptSet::new(self.executor.clone(), self.query)
    }
}

/// One way of turning replicas + statistics into an answer
#[async_trait]
pub trait DispatchStrategy: Send + Sync {
    /// Name for logs
    fn name(&self) -> &'static str;

    async fn select_and_execute(&self, ctx: &DispatchContext<'_>) -> Option<String>;
}

/// Equal share of `remaining` for each of `left` replicas still to try.
///
/// With a single replica left it gets the whole budget.
pub fn slice(remaining: Duration, left: usize) -> Duration {
    remaining / left.max(1) as u32
}

/// Fold an attempt into the latency statistics.
///
/// Timeouts leave the replica untouched. A definitive failure is charged at
/// least the budget it was granted, so a replica that refuses connections
/// does not look fast.
pub fn record_outcome(
    stats: &LatencyTracker,
    replica: &ReplicaAddress,
    outcome: &AttemptOutcome,
    budget: Duration,
) {
    match outcome.status {
        AttemptStatus::Succeeded => stats.record(replica, outcome.elapsed),
        AttemptStatus::Failed => stats.record(replica, outcome.elapsed.max(budget)),
        AttemptStatus::TimedOut => {}
    }
}

/// An attempt that finished while the strategy was still waiting
#[derive(Debug)]
pub struct Completed {
    pub replica: ReplicaAddress,
    pub id: CorrelationId,
    pub budget: Duration,
    pub outcome: AttemptOutcome,
}

/// What a strategy observed while waiting on its attempts
#[derive(Debug)]
pub enum Step {
    /// A replica answered; the value is the response body
    Won(String),
    /// One attempt failed definitively; others may still be running
    Lost,
    /// Nothing more to observe before the wait ended
    Idle,
}

/// The attempts of one `process` call
pub struct AttemptSet {
    executor: RequestExecutor,
    query: String,
    running: FuturesUnordered<BoxFuture<'static, Completed>>,
    outstanding: HashMap<CorrelationId, ReplicaAddress>,
}

impl AttemptSet {
    pub fn new(executor: RequestExecutor, query: &str) -> Self {
        Self {
            executor,
            query: query.to_string(),
            running: FuturesUnordered::new(),
            outstanding: HashMap::new(),
        }
    }

    /// Launch an attempt in the background; it keeps running even if nobody
    /// waits for it any more.
    pub fn launch(&mut self, replica: &ReplicaAddress, budget: Duration) {
        let id = CorrelationId::generate();
        self.outstanding.insert(id.clone(), replica.clone());

        let executor = self.executor.clone();
        let query = self.query.clone();
        let task_replica = replica.clone();
        let task_id = id.clone();
        let handle = tokio::spawn(async move {
            executor.attempt(&task_replica, &query, &task_id, budget).await
        });

        let replica = replica.clone();
        let started = Instant::now();
        self.running.push(
            async move {
                let outcome = match handle.await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        tracing::error!(%replica, request_id = %id, error = %e, "Attempt task died");
                        AttemptOutcome::failed(started.elapsed())
                    }
                };
                Completed {
                    replica,
                    id,
                    budget,
                    outcome,
                }
            }
            .boxed(),
        );
    }

    /// Run one attempt inline, waiting for it up to `budget`.
    ///
    /// A timed-out attempt stays outstanding so it is cancelled later.
    pub async fn run_inline(&mut self, replica: &ReplicaAddress, budget: Duration) -> Completed {
        let id = CorrelationId::generate();
        let outcome = self.executor.attempt(replica, &self.query, &id, budget).await;
        if outcome.status == AttemptStatus::TimedOut {
            self.outstanding.insert(id.clone(), replica.clone());
        }
        Completed {
            replica: replica.clone(),
            id,
            budget,
            outcome,
        }
    }

    /// Wait for the next background attempt to finish, no later than `until`.
    pub async fn next_until(&mut self, until: Instant) -> Option<Completed> {
        if self.running.is_empty() {
            return None;
        }
        match tokio::time::timeout_at(until, self.running.next()).await {
            Ok(Some(done)) => {
                self.outstanding.remove(&done.id);
                Some(done)
            }
            Ok(None) | Err(_) => None,
        }
    }

    /// Wait for the next completion, record it, and report what happened.
    pub async fn step(&mut self, stats: &LatencyTracker, until: Instant) -> Step {
        match self.next_until(until).await {
            Some(done) => {
                record_outcome(stats, &done.replica, &done.outcome, done.budget);
                if done.outcome.succeeded() {
                    tracing::debug!(replica = %done.replica, request_id = %done.id, "Race won");
                    Step::Won(done.outcome.value)
                } else {
                    Step::Lost
                }
            }
            None => Step::Idle,
        }
    }

    /// Keep stepping until a winner shows up or nothing is left before `until`.
    pub async fn first_success(&mut self, stats: &LatencyTracker, until: Instant) -> Option<String> {
        loop {
            match self.step(stats, until).await {
                Step::Won(value) => return Some(value),
                Step::Lost => continue,
                Step::Idle => return None,
            }
        }
    }

    /// Attempts launched (or abandoned) that have not reported back
    pub fn outstanding(&self) -> usize {
        self.outstanding.len()
    }

    /// Fire a cancel at every replica still working for this query.
    pub fn cancel_outstanding(&mut self) {
        for (id, replica) in self.outstanding.drain() {
            tracing::debug!(%replica, request_id = %id, "Cancelling outstanding attempt");
            self.executor.cancel(&replica, &id);
        }
    }
}

impl Drop for AttemptSet {
    fn drop(&mut self) {
        if self.outstanding.is_empty() {
            return;
        }
        // Cancel calls are spawned on the runtime; without one there is
        // nobody left to send them.
        if tokio::runtime::Handle::try_current().is_ok() {
            self.cancel_outstanding();
        }
    }
}

/// Launch `order` one replica at a time, pausing `pace(remaining, left)`
/// between launches unless an answer or a failure arrives first. Every
/// launched attempt stays in the race until the deadline.
pub async fn staggered<F>(
    ctx: &DispatchContext<'_>,
    order: &[ReplicaAddress],
    pace: F,
) -> Option<String>
where
    F: Fn(Duration, usize) -> Duration,
{
    let mut attempts = ctx.attempts();

    for (i, replica) in order.iter().enumerate() {
        let remaining = ctx.remaining();
        if remaining.is_zero() {
            break;
        }
        attempts.launch(replica, remaining);

        let launch_next_at = (Instant::now() + pace(remaining, order.len() - i)).min(ctx.deadline);
        match attempts.step(ctx.stats, launch_next_at).await {
            Step::Won(value) => {
                attempts.cancel_outstanding();
                return Some(value);
            }
            // A definitive failure frees a slot right away
            Step::Lost | Step::Idle => {}
        }
    }

    let answer = attempts.first_success(ctx.stats, ctx.deadline).await;
    attempts.cancel_outstanding();
    answer
}
