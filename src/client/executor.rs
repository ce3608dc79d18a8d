//! One outbound call to one replica, bounded by a budget
//!
//! Attempts never return errors: transport failures and timeouts both come
//! back as unsuccessful outcomes. Cancel calls are fire-and-forget.

use crate::client::types::{CorrelationId, ReplicaAddress};
use crate::common::{CANCEL_HEADER, CORRELATION_ID_HEADER};
use reqwest::{StatusCode, Url};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Why a single attempt did not produce a value
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    UnexpectedStatus(StatusCode),

    #[error("invalid replica address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStatus {
    Succeeded,
    /// Definitive failure observed before the budget ran out
    Failed,
    /// Budget elapsed first; the call was abandoned, not necessarily aborted
    TimedOut,
}

#[derive(Debug, Clone)]
pub struct AttemptOutcome {
    pub status: AttemptStatus,
    pub value: String,
    pub elapsed: Duration,
}

impl AttemptOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == AttemptStatus::Succeeded
    }

    pub(crate) fn failed(elapsed: Duration) -> Self {
        Self {
            status: AttemptStatus::Failed,
            value: String::new(),
            elapsed,
        }
    }
}

/// HTTP transport for replica attempts
#[derive(Debug, Clone)]
pub struct RequestExecutor {
    http: reqwest::Client,
    cancel_timeout: Duration,
}

impl RequestExecutor {
    pub fn new(cancel_timeout: Duration) -> crate::Result<Self> {
        let http = reqwest::Client::builder()
            .no_proxy()
            .tcp_nodelay(true)
            .pool_max_idle_per_host(64)
            .build()
            .map_err(|e| crate::Error::Internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            cancel_timeout,
        })
    }

    /// `{replica}?query={query}`, percent-encoded
    pub fn query_url(replica: &ReplicaAddress, query: &str) -> Result<Url, TransportError> {
        let mut url = Url::parse(replica.as_str()).map_err(|e| TransportError::InvalidAddress {
            address: replica.to_string(),
            reason: e.to_string(),
        })?;
        url.query_pairs_mut().append_pair("query", query);
        Ok(url)
    }

    /// Send `query` to `replica` and wait at most `budget` for the full reply.
    pub async fn attempt(
        &self,
        replica: &ReplicaAddress,
        query: &str,
        id: &CorrelationId,
        budget: Duration,
    ) -> AttemptOutcome {
        let started = Instant::now();
        tracing::debug!(%replica, request_id = %id, ?budget, "Sending attempt");

        let result = tokio::time::timeout(budget, self.fetch(replica, query, id)).await;
        let elapsed = started.elapsed();

        match result {
            Ok(Ok(value)) => {
                tracing::debug!(%replica, request_id = %id, ?elapsed, "Attempt succeeded");
                AttemptOutcome {
                    status: AttemptStatus::Succeeded,
                    value,
                    elapsed,
                }
            }
            Ok(Err(e)) => {
                tracing::debug!(%replica, request_id = %id, ?elapsed, error = %e, "Attempt failed");
                AttemptOutcome::failed(elapsed)
            }
            Err(_) => {
                tracing::debug!(%replica, request_id = %id, ?elapsed, "Attempt timed out");
                AttemptOutcome {
                    status: AttemptStatus::TimedOut,
                    value: String::new(),
                    elapsed,
                }
            }
        }
    }

    async fn fetch(
        &self,
        replica: &ReplicaAddress,
        query: &str,
        id: &CorrelationId,
    ) -> Result<String, TransportError> {
        let url = Self::query_url(replica, query)?;
        let response = self
            .http
            .get(url)
            .header(CORRELATION_ID_HEADER, id.as_str())
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(TransportError::UnexpectedStatus(status));
        }
        Ok(response.text().await?)
    }

    /// Ask `replica` to drop the work for `id`. Not awaited; failures are logged.
    pub fn cancel(&self, replica: &ReplicaAddress, id: &CorrelationId) {
        let executor = self.clone();
        let replica = replica.clone();
        let id = id.clone();
        tokio::spawn(async move {
            if let Err(e) = executor.send_cancel(&replica, &id).await {
                tracing::debug!(%replica, request_id = %id, error = %e, "Cancel call failed");
            }
        });
    }

    /// The cancel call itself, awaitable
    pub async fn send_cancel(
        &self,
        replica: &ReplicaAddress,
        id: &CorrelationId,
    ) -> Result<(), TransportError> {
        let url = Url::parse(replica.as_str()).map_err(|e| TransportError::InvalidAddress {
            address: replica.to_string(),
            reason: e.to_string(),
        })?;
        let response = self
            .http
            .get(url)
            .header(CORRELATION_ID_HEADER, id.as_str())
            .header(CANCEL_HEADER, "true")
            .timeout(self.cancel_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TransportError::UnexpectedStatus(response.status()));
        }
        tracing::debug!(%replica, request_id = %id, "Cancel delivered");
        Ok(())
    }
}
