//! HTTP surface of a replica
//!
//! The query method answers `GET /{method}/?query=...` with the digest of the
//! query after a simulated processing delay. In async mode a call carrying
//! `X-Cancel: true` instead marks the correlated request cancelled, and a
//! cancelled request gets an empty 204 instead of its digest.

use crate::common::tracing_middleware::{
    correlation_id, generate_correlation_id, is_cancel, request_tracing_middleware,
};
use crate::common::{QueryHasher, ReplicaMetrics, ServerMode};
use crate::replica::registry::{AcceptOutcome, CancelOutcome, Delivery, RequestRegistry};
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, MethodRouter},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::limit::GlobalConcurrencyLimitLayer;

/// Shared state for the replica handlers
#[derive(Clone)]
pub struct ReplicaState {
    pub registry: Arc<RequestRegistry>,
    pub metrics: Arc<ReplicaMetrics>,
    pub hasher: Arc<QueryHasher>,
    pub method_duration: Duration,
    pub mode: ServerMode,
}

#[derive(Debug, Deserialize)]
pub struct QueryParams {
    pub query: Option<String>,
}

/// Build the router. `method_path` is the mount point, e.g. `/some_method/`;
/// the same handler also answers without the trailing slash.
pub fn create_router(state: ReplicaState, method_path: &str) -> Router {
    let method: MethodRouter<ReplicaState> = match state.mode {
        ServerMode::Async => get(query_async),
        // One request at a time, the rest queue in front of the handler
        ServerMode::Sync => get(query_sync).layer(GlobalConcurrencyLimitLayer::new(1)),
    };

    let bare = method_path.trim_end_matches('/');
    let mut router = Router::new().route(method_path, method.clone());
    if !bare.is_empty() && bare != method_path {
        router = router.route(bare, method);
    }

    router
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(axum::middleware::from_fn(request_tracing_middleware))
        .with_state(state)
}

async fn query_async(
    State(state): State<ReplicaState>,
    headers: HeaderMap,
    Query(params): Query<QueryParams>,
) -> Response {
    let supplied = correlation_id(&headers);
    if is_cancel(&headers) {
        return match supplied {
            Some(request_id) => cancel(&state, &request_id),
            None => {
                tracing::warn!("Cancel without a correlation id ignored");
                StatusCode::ACCEPTED.into_response()
            }
        };
    }

    let request_id = supplied.unwrap_or_else(|| {
        let generated = generate_correlation_id();
        tracing::debug!(request_id = %generated, "No correlation id, generated one");
        generated
    });

    let query = params.query.unwrap_or_default();
    let n = state.metrics.requests_received.inc();
    tracing::info!(request_id = %request_id, "Received request #{}", n);
    if state.registry.accept(&request_id) == AcceptOutcome::AlreadyCancelled {
        state.metrics.early_cancels.inc();
    }

    // The worker owns the request from here on, so it completes and clears
    // its registry entry even if the caller hangs up.
    let worker = {
        let state = state.clone();
        let request_id = request_id.clone();
        tokio::spawn(async move {
            let started = Instant::now();
            tokio::time::sleep(state.method_duration).await;
            let digest = state.hasher.digest(&query);
            state.metrics.processing_time.observe(started.elapsed());
            (state.registry.finish(&request_id), digest)
        })
    };

    match worker.await {
        Ok((Delivery::Deliver, digest)) => {
            tracing::info!(request_id = %request_id, "Delivering response #{}", n);
            state.metrics.responses_delivered.inc();
            (StatusCode::OK, digest).into_response()
        }
        Ok((Delivery::Suppress, _)) => {
            tracing::info!(request_id = %request_id, "Request cancelled, suppressing response");
            state.metrics.responses_suppressed.inc();
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Worker task failed");
            state.registry.finish(&request_id);
            StatusCode::NO_CONTENT.into_response()
        }
    }
}

fn cancel(state: &ReplicaState, request_id: &str) -> Response {
    state.metrics.cancels_received.inc();
    match state.registry.cancel(request_id) {
        CancelOutcome::Cancelled => {
            tracing::info!(request_id = %request_id, "Cancelled in-flight request");
        }
        CancelOutcome::Remembered => {
            tracing::debug!(request_id = %request_id, "Cancel remembered for a later request");
        }
        CancelOutcome::AlreadyFinished => {
            tracing::debug!(request_id = %request_id, "Cancel for finished request ignored");
        }
    }
    StatusCode::ACCEPTED.into_response()
}

/// Sync mode ignores correlation and cancel headers and always answers.
async fn query_sync(
    State(state): State<ReplicaState>,
    Query(params): Query<QueryParams>,
) -> Response {
    let n = state.metrics.requests_received.inc();
    tracing::info!("Received request #{}", n);
    let query = params.query.unwrap_or_default();
    let duration = state.method_duration;
    let hasher = state.hasher.clone();

    let work = tokio::task::spawn_blocking(move || {
        let started = Instant::now();
        std::thread::sleep(duration);
        (hasher.digest(&query), started.elapsed())
    });

    match work.await {
        Ok((digest, elapsed)) => {
            state.metrics.processing_time.observe(elapsed);
            state.metrics.responses_delivered.inc();
            (StatusCode::OK, digest).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Blocking worker failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn health(State(state): State<ReplicaState>) -> impl IntoResponse {
    axum::Json(json!({
        "status": "healthy",
        "mode": state.mode.to_string(),
        "in_flight": state.registry.in_flight_count(),
        "version": crate::VERSION,
    }))
}

async fn metrics(State(state): State<ReplicaState>) -> impl IntoResponse {
    state
        .metrics
        .to_prometheus(state.registry.in_flight_count())
}
