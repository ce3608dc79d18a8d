//! Request tracing middleware for the replica HTTP surface
//!
//! Every inbound call is wrapped in a span carrying its correlation id and
//! cancel marker, with start/finish events timed around the handler.

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{HeaderMap, Request, Response},
    middleware::Next,
};
use std::net::SocketAddr;
use std::time::Instant;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

/// Header carrying the attempt-scoped correlation id
pub const CORRELATION_ID_HEADER: &str = "X-Request-ID";

/// Header marking a call as a cancel signal
pub const CANCEL_HEADER: &str = "X-Cancel";

/// Generate a new unique correlation id
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Correlation id sent by the caller, if any
pub fn correlation_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Does the call carry `X-Cancel: true`?
pub fn is_cancel(headers: &HeaderMap) -> bool {
    headers
        .get(CANCEL_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Middleware that wraps each request in a span and logs its outcome
pub async fn request_tracing_middleware(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let start = Instant::now();

    let request_id = correlation_id(request.headers()).unwrap_or_else(|| "-".to_string());
    let cancel = is_cancel(request.headers());
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let span = tracing::info_span!(
        "replica_request",
        request_id = %request_id,
        cancel,
        method = %method,
        path = %path,
        client_ip = %addr.ip(),
    );

    async move {
        info!("Request started");

        let response = next.run(request).await;

        let status = response.status();
        let duration_ms = start.elapsed().as_millis() as u64;
        if status.is_success() {
            info!(status = status.as_u16(), duration_ms, "Request completed");
        } else {
            warn!(status = status.as_u16(), duration_ms, "Request failed");
        }

        response
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_generate_correlation_id() {
        let id1 = generate_correlation_id();
        let id2 = generate_correlation_id();

        assert!(Uuid::parse_str(&id1).is_ok());
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_header_helpers() {
        let mut headers = HeaderMap::new();
        assert_eq!(correlation_id(&headers), None);
        assert!(!is_cancel(&headers));

        headers.insert(CORRELATION_ID_HEADER, HeaderValue::from_static("abc-1"));
        headers.insert(CANCEL_HEADER, HeaderValue::from_static("TRUE"));
        assert_eq!(correlation_id(&headers).as_deref(), Some("abc-1"));
        assert!(is_cancel(&headers));

        headers.insert(CANCEL_HEADER, HeaderValue::from_static("false"));
        assert!(!is_cancel(&headers));

        headers.insert(CORRELATION_ID_HEADER, HeaderValue::from_static("   "));
        assert_eq!(correlation_id(&headers), None);
    }
}
