//! Request logging middleware.
//!
//! One line per HTTP request with method, path, query, status and latency.

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{error, info, warn};

pub async fn request_logging(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let query = request.uri().query().unwrap_or_default().to_string();

    // Load balancer probes would drown everything else
    if path == "/health" {
        return next.run(request).await;
    }

    let start = Instant::now();
    let response = next.run(request).await;
    let latency_ms = start.elapsed().as_millis() as u64;
    let status = response.status().as_u16();

    if status >= 500 {
        error!(%method, %path, %query, status, latency_ms, "Request failed (5xx)");
    } else if status >= 400 {
        warn!(%method, %path, %query, status, latency_ms, "Request rejected (4xx)");
    } else {
        info!(%method, %path, status, latency_ms, "Request completed");
    }

    response
}
