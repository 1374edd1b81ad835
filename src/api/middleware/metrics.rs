//! HTTP Metrics Middleware

use axum::{
    body::Body,
    extract::MatchedPath,
    http::Request,
    middleware::Next,
    response::Response,
};
use std::time::Instant;

use crate::metrics;

/// Times every request and feeds the count/latency metrics, labelled by the
/// matched route template (falling back to the raw path for 404s and the like)
pub async fn track_http(request: Request<Body>, next: Next) -> Response {
    let method = request.method().to_string();
    let route = match request.extensions().get::<MatchedPath>() {
        Some(matched) => matched.as_str().to_string(),
        None => request.uri().path().to_string(),
    };

    let started = Instant::now();
    let response = next.run(request).await;

    metrics::record_http_request(
        &method,
        &route,
        response.status().as_u16(),
        started.elapsed().as_secs_f64(),
    );

    response
}
