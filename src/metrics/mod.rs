//! Metrics Module
//!
//! Prometheus-compatible metrics for the matching engine and its transports:
//! - Matching engine metrics (orders, trades, match latency)
//! - API request metrics (latency, count, status)
//! - WebSocket metrics (connections, messages)

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

/// Metric name constants, shared by recorders and dashboards
pub mod names {
    // API Metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";

    // Matching Engine Metrics
    pub const ORDERS_SUBMITTED_TOTAL: &str = "orders_submitted_total";
    pub const ORDERS_CANCELLED_TOTAL: &str = "orders_cancelled_total";
    pub const ORDER_MATCH_DURATION_SECONDS: &str = "order_match_duration_seconds";
    pub const TRADES_EXECUTED_TOTAL: &str = "trades_executed_total";

    // WebSocket Metrics
    pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
    pub const WS_MESSAGES_SENT_TOTAL: &str = "ws_messages_sent_total";
}

/// Label key constants
pub mod labels {
    pub const METHOD: &str = "method";
    pub const ENDPOINT: &str = "endpoint";
    pub const STATUS: &str = "status";
    pub const ORDER_SIDE: &str = "side";
    pub const ORDER_TYPE: &str = "order_type";
    pub const SYMBOL: &str = "symbol";
}

/// Histogram buckets in seconds; matching is expected well under a millisecond,
/// HTTP latency spans a wider range
const MATCH_DURATION_BUCKETS: &[f64] = &[0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.5];
const HTTP_DURATION_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0];

/// Install the process-wide Prometheus recorder and hand back the handle
/// `/metrics` renders from
pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(names::HTTP_REQUEST_DURATION_SECONDS.to_string()),
            HTTP_DURATION_BUCKETS,
        )
        .and_then(|builder| {
            builder.set_buckets_for_metric(
                Matcher::Full(names::ORDER_MATCH_DURATION_SECONDS.to_string()),
                MATCH_DURATION_BUCKETS,
            )
        })
        .expect("static bucket configuration is valid")
        .install_recorder()
        .expect("a second metrics recorder was installed")
}

// ============================================================================
// HTTP Metrics
// ============================================================================

/// Count one finished request and record its latency, labelled by method,
/// matched route, and response status
pub fn record_http_request(method: &str, route: &str, status: u16, duration_secs: f64) {
    let request_labels = [
        (labels::METHOD, method.to_string()),
        (labels::ENDPOINT, route.to_string()),
        (labels::STATUS, status.to_string()),
    ];
    counter!(names::HTTP_REQUESTS_TOTAL, &request_labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &request_labels).record(duration_secs);
}

// ============================================================================
// Matching Engine Metrics
// ============================================================================

/// Count one accepted submission by side and order type
pub fn record_order_submitted(side: &str, order_type: &str) {
    let order_labels = [
        (labels::ORDER_SIDE, side.to_string()),
        (labels::ORDER_TYPE, order_type.to_string()),
    ];
    counter!(names::ORDERS_SUBMITTED_TOTAL, &order_labels).increment(1);
}

/// Count one successful cancellation
pub fn record_order_cancelled() {
    counter!(names::ORDERS_CANCELLED_TOTAL).increment(1);
}

/// Record how long one matching step held the book guard
pub fn record_match_duration(duration_secs: f64) {
    histogram!(names::ORDER_MATCH_DURATION_SECONDS).record(duration_secs);
}

/// Record trade executions for one submission
pub fn record_trades_executed(symbol: &str, count: u64) {
    counter!(
        names::TRADES_EXECUTED_TOTAL,
        labels::SYMBOL => symbol.to_string()
    )
    .increment(count);
}

// ============================================================================
// WebSocket Metrics
// ============================================================================

/// Track the active WebSocket connection gauge
pub fn set_ws_connections(count: i64) {
    gauge!(names::WS_CONNECTIONS_ACTIVE).set(count as f64);
}

/// Count one pushed WebSocket message
pub fn record_ws_message_sent() {
    counter!(names::WS_MESSAGES_SENT_TOTAL).increment(1);
}
