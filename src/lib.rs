//! spotmatch: a spot CLOB matching engine.
//!
//! The engine itself is a library ([`engine::MatchingEngine`]); the HTTP and
//! WebSocket surfaces in [`api`] and [`websocket`] are thin collaborators over
//! it, wired together by the server binary.

use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

pub mod api;
pub mod config;
pub mod engine;
pub mod metrics;
pub mod websocket;

use crate::config::AppConfig;
use crate::engine::MatchingEngine;

pub struct AppState {
    pub config: AppConfig,
    pub engine: Arc<MatchingEngine>,
    pub metrics_handle: PrometheusHandle,
}
