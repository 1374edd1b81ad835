//! API Middleware
//!
//! Contains middleware for:
//! - HTTP metrics recording

pub mod metrics;

pub use metrics::track_http;
