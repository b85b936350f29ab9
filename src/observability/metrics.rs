//! Metrics collection and exposition.
//!
//! # Metrics
//! - `palette_http_requests_total` (counter): requests by method, route, status
//! - `palette_http_request_duration_seconds` (histogram): latency distribution,
//!   hanging reads included
//! - `palette_writes_total` (counter): write attempts by outcome
//!   (`accepted`, `rejected`, `storage_error`)
//! - `palette_waits_total` (counter): reads through the coordinator by outcome
//!   (`immediate`, `changed`, `timeout`)
//! - `palette_wait_duration_seconds` (histogram): time spent armed
//! - `palette_pending_waiters` (gauge): currently armed waiters
//! - `palette_config_version` (gauge): version of the current palette
//!
//! Without an installed recorder every call is a no-op, so tests and
//! embedders need no setup.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::MatchedPath,
    http::Request,
    middleware::Next,
    response::Response,
};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::palette::model::Version;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a completed HTTP request.
pub fn record_request(method: &str, route: &str, status: u16, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("route", route.to_string()),
        ("status", status.to_string()),
    ];
    counter!("palette_http_requests_total", &labels).increment(1);
    histogram!("palette_http_request_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_write(outcome: &'static str) {
    counter!("palette_writes_total", "outcome" => outcome).increment(1);
}

pub fn record_wait(outcome: &'static str, armed_for: Duration) {
    counter!("palette_waits_total", "outcome" => outcome).increment(1);
    if outcome != "immediate" {
        histogram!("palette_wait_duration_seconds").record(armed_for.as_secs_f64());
    }
}

pub fn set_pending_waiters(count: usize) {
    gauge!("palette_pending_waiters").set(count as f64);
}

pub fn set_config_version(version: Version) {
    gauge!("palette_config_version").set(version.as_u64() as f64);
}

/// Axum middleware recording request count and latency per matched route.
pub async fn track_requests(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;
    record_request(&method, &route, response.status().as_u16(), start);
    response
}
