//! Metrics collection and exposition.
//!
//! # Metrics
//! - `fasty_requests_total` (counter): requests by method and status
//! - `fasty_request_duration_seconds` (histogram): latency distribution
//! - `fasty_dispatch_total` (counter): routed requests by middleware group
//! - `fasty_route_miss_total` (counter): requests answered by not-found
//! - `fasty_rate_limited_total` (counter): requests rejected with 429
//! - `fasty_evictions_total` (counter): expired sessions and rate-limit
//!   buckets removed by the sweeper
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder the calls do nothing
//! - Prometheus exporter serves its own HTTP listener

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one completed request.
pub fn record_request(method: &str, status: u16, start: Instant) {
    let status = status.to_string();
    counter!(
        "fasty_requests_total",
        "method" => method.to_string(),
        "status" => status.clone()
    )
    .increment(1);
    histogram!(
        "fasty_request_duration_seconds",
        "method" => method.to_string(),
        "status" => status
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_dispatch(group: &'static str) {
    counter!("fasty_dispatch_total", "group" => group).increment(1);
}

pub fn record_route_miss() {
    counter!("fasty_route_miss_total").increment(1);
}

pub fn record_rate_limited() {
    counter!("fasty_rate_limited_total").increment(1);
}

pub fn record_evictions(kind: &'static str, count: usize) {
    counter!("fasty_evictions_total", "kind" => kind).increment(count as u64);
}
