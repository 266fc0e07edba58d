//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by outcome
//! - `gateway_cache_lookups_total` (counter): cache lookups by cache, result
//! - `gateway_upstream_duration_seconds` (histogram): upstream latency by status
//! - `gateway_hub_subscribers` (gauge): live log subscribers
//! - `gateway_hub_dropped_subscribers_total` (counter): slow consumers evicted
//! - `gateway_hub_dropped_events_total` (counter): events lost to a full hub queue
//!
//! # Design Decisions
//! - Labels are fixed, low-cardinality strings; never project ids
//! - Without an installed recorder every call is a no-op

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// One finished gateway request. `outcome` is `forwarded`, `forbidden`,
/// `not_found`, `internal_error` or `bad_gateway`.
pub fn record_request(outcome: &'static str) {
    counter!("gateway_requests_total", "outcome" => outcome).increment(1);
}

/// One cache lookup. `cache` is `project` or `rules`.
pub fn record_cache(cache: &'static str, hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("gateway_cache_lookups_total", "cache" => cache, "result" => result).increment(1);
}

/// One upstream exchange that started at `start`.
pub fn record_upstream(status: u16, start: Instant) {
    histogram!("gateway_upstream_duration_seconds", "status" => status.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_hub_subscribers(count: usize) {
    gauge!("gateway_hub_subscribers").set(count as f64);
}

pub fn record_dropped_subscriber() {
    counter!("gateway_hub_dropped_subscribers_total").increment(1);
}

pub fn record_dropped_event() {
    counter!("gateway_hub_dropped_events_total").increment(1);
}
