//! Metrics collection and exposition.
//!
//! # Metrics
//! - `madigan_devices_connected` (gauge): live device sessions
//! - `madigan_frames_received_total` / `madigan_frames_sent_total` (counter)
//! - `madigan_protocol_errors_total` (counter): by reason
//! - `madigan_http_requests_total` (counter): by endpoint, status
//! - `madigan_query_cache_total` (counter): parameter query hit/miss

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_connected_devices(count: u64) {
    gauge!("madigan_devices_connected").set(count as f64);
}

pub fn record_frame_received() {
    counter!("madigan_frames_received_total").increment(1);
}

pub fn record_frame_sent() {
    counter!("madigan_frames_sent_total").increment(1);
}

pub fn record_protocol_error(reason: &'static str) {
    counter!("madigan_protocol_errors_total", "reason" => reason).increment(1);
}

pub fn record_http_request(endpoint: &'static str, status: u16) {
    counter!(
        "madigan_http_requests_total",
        "endpoint" => endpoint,
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_query_cache(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("madigan_query_cache_total", "result" => result).increment(1);
}
