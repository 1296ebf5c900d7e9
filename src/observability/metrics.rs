//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define connector metrics (packets, requests, connections, watchdog)
//! - Expose a Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `ajp_packets_total` (counter): packets read, by kind
//! - `ajp_invalid_sequences_total` (counter): connections dropped on bad magic
//! - `ajp_truncated_payloads_total` (counter): zero-padded short payloads
//! - `ajp_requests_total` (counter): forwarded requests by method, status
//! - `ajp_request_duration_seconds` (histogram): handler latency
//! - `ajp_active_connections` (gauge): registered connections
//! - `ajp_watchdog_waiting` / `_processing` / `_exceeded` (gauges): last sample
//! - `ajp_watchdog_deadlocks_total` (counter): deadlock verdicts
//! - `ajp_connector_restarts_total` (counter): completed restarts
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so tests and
//!   `metrics_enabled = false` pay only for the macro call

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and serve it on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_packet(kind: &'static str) {
    counter!("ajp_packets_total", "kind" => kind).increment(1);
}

pub fn record_invalid_sequence() {
    counter!("ajp_invalid_sequences_total").increment(1);
}

pub fn record_truncated_payload() {
    counter!("ajp_truncated_payloads_total").increment(1);
}

/// Record one completed request cycle.
pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "ajp_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("ajp_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_active_connections(count: usize) {
    gauge!("ajp_active_connections").set(count as f64);
}

pub fn record_watchdog_sample(waiting: usize, processing: usize, exceeded: usize) {
    gauge!("ajp_watchdog_waiting").set(waiting as f64);
    gauge!("ajp_watchdog_processing").set(processing as f64);
    gauge!("ajp_watchdog_exceeded").set(exceeded as f64);
}

pub fn record_deadlock() {
    counter!("ajp_watchdog_deadlocks_total").increment(1);
}

pub fn record_restart() {
    counter!("ajp_connector_restarts_total").increment(1);
}
