//! Metrics collection and exposition.
//!
//! # Metrics
//! - `donations_initiated_total` (counter): initiations by result
//! - `reconcile_outcomes_total` (counter): reconciliations by outcome
//! - `gateway_requests_total` (counter): provider calls by operation, result
//! - `gateway_request_duration_seconds` (histogram): provider latency
//! - `scheduler_sweep_duration_seconds` (histogram): sweep latency
//! - `transactions_flagged_total` (counter): review flags by reason
//! - `pending_changes_total` (counter): router decisions by route
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Labels are closed vocabularies, never references or actor ids

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on its own listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_initiation(result: &'static str) {
    counter!("donations_initiated_total", "result" => result).increment(1);
}

pub fn record_reconcile(outcome: &'static str) {
    counter!("reconcile_outcomes_total", "outcome" => outcome).increment(1);
}

pub fn record_gateway_request(operation: &'static str, result: &'static str, start: Instant) {
    counter!("gateway_requests_total", "operation" => operation, "result" => result).increment(1);
    histogram!("gateway_request_duration_seconds", "operation" => operation)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_sweep(start: Instant) {
    histogram!("scheduler_sweep_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_flagged(reason: &'static str) {
    counter!("transactions_flagged_total", "reason" => reason).increment(1);
}

pub fn record_orphan(event: &'static str) {
    counter!("orphaned_initiations_total", "event" => event).increment(1);
}

pub fn record_change_route(route: &'static str) {
    counter!("pending_changes_total", "route" => route).increment(1);
}
