//! Metrics collection and exposition.
//!
//! # Metrics
//! - `balancer_selections_total` (counter): successful selections by instance
//! - `balancer_selection_failures_total` (counter): failed selections by reason
//! - `balancer_request_outcomes_total` (counter): reported outcomes by instance, outcome
//! - `balancer_circuit_transitions_total` (counter): breaker transitions by instance, target state
//! - `balancer_instance_healthy` (gauge): 1=healthy, 0=unhealthy
//! - `balancer_health_probe_duration_seconds` (histogram): probe latency by instance

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::resilience::CircuitState;

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_selection(instance_id: &str) {
    counter!("balancer_selections_total", "instance" => instance_id.to_string()).increment(1);
}

pub fn record_selection_failure(reason: &'static str) {
    counter!("balancer_selection_failures_total", "reason" => reason).increment(1);
}

pub fn record_outcome(instance_id: &str, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!(
        "balancer_request_outcomes_total",
        "instance" => instance_id.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_circuit_transition(instance_id: &str, to: CircuitState) {
    counter!(
        "balancer_circuit_transitions_total",
        "instance" => instance_id.to_string(),
        "to" => to.as_str()
    )
    .increment(1);
}

pub fn record_instance_health(instance_id: &str, healthy: bool) {
    gauge!("balancer_instance_healthy", "instance" => instance_id.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_probe_duration(instance_id: &str, duration: Duration) {
    histogram!(
        "balancer_health_probe_duration_seconds",
        "instance" => instance_id.to_string()
    )
    .record(duration.as_secs_f64());
}
