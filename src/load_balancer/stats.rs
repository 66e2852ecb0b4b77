//! Introspection snapshots.

use serde::Serialize;

use crate::load_balancer::Strategy;
use crate::resilience::CircuitState;

/// Per-instance view returned by `LoadBalancer::get_stats`.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceStats {
    pub id: String,
    pub url: String,
    pub healthy: bool,
    pub failure_count: u32,
    pub state: CircuitState,
    pub active_connections: usize,
    /// Unix epoch milliseconds of the most recent failure.
    pub last_failure_ms: Option<u64>,
}

/// Aggregate balancer view.
#[derive(Debug, Clone, Serialize)]
pub struct BalancerStats {
    pub strategy: Strategy,
    pub total_instances: usize,
    pub healthy_instances: usize,
    pub round_robin_index: usize,
    pub instances: Vec<InstanceStats>,
}
