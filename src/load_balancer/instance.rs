//! Service instance abstraction.
//!
//! # Responsibilities
//! - Represent a single backend replica
//! - Track active connections (for Least Connections LB)
//! - Own the instance's circuit breaker behind its own lock

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::load_balancer::stats::InstanceStats;
use crate::observability::metrics;
use crate::resilience::{Breaker, CircuitState, Transition};

/// A single backend replica.
#[derive(Debug)]
pub struct ServiceInstance {
    /// Identifier, expected to be unique within a balancer.
    pub id: String,
    /// Dispatch target.
    pub url: String,
    /// Probe target for active health checks.
    pub health_url: String,
    /// Accepted for configuration compatibility; no strategy reads it.
    pub weight: u32,
    /// Per-instance request timeout hint for the caller's transport.
    pub timeout: Duration,

    breaker: Mutex<Breaker>,
    /// Number of requests dispatched but not yet reported back.
    active_connections: AtomicUsize,
}

impl ServiceInstance {
    /// Create a closed, healthy instance with zero counters.
    pub fn new(
        id: impl Into<String>,
        url: impl Into<String>,
        health_url: impl Into<String>,
        weight: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            health_url: health_url.into(),
            weight,
            timeout,
            breaker: Mutex::new(Breaker::new()),
            active_connections: AtomicUsize::new(0),
        }
    }

    /// Lock the breaker. Poisoning is ignored: breaker updates never leave
    /// the state half-written.
    pub(crate) fn breaker(&self) -> MutexGuard<'_, Breaker> {
        self.breaker.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> CircuitState {
        self.breaker().state()
    }

    pub fn is_healthy(&self) -> bool {
        self.breaker().is_healthy()
    }

    pub fn failure_count(&self) -> u32 {
        self.breaker().failure_count()
    }

    pub fn last_failure_at(&self) -> Option<SystemTime> {
        self.breaker().last_failure_at()
    }

    /// Get the current number of active connections.
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Increment active connection count.
    pub fn inc_connections(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrement active connection count, never going below zero.
    pub fn dec_connections(&self) {
        let _ = self
            .active_connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| Some(n.saturating_sub(1)));
    }

    /// Log and count a circuit transition on this instance.
    pub(crate) fn note_transition(&self, transition: Transition) {
        match transition.to {
            CircuitState::Open => tracing::warn!(
                instance_id = %self.id,
                from = %transition.from,
                "Circuit opened"
            ),
            CircuitState::HalfOpen => tracing::info!(
                instance_id = %self.id,
                "Circuit half-open, admitting trial traffic"
            ),
            CircuitState::Closed => tracing::info!(
                instance_id = %self.id,
                from = %transition.from,
                "Circuit closed"
            ),
        }
        metrics::record_circuit_transition(&self.id, transition.to);
        metrics::record_instance_health(&self.id, self.is_healthy());
    }

    /// Point-in-time view of this instance for stats endpoints.
    pub fn snapshot(&self) -> InstanceStats {
        let breaker = self.breaker();
        InstanceStats {
            id: self.id.clone(),
            url: self.url.clone(),
            healthy: breaker.is_healthy(),
            failure_count: breaker.failure_count(),
            state: breaker.state(),
            active_connections: self.active_connections(),
            last_failure_ms: breaker
                .last_failure_at()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
        }
    }
}
