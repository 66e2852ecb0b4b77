//! Instance registry, selection, and circuit breaker bookkeeping.
//!
//! # Responsibilities
//! - Register and deregister instances
//! - Compute the eligible set and apply the configured strategy
//! - Fold request outcomes and probe results into each instance's breaker
//! - Expose stats for the admin API
//! - Own the background health checker

use std::collections::HashSet;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use crate::config::{BalancerConfig, HealthCheckConfig, InstanceConfig};
use crate::health::{HealthCheckError, HealthCheckResult, HealthChecker};
use crate::load_balancer::{
    BalancerStats, LoadBalancerError, Selector, ServiceInstance, Strategy,
};
use crate::observability::metrics;
use crate::resilience::CircuitState;

/// Changes applied by [`LoadBalancer::reconcile`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub added: usize,
    pub removed: usize,
    /// Surviving ids whose endpoint or settings changed.
    pub updated: usize,
}

impl ReconcileSummary {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Client-side load balancer with per-instance circuit breaking.
#[derive(Debug)]
pub struct LoadBalancer {
    /// Ordered registry. Order only matters for round-robin fairness.
    instances: RwLock<Vec<Arc<ServiceInstance>>>,
    strategy: Strategy,
    selector: Box<dyn Selector>,

    /// Failures needed to open a closed circuit.
    max_failures: u32,
    /// Reserved; carried for callers that want a balancer-wide default.
    timeout: Duration,
    /// Open → HalfOpen dwell time.
    recovery_timeout: Duration,

    health_config: HealthCheckConfig,
    health_checker: Mutex<Option<Arc<HealthChecker>>>,
}

impl LoadBalancer {
    /// Create an empty balancer.
    pub fn new(
        strategy: Strategy,
        max_failures: u32,
        timeout: Duration,
        recovery_timeout: Duration,
    ) -> Self {
        Self {
            instances: RwLock::new(Vec::new()),
            strategy,
            selector: strategy.selector(),
            max_failures: max_failures.max(1),
            timeout,
            recovery_timeout,
            health_config: HealthCheckConfig::default(),
            health_checker: Mutex::new(None),
        }
    }

    /// Create a balancer and register every configured instance.
    pub fn from_config(config: &BalancerConfig) -> Self {
        let lb = Self::new(
            config.strategy,
            config.max_failures,
            config.timeout(),
            config.recovery_timeout(),
        );
        for instance in &config.instances {
            lb.add_configured(instance);
        }
        lb
    }

    /// Settings used when the health checker is first created.
    pub fn with_health_check(mut self, config: HealthCheckConfig) -> Self {
        self.health_config = config;
        self
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn max_failures(&self) -> u32 {
        self.max_failures
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn recovery_timeout(&self) -> Duration {
        self.recovery_timeout
    }

    fn read_instances(&self) -> RwLockReadGuard<'_, Vec<Arc<ServiceInstance>>> {
        self.instances.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_instances(&self) -> RwLockWriteGuard<'_, Vec<Arc<ServiceInstance>>> {
        self.instances.write().unwrap_or_else(|e| e.into_inner())
    }

    // --- Registry ---

    /// Register a new instance in the closed, healthy state.
    ///
    /// Ids are not deduplicated here. Lookups and removal act on the first
    /// instance registered under an id.
    pub fn add_instance(
        &self,
        id: impl Into<String>,
        url: impl Into<String>,
        health_url: impl Into<String>,
        weight: u32,
        timeout: Duration,
    ) {
        let instance = Arc::new(ServiceInstance::new(id, url, health_url, weight, timeout));
        let mut instances = self.write_instances();
        if instances.iter().any(|i| i.id == instance.id) {
            tracing::warn!(instance_id = %instance.id, "Duplicate instance id registered");
        }
        tracing::info!(instance_id = %instance.id, url = %instance.url, "Instance added");
        metrics::record_instance_health(&instance.id, true);
        instances.push(instance);
    }

    fn add_configured(&self, config: &InstanceConfig) {
        self.add_instance(
            config.id.clone(),
            config.url.clone(),
            config.health_url.clone(),
            config.weight,
            config.timeout(),
        );
    }

    /// Deregister the first instance with `id`. Unknown ids are ignored.
    pub fn remove_instance(&self, id: &str) {
        let mut instances = self.write_instances();
        if let Some(pos) = instances.iter().position(|i| i.id == id) {
            instances.remove(pos);
            tracing::info!(instance_id = %id, "Instance removed");
        }
    }

    /// Bring the registry in line with a new instance list.
    ///
    /// Instances whose id disappeared are removed and unseen ids are added.
    /// A surviving id whose url, health url, weight or timeout changed is
    /// replaced in place by a fresh closed instance. Unchanged instances keep
    /// their breaker state and connection counts.
    pub fn reconcile(&self, configs: &[InstanceConfig]) -> ReconcileSummary {
        let wanted: HashSet<&str> = configs.iter().map(|c| c.id.as_str()).collect();
        let mut summary = ReconcileSummary::default();

        {
            let mut instances = self.write_instances();
            let before = instances.len();
            instances.retain(|i| wanted.contains(i.id.as_str()));
            summary.removed = before - instances.len();

            for config in configs {
                match instances.iter().position(|i| i.id == config.id) {
                    Some(pos) if matches_config(&instances[pos], config) => {}
                    Some(pos) => {
                        tracing::info!(
                            instance_id = %config.id,
                            old_url = %instances[pos].url,
                            new_url = %config.url,
                            health_url = %config.health_url,
                            "Instance settings changed, replacing"
                        );
                        instances[pos] = Arc::new(instance_from_config(config));
                        summary.updated += 1;
                    }
                    None => {
                        instances.push(Arc::new(instance_from_config(config)));
                        summary.added += 1;
                    }
                }
            }
        }

        if !summary.is_empty() {
            tracing::info!(
                added = summary.added,
                removed = summary.removed,
                updated = summary.updated,
                "Instance registry reconciled"
            );
        }
        summary
    }

    /// Snapshot of the registry (for health checking).
    pub fn instances(&self) -> Vec<Arc<ServiceInstance>> {
        self.read_instances().clone()
    }

    /// First instance registered under `id`.
    pub fn find_instance(&self, id: &str) -> Option<Arc<ServiceInstance>> {
        self.read_instances().iter().find(|i| i.id == id).cloned()
    }

    // --- Selection ---

    /// Select an instance for the next request.
    ///
    /// Open circuits whose recovery timeout has elapsed are moved to
    /// half-open and admitted as part of this call.
    pub fn get_healthy_instance(&self) -> Result<Arc<ServiceInstance>, LoadBalancerError> {
        let result = self.select_eligible();
        match &result {
            Ok(instance) => metrics::record_selection(&instance.id),
            Err(e) => {
                tracing::debug!(reason = %e, "No instance selectable");
                metrics::record_selection_failure(e.reason());
            }
        }
        result
    }

    /// Alias for [`LoadBalancer::get_healthy_instance`].
    pub fn select_instance(&self) -> Result<Arc<ServiceInstance>, LoadBalancerError> {
        self.get_healthy_instance()
    }

    fn select_eligible(&self) -> Result<Arc<ServiceInstance>, LoadBalancerError> {
        let instances = self.read_instances();
        if instances.is_empty() {
            return Err(LoadBalancerError::NoInstancesRegistered);
        }

        let now = Instant::now();
        let eligible: Vec<Arc<ServiceInstance>> = instances
            .iter()
            .filter(|instance| {
                let admission = instance.breaker().admit(self.recovery_timeout, now);
                if let Some(t) = admission.transition {
                    instance.note_transition(t);
                }
                admission.eligible
            })
            .cloned()
            .collect();
        drop(instances);

        self.selector
            .next_instance(&eligible)
            .ok_or(LoadBalancerError::NoHealthyInstancesAvailable)
    }

    // --- Outcome recording ---

    /// Mark a request as in flight on `instance`. Call right after selection.
    pub fn increment_connections(&self, instance: &ServiceInstance) {
        instance.inc_connections();
    }

    /// The request dispatched to `instance` succeeded.
    pub fn record_success(&self, instance: &ServiceInstance) {
        let transition = instance.breaker().record_success();
        instance.dec_connections();
        if let Some(t) = transition {
            instance.note_transition(t);
        }
        metrics::record_outcome(&instance.id, true);
    }

    /// The request dispatched to `instance` failed.
    pub fn record_failure(&self, instance: &ServiceInstance) {
        let (transition, failures) = {
            let mut breaker = instance.breaker();
            let t = breaker.record_failure(self.max_failures, Instant::now());
            (t, breaker.failure_count())
        };
        instance.dec_connections();
        tracing::debug!(instance_id = %instance.id, failures, "Request failure recorded");
        if let Some(t) = transition {
            instance.note_transition(t);
        }
        metrics::record_outcome(&instance.id, false);
    }

    /// Report an outcome by id. Unknown ids are ignored so callers can
    /// report fire-and-forget.
    pub fn record_result(&self, instance_id: &str, success: bool, duration: Duration) {
        let Some(instance) = self.find_instance(instance_id) else {
            tracing::debug!(instance_id = %instance_id, "Result for unknown instance ignored");
            return;
        };
        tracing::trace!(instance_id = %instance_id, success, elapsed = ?duration, "Recording result");
        if success {
            self.record_success(&instance);
        } else {
            self.record_failure(&instance);
        }
    }

    /// Fold one probe result into its instance's breaker. Does not touch
    /// the active connection count.
    pub(crate) fn apply_health_result(&self, instance: &ServiceInstance, result: &HealthCheckResult) {
        let outcome = instance
            .breaker()
            .apply_probe(result.healthy, self.max_failures, Instant::now());

        match outcome.health_changed {
            Some(true) => tracing::info!(
                instance_id = %instance.id,
                status = ?result.status,
                "Instance became healthy"
            ),
            Some(false) => tracing::warn!(
                instance_id = %instance.id,
                status = ?result.status,
                error = result.error.as_deref().unwrap_or("-"),
                "Instance became unhealthy"
            ),
            None => {}
        }
        if let Some(t) = outcome.transition {
            instance.note_transition(t);
        }
        metrics::record_instance_health(&instance.id, instance.is_healthy());
    }

    // --- Introspection ---

    /// Breaker state of `instance_id`; unknown ids report `Closed`.
    pub fn get_circuit_breaker_state(&self, instance_id: &str) -> CircuitState {
        self.find_instance(instance_id)
            .map(|i| i.state())
            .unwrap_or_default()
    }

    /// Instances a selection attempt would consider right now.
    pub fn get_available_instance_count(&self) -> usize {
        let now = Instant::now();
        self.read_instances()
            .iter()
            .filter(|i| i.breaker().would_admit(self.recovery_timeout, now))
            .count()
    }

    pub fn get_stats(&self) -> BalancerStats {
        let instances: Vec<_> = self.read_instances().iter().map(|i| i.snapshot()).collect();
        BalancerStats {
            strategy: self.strategy,
            total_instances: instances.len(),
            healthy_instances: instances.iter().filter(|i| i.healthy).count(),
            round_robin_index: self.selector.cursor(),
            instances,
        }
    }

    // --- Health checking ---

    /// The balancer's health checker, created on first use.
    pub fn health_checker(self: &Arc<Self>) -> Result<Arc<HealthChecker>, HealthCheckError> {
        let mut slot = self.health_checker.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(checker) = slot.as_ref() {
            return Ok(checker.clone());
        }
        let checker = Arc::new(HealthChecker::new(self, &self.health_config)?);
        *slot = Some(checker.clone());
        Ok(checker)
    }

    /// Start background health checking. Idempotent.
    pub fn start_health_checking(self: &Arc<Self>) -> Result<(), HealthCheckError> {
        self.health_checker()?.start();
        Ok(())
    }

    /// Stop background health checking and wait for the loop to exit.
    pub async fn stop_health_checking(&self) {
        let checker = self
            .health_checker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(checker) = checker {
            checker.stop().await;
        }
    }
}

fn instance_from_config(config: &InstanceConfig) -> ServiceInstance {
    ServiceInstance::new(
        config.id.clone(),
        config.url.clone(),
        config.health_url.clone(),
        config.weight,
        config.timeout(),
    )
}

fn matches_config(instance: &ServiceInstance, config: &InstanceConfig) -> bool {
    instance.url == config.url
        && instance.health_url == config.health_url
        && instance.weight == config.weight
        && instance.timeout == config.timeout()
}
