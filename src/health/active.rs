//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every registered instance concurrently
//! - Feed results back into the circuit breakers
//! - Start/stop lifecycle with graceful, bounded shutdown

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time;

use crate::config::HealthCheckConfig;
use crate::health::probe::{HealthCheckError, Prober};
use crate::load_balancer::LoadBalancer;
use crate::observability::metrics;
use crate::resilience::CircuitState;

/// Lower bound on the pause between probe rounds.
pub const MIN_CHECK_INTERVAL: Duration = Duration::from_millis(10);

/// Per-instance health detail for dashboards.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceHealth {
    pub id: String,
    pub health_url: String,
    pub healthy: bool,
    pub failure_count: u32,
    pub state: CircuitState,
}

/// Snapshot of the checker's run state.
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckStats {
    pub interval_ms: u64,
    pub timeout_ms: u64,
    pub running: bool,
    pub instances: Vec<InstanceHealth>,
}

#[derive(Debug)]
struct CheckerInner {
    balancer: Weak<LoadBalancer>,
    interval: RwLock<Duration>,
    prober: Prober,
}

#[derive(Debug)]
struct RunningLoop {
    shutdown: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

/// Background worker bound to one [`LoadBalancer`].
#[derive(Debug)]
pub struct HealthChecker {
    inner: Arc<CheckerInner>,
    running: Mutex<Option<RunningLoop>>,
    is_running: Arc<AtomicBool>,
}

impl HealthChecker {
    /// Create a stopped checker for `balancer`.
    ///
    /// Holds only a weak reference, so the balancer can own its checker.
    pub fn new(
        balancer: &Arc<LoadBalancer>,
        config: &HealthCheckConfig,
    ) -> Result<Self, HealthCheckError> {
        Ok(Self {
            inner: Arc::new(CheckerInner {
                balancer: Arc::downgrade(balancer),
                interval: RwLock::new(config.interval().max(MIN_CHECK_INTERVAL)),
                prober: Prober::new(config.timeout())?,
            }),
            running: Mutex::new(None),
            is_running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Launch the background loop. Calling it while running does nothing.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        if running.is_some() {
            return;
        }

        let (shutdown, rx) = broadcast::channel(1);
        let inner = self.inner.clone();
        let is_running = self.is_running.clone();
        is_running.store(true, Ordering::SeqCst);

        let handle = tokio::spawn(async move {
            inner.run(rx).await;
            is_running.store(false, Ordering::SeqCst);
        });

        *running = Some(RunningLoop { shutdown, handle });
    }

    /// Signal the loop and wait for it to exit. Calling it while stopped
    /// does nothing.
    ///
    /// An in-flight round is allowed to finish; probes are not cancelled.
    pub async fn stop(&self) {
        let running = self.running.lock().unwrap_or_else(|e| e.into_inner()).take();
        let Some(RunningLoop { shutdown, handle }) = running else {
            return;
        };

        let _ = shutdown.send(());
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Health check loop terminated abnormally");
        }
        self.is_running.store(false, Ordering::SeqCst);
        tracing::info!("Health checker stopped");
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    pub fn check_interval(&self) -> Duration {
        self.inner.interval()
    }

    /// Takes effect after the current wait. Values below
    /// [`MIN_CHECK_INTERVAL`] are raised to it.
    pub fn set_check_interval(&self, interval: Duration) {
        if interval < MIN_CHECK_INTERVAL {
            tracing::warn!(
                requested = ?interval,
                applied = ?MIN_CHECK_INTERVAL,
                "Health check interval below minimum, clamping"
            );
        }
        let interval = interval.max(MIN_CHECK_INTERVAL);
        *self.inner.interval.write().unwrap_or_else(|e| e.into_inner()) = interval;
        tracing::info!(interval = ?interval, "Health check interval updated");
    }

    pub fn request_timeout(&self) -> Duration {
        self.inner.prober.timeout()
    }

    /// Takes effect from the next round.
    pub fn set_request_timeout(&self, timeout: Duration) -> Result<(), HealthCheckError> {
        self.inner.prober.set_timeout(timeout)?;
        tracing::info!(timeout = ?timeout, "Health check timeout updated");
        Ok(())
    }

    /// Run one probe round now, outside the background loop.
    pub async fn check_now(&self) {
        if let Some(balancer) = self.inner.balancer.upgrade() {
            self.inner.check_all(&balancer).await;
        }
    }

    pub fn get_health_check_stats(&self) -> HealthCheckStats {
        let instances = self
            .inner
            .balancer
            .upgrade()
            .map(|lb| lb.instances())
            .unwrap_or_default()
            .iter()
            .map(|i| InstanceHealth {
                id: i.id.clone(),
                health_url: i.health_url.clone(),
                healthy: i.is_healthy(),
                failure_count: i.failure_count(),
                state: i.state(),
            })
            .collect();

        HealthCheckStats {
            interval_ms: saturating_millis(self.check_interval()),
            timeout_ms: saturating_millis(self.request_timeout()),
            running: self.is_running(),
            instances,
        }
    }
}

fn saturating_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl CheckerInner {
    fn interval(&self) -> Duration {
        *self.interval.read().unwrap_or_else(|e| e.into_inner())
    }

    async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval = ?self.interval(),
            timeout = ?self.prober.timeout(),
            "Health checker starting"
        );

        loop {
            let Some(balancer) = self.balancer.upgrade() else {
                tracing::debug!("Load balancer dropped, health checker exiting");
                break;
            };
            self.check_all(&balancer).await;
            drop(balancer);

            tokio::select! {
                _ = time::sleep(self.interval()) => {}
                _ = shutdown.recv() => {
                    tracing::info!("Health checker received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// One fan-out/fan-in round over the current registry.
    async fn check_all(&self, balancer: &LoadBalancer) {
        let instances = balancer.instances();
        if instances.is_empty() {
            return;
        }

        let (tx, mut rx) = mpsc::channel(instances.len());
        let probe = self.prober.handle();

        for instance in instances {
            let tx = tx.clone();
            let probe = probe.clone();
            tokio::spawn(async move {
                let result = probe.probe(&instance.id, &instance.health_url).await;
                let _ = tx.send((instance, result)).await;
            });
        }
        drop(tx);

        let mut checked = 0usize;
        while let Some((instance, result)) = rx.recv().await {
            metrics::record_probe_duration(&instance.id, result.duration);
            balancer.apply_health_result(&instance, &result);
            checked += 1;
        }

        tracing::debug!(checked, "Health check round completed");
    }
}
