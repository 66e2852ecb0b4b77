//! Configuration hot reload.
//!
//! notify reports file events on its own thread. They are forwarded to a
//! tokio task that coalesces bursts, reloads the file and reconciles the
//! running balancer. The parent directory is watched rather than the file
//! itself so saves that replace the file (write-then-rename) are seen too.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time;

use crate::config::loader::{load_config, ConfigError};
use crate::config::schema::GatewayConfig;
use crate::load_balancer::{LoadBalancer, ReconcileSummary};

/// Quiet period after a file event before the file is read.
const RELOAD_DEBOUNCE: Duration = Duration::from_millis(150);

/// What a reload changed on the running balancer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReloadReport {
    pub registry: ReconcileSummary,
    /// New health check interval, when it changed.
    pub check_interval: Option<Duration>,
    /// New probe timeout, when it changed.
    pub request_timeout: Option<Duration>,
}

/// Apply a validated configuration to a running balancer.
///
/// Strategy and breaker policy are fixed at startup; changes to them are
/// logged and ignored. The instance registry and health check timings
/// follow the file.
pub fn apply_config(balancer: &Arc<LoadBalancer>, config: &GatewayConfig) -> ReloadReport {
    let wanted = &config.balancer;
    if wanted.strategy != balancer.strategy()
        || wanted.max_failures.max(1) != balancer.max_failures()
        || wanted.recovery_timeout() != balancer.recovery_timeout()
    {
        tracing::warn!(
            strategy = %wanted.strategy,
            max_failures = wanted.max_failures,
            recovery_timeout_ms = wanted.recovery_timeout_ms,
            "Balancer policy changes require a restart, ignoring"
        );
    }

    let mut report = ReloadReport {
        registry: balancer.reconcile(&wanted.instances),
        ..ReloadReport::default()
    };

    let checker = match balancer.health_checker() {
        Ok(checker) => checker,
        Err(e) => {
            tracing::error!(error = %e, "Health checker unavailable, timings not applied");
            return report;
        }
    };

    let interval = config.health_check.interval();
    if interval != checker.check_interval() {
        checker.set_check_interval(interval);
        report.check_interval = Some(checker.check_interval());
    }

    let timeout = config.health_check.timeout();
    if timeout != checker.request_timeout() {
        match checker.set_request_timeout(timeout) {
            Ok(()) => report.request_timeout = Some(timeout),
            Err(e) => tracing::error!(error = %e, "Failed to apply health check timeout"),
        }
    }

    report
}

/// Keeps the file watch and the reload task alive. Dropping it stops
/// event delivery.
#[derive(Debug)]
pub struct WatchHandle {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl WatchHandle {
    /// Wait for the reload task to exit after shutdown was signalled.
    pub async fn stopped(self) {
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Config reload task terminated abnormally");
        }
    }
}

/// Reloads one configuration file into one balancer.
#[derive(Debug)]
pub struct ConfigWatcher {
    path: PathBuf,
    balancer: Arc<LoadBalancer>,
}

impl ConfigWatcher {
    pub fn new(path: impl Into<PathBuf>, balancer: Arc<LoadBalancer>) -> Self {
        Self {
            path: path.into(),
            balancer,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the file and apply it. On error the running state is untouched.
    pub fn reload(&self) -> Result<ReloadReport, ConfigError> {
        let config = load_config(&self.path)?;
        Ok(apply_config(&self.balancer, &config))
    }

    /// Watch the file and reload on every change until `shutdown` fires.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(self, mut shutdown: broadcast::Receiver<()>) -> Result<WatchHandle, notify::Error> {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        let file_name: Option<OsString> = self.path.file_name().map(ToOwned::to_owned);
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let touches_file = event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == file_name.as_deref());
                    if touches_file && (event.kind.is_modify() || event.kind.is_create()) {
                        let _ = tx.send(());
                    }
                }
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        tracing::info!(path = ?self.path, "Config watcher started");

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = rx.recv() => {
                        if event.is_none() {
                            break;
                        }
                        // A single save usually produces several events.
                        time::sleep(RELOAD_DEBOUNCE).await;
                        while rx.try_recv().is_ok() {}
                        self.reload_logged();
                    }
                    _ = shutdown.recv() => break,
                }
            }
            tracing::info!("Config watcher stopped");
        });

        Ok(WatchHandle {
            _watcher: watcher,
            task,
        })
    }

    fn reload_logged(&self) {
        match self.reload() {
            Ok(report) => tracing::info!(
                added = report.registry.added,
                removed = report.registry.removed,
                updated = report.registry.updated,
                check_interval = ?report.check_interval,
                request_timeout = ?report.request_timeout,
                "Configuration reloaded"
            ),
            Err(e) => tracing::error!(
                path = ?self.path,
                error = %e,
                "Failed to reload config, keeping current configuration"
            ),
        }
    }
}
