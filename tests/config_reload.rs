//! Hot reload of the configuration file into a running balancer.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use replica_balancer::config::{load_config, ConfigError, ConfigWatcher};
use replica_balancer::load_balancer::ReconcileSummary;
use replica_balancer::{CircuitState, LoadBalancer, Shutdown};

mod common;

fn config_text(instances: &[(&str, u16)], interval_ms: u64, timeout_ms: u64) -> String {
    let mut text = format!(
        "[balancer]\nstrategy = \"round_robin\"\nmax_failures = 1\n\n\
         [health_check]\nenabled = false\ninterval_ms = {interval_ms}\ntimeout_ms = {timeout_ms}\n"
    );
    for (id, port) in instances {
        text.push_str(&format!(
            "\n[[balancer.instances]]\nid = \"{id}\"\nurl = \"http://127.0.0.1:{port}\"\n\
             health_url = \"http://127.0.0.1:{port}/health\"\ntimeout_ms = 5000\n"
        ));
    }
    text
}

fn write(path: &Path, text: &str) {
    std::fs::write(path, text).unwrap();
}

fn balancer_from(path: &Path) -> Arc<LoadBalancer> {
    let config = load_config(path).unwrap();
    Arc::new(
        LoadBalancer::from_config(&config.balancer).with_health_check(config.health_check.clone()),
    )
}

fn ids(lb: &LoadBalancer) -> Vec<String> {
    lb.instances().iter().map(|i| i.id.clone()).collect()
}

#[tokio::test]
async fn test_reload_reconciles_registry_and_timings() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("balancer.toml");
    write(&path, &config_text(&[("a", 9001), ("b", 9002)], 30_000, 5_000));

    let lb = balancer_from(&path);
    lb.record_result("b", false, Duration::ZERO);
    assert_eq!(lb.get_circuit_breaker_state("b"), CircuitState::Open);

    let watcher = ConfigWatcher::new(&path, lb.clone());
    write(&path, &config_text(&[("a", 9101), ("b", 9002), ("c", 9003)], 500, 750));
    let report = watcher.reload().unwrap();

    assert_eq!(
        report.registry,
        ReconcileSummary { added: 1, removed: 0, updated: 1 }
    );
    assert_eq!(report.check_interval, Some(Duration::from_millis(500)));
    assert_eq!(report.request_timeout, Some(Duration::from_millis(750)));

    assert_eq!(ids(&lb), vec!["a", "b", "c"]);
    assert_eq!(lb.find_instance("a").unwrap().health_url, "http://127.0.0.1:9101/health");
    // Unchanged instances keep their breaker.
    assert_eq!(lb.get_circuit_breaker_state("b"), CircuitState::Open);

    let checker = lb.health_checker().unwrap();
    assert_eq!(checker.check_interval(), Duration::from_millis(500));
    assert_eq!(checker.request_timeout(), Duration::from_millis(750));

    // Reapplying the same file changes nothing.
    let again = watcher.reload().unwrap();
    assert!(again.registry.is_empty());
    assert_eq!(again.check_interval, None);
    assert_eq!(again.request_timeout, None);
}

#[tokio::test]
async fn test_invalid_reload_keeps_running_state() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("balancer.toml");
    write(&path, &config_text(&[("a", 9001)], 30_000, 5_000));

    let lb = balancer_from(&path);
    let watcher = ConfigWatcher::new(&path, lb.clone());

    write(&path, "[balancer\nstrategy = ");
    assert!(matches!(watcher.reload(), Err(ConfigError::Parse(_))));

    write(&path, &config_text(&[("a", 9001), ("a", 9002)], 30_000, 5_000));
    assert!(matches!(watcher.reload(), Err(ConfigError::Validation(_))));

    assert_eq!(ids(&lb), vec!["a"]);
    assert_eq!(
        lb.health_checker().unwrap().check_interval(),
        Duration::from_secs(30)
    );
}

#[tokio::test]
async fn test_file_edit_is_applied_in_background() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("balancer.toml");
    write(&path, &config_text(&[("a", 9001)], 30_000, 5_000));

    let lb = balancer_from(&path);
    let shutdown = Shutdown::new();
    let watch = ConfigWatcher::new(&path, lb.clone())
        .spawn(shutdown.subscribe())
        .unwrap();

    write(&path, &config_text(&[("b", 9002)], 1_000, 5_000));

    let checker = lb.health_checker().unwrap();
    assert!(
        common::wait_until(Duration::from_secs(10), || {
            ids(&lb) == vec!["b"] && checker.check_interval() == Duration::from_secs(1)
        })
        .await
    );

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), watch.stopped())
        .await
        .unwrap();
}
