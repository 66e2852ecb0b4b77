//! Selection and outcome recording under concurrent callers.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use replica_balancer::{CircuitState, LoadBalancer, Strategy};

fn balancer_with(strategy: Strategy, max_failures: u32, ids: &[&str]) -> Arc<LoadBalancer> {
    let lb = Arc::new(LoadBalancer::new(
        strategy,
        max_failures,
        Duration::from_secs(30),
        Duration::from_secs(30),
    ));
    for id in ids {
        lb.add_instance(
            *id,
            format!("http://{id}.internal"),
            format!("http://{id}.internal/health"),
            1,
            Duration::from_secs(5),
        );
    }
    lb
}

#[test]
fn test_concurrent_selection_covers_all_instances() {
    let lb = balancer_with(Strategy::RoundRobin, 3, &["a", "b", "c", "d", "e"]);

    let selected: Vec<String> = thread::scope(|s| {
        let handles: Vec<_> = (0..100)
            .map(|_| {
                let lb = &lb;
                s.spawn(move || lb.get_healthy_instance().map(|i| i.id.clone()))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect()
    });

    assert_eq!(selected.len(), 100);
    let unique: HashSet<_> = selected.into_iter().collect();
    assert_eq!(unique.len(), 5);
    assert_eq!(lb.get_stats().round_robin_index, 100);
}

#[test]
fn test_round_robin_visits_each_once_per_cycle() {
    let ids = ["a", "b", "c", "d", "e"];
    let lb = balancer_with(Strategy::RoundRobin, 3, &ids);

    for _ in 0..3 {
        let cycle: HashSet<_> = (0..ids.len())
            .map(|_| lb.get_healthy_instance().unwrap().id.clone())
            .collect();
        assert_eq!(cycle.len(), ids.len());
    }
}

#[test]
fn test_concurrent_outcomes_balance_connections() {
    // High threshold keeps every instance selectable while outcomes interleave.
    let lb = balancer_with(Strategy::LeastConnections, u32::MAX, &["a", "b", "c"]);

    thread::scope(|s| {
        for worker in 0..8 {
            let lb = &lb;
            s.spawn(move || {
                for n in 0..200 {
                    let instance = lb.get_healthy_instance().unwrap();
                    lb.increment_connections(&instance);
                    if (worker + n) % 7 == 0 {
                        lb.record_failure(&instance);
                    } else {
                        lb.record_success(&instance);
                    }
                }
            });
        }
    });

    for instance in lb.instances() {
        assert_eq!(instance.active_connections(), 0);
    }
}

#[test]
fn test_threshold_invariant_for_every_instance() {
    let lb = balancer_with(Strategy::Random, 3, &["a", "b", "c"]);

    for instance in lb.instances() {
        for _ in 0..lb.max_failures() {
            lb.record_failure(&instance);
        }
        assert_eq!(instance.state(), CircuitState::Open);
        assert!(!instance.is_healthy());
    }
    assert_eq!(lb.get_available_instance_count(), 0);
    assert_eq!(lb.get_stats().healthy_instances, 0);
}

#[test]
fn test_open_instance_never_selected_before_recovery() {
    let lb = Arc::new(LoadBalancer::new(
        Strategy::RoundRobin,
        1,
        Duration::from_secs(30),
        Duration::from_millis(150),
    ));
    for id in ["a", "b"] {
        lb.add_instance(id, "http://x", "http://x/health", 1, Duration::from_secs(1));
    }
    lb.record_result("a", false, Duration::from_millis(12));

    for _ in 0..50 {
        assert_eq!(lb.get_healthy_instance().unwrap().id, "b");
    }

    thread::sleep(Duration::from_millis(200));
    let picked: HashSet<_> = (0..2)
        .map(|_| lb.get_healthy_instance().unwrap().id.clone())
        .collect();
    assert!(picked.contains("a"));
    assert_eq!(lb.get_circuit_breaker_state("a"), CircuitState::HalfOpen);
}
