//! Least Connections load balancing strategy.

use std::sync::Arc;

use crate::load_balancer::{Selector, ServiceInstance};

/// Least connections selector.
/// Selects the instance with the minimum number of active connections.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self
    }
}

impl Selector for LeastConnections {
    fn next_instance(&self, eligible: &[Arc<ServiceInstance>]) -> Option<Arc<ServiceInstance>> {
        // In case of tie, the first one is selected (stability)
        eligible
            .iter()
            .min_by_key(|i| i.active_connections())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_least_conn() {
        let lb = LeastConnections::new();
        let i1 = Arc::new(ServiceInstance::new("a", "http://a", "http://a/health", 1, Duration::from_secs(1)));
        let i2 = Arc::new(ServiceInstance::new("b", "http://b", "http://b/health", 1, Duration::from_secs(1)));

        // artificially increase connections on i1
        i1.inc_connections();

        let instances = vec![i1.clone(), i2.clone()];

        // Should pick i2 (0 connections)
        let s1 = lb.next_instance(&instances).unwrap();
        assert_eq!(s1.id, "b");

        // now i2 has 2, i1 has 1
        i2.inc_connections();
        i2.inc_connections();

        let s2 = lb.next_instance(&instances).unwrap();
        assert_eq!(s2.id, "a");
    }

    #[test]
    fn test_tie_prefers_first() {
        let lb = LeastConnections::new();
        let instances: Vec<_> = ["a", "b"]
            .iter()
            .map(|id| Arc::new(ServiceInstance::new(*id, "http://x", "http://x/health", 1, Duration::from_secs(1))))
            .collect();
        assert_eq!(lb.next_instance(&instances).unwrap().id, "a");
    }
}
