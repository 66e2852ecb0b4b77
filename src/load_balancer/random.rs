//! Uniform random load balancing strategy.

use std::sync::Arc;

use rand::Rng;

use crate::load_balancer::{Selector, ServiceInstance};

/// Picks a uniformly random member of the eligible set.
#[derive(Debug, Default)]
pub struct Random;

impl Random {
    pub fn new() -> Self {
        Self
    }
}

impl Selector for Random {
    fn next_instance(&self, eligible: &[Arc<ServiceInstance>]) -> Option<Arc<ServiceInstance>> {
        if eligible.is_empty() {
            return None;
        }
        let index = rand::thread_rng().gen_range(0..eligible.len());
        eligible.get(index).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;

    #[test]
    fn test_random_stays_in_set() {
        let lb = Random::new();
        let instances: Vec<_> = ["a", "b", "c"]
            .iter()
            .map(|id| Arc::new(ServiceInstance::new(*id, "http://x", "http://x/health", 1, Duration::from_secs(1))))
            .collect();

        let mut seen = HashSet::new();
        for _ in 0..300 {
            seen.insert(lb.next_instance(&instances).unwrap().id.clone());
        }
        assert_eq!(seen.len(), 3);
        assert!(lb.next_instance(&[]).is_none());
    }
}
