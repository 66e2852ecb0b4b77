//! Round-robin load balancing strategy.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::load_balancer::{Selector, ServiceInstance};

/// Round-robin selector.
/// Stores an internal counter to rotate through the eligible set.
///
/// The eligible set is recomputed on every call, so rotation is exact while
/// membership is stable and approximate while it changes.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Selector for RoundRobin {
    fn next_instance(&self, eligible: &[Arc<ServiceInstance>]) -> Option<Arc<ServiceInstance>> {
        if eligible.is_empty() {
            return None;
        }

        let count = self.counter.fetch_add(1, Ordering::Relaxed);
        eligible.get(count % eligible.len()).cloned()
    }

    fn cursor(&self) -> usize {
        self.counter.load(Ordering::Relaxed)
    }
}
