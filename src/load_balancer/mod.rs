//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Caller asks for an instance
//!     → balancer.rs (compute eligible set, lazily re-admit recovered instances)
//!     → Apply selection strategy:
//!         - round_robin.rs (rotate through eligible instances)
//!         - random.rs (uniform pick)
//!         - least_conn.rs (pick instance with fewest in-flight requests)
//!     → Caller dispatches the request itself
//!     → Caller reports the outcome back (record_success / record_failure)
//!     → instance.rs (circuit breaker update under the instance lock)
//! ```
//!
//! # Design Decisions
//! - Registry lock only protects the instance list; each instance guards its own state
//! - Strategies are stateless apart from the round-robin cursor, scoped per balancer
//! - `weight` is carried on every instance but not consulted by any strategy

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub mod balancer;
pub mod error;
pub mod instance;
pub mod least_conn;
pub mod random;
pub mod round_robin;
pub mod stats;

pub use balancer::{LoadBalancer, ReconcileSummary};
pub use error::LoadBalancerError;
pub use instance::ServiceInstance;
pub use stats::{BalancerStats, InstanceStats};

use self::{least_conn::LeastConnections, random::Random, round_robin::RoundRobin};

/// Picks one instance out of an already-filtered eligible set.
pub trait Selector: Send + Sync + fmt::Debug {
    /// Returns `None` only when `eligible` is empty.
    fn next_instance(&self, eligible: &[Arc<ServiceInstance>]) -> Option<Arc<ServiceInstance>>;

    /// Position of the rotation cursor, for strategies that keep one.
    fn cursor(&self) -> usize {
        0
    }
}

/// Selection strategy names as they appear in configuration and stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    #[default]
    RoundRobin,
    Random,
    LeastConnections,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::RoundRobin => "round_robin",
            Strategy::Random => "random",
            Strategy::LeastConnections => "least_connections",
        }
    }

    /// Build a fresh selector for this strategy.
    pub fn selector(self) -> Box<dyn Selector> {
        match self {
            Strategy::RoundRobin => Box::new(RoundRobin::new()),
            Strategy::Random => Box::new(Random::new()),
            Strategy::LeastConnections => Box::new(LeastConnections::new()),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
