//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Immediate first round, then a fixed interval
//!     → Fan out: one probe task per instance (probe.rs)
//!     → Fan in: collect every result through a channel sized to the round
//!     → LoadBalancer folds each result into the instance's breaker
//!
//! Passive health checks:
//!     Caller reports request outcome
//!     → LoadBalancer::record_success / record_failure
//! ```
//!
//! # Design Decisions
//! - Rounds never overlap; the next tick waits for every probe of the previous one
//! - Each probe has its own timeout, so a hung instance cannot stall the others
//! - Probe failures are folded into breaker state, never returned to callers
//! - A healthy probe closes an open or half-open circuit without waiting for the recovery timer

pub mod active;
pub mod probe;

pub use active::{HealthCheckStats, HealthChecker, InstanceHealth, MIN_CHECK_INTERVAL};
pub use probe::{HealthCheckError, HealthCheckResult, Prober};
