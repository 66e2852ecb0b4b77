//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request outcome reported by caller (record_success / record_failure):
//!     → circuit_breaker.rs (count failures, open circuit if threshold exceeded)
//!
//! Selection attempt:
//!     → circuit_breaker.rs (lazily move Open → HalfOpen once the dwell time elapsed)
//!
//! Health probe result:
//!     → circuit_breaker.rs (probe recovery may short-circuit the breaker)
//! ```
//!
//! # Design Decisions
//! - One breaker per instance, guarded by that instance's own lock
//! - Breaker state is a single enum; health is derived from it
//! - All transitions take an explicit `now` so they can be driven deterministically

pub mod circuit_breaker;

pub use circuit_breaker::{Admission, Breaker, CircuitState, ProbeOutcome, Transition};
