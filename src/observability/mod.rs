//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Balancer and health checker produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields (`instance_id`, `state`) on every event
//! - Metrics are cheap and become no-ops when no recorder is installed

pub mod logging;
pub mod metrics;
