//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Signal received → stop admin API → stop health checking → exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop accepting admin traffic, then drain the probe loop
//! - Health checker stop waits for the in-flight round

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
